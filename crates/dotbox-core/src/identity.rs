//! Resolution of the invoking user's identity.
//!
//! The sandbox is built by and for an unprivileged user; everything read here
//! is read exactly once, at startup, and passed through the lifecycle by
//! reference.

use dotbox_common::error::{DotboxError, Result};
use dotbox_common::types::Identity;

/// Resolves the invoking user from the host's user database.
///
/// Refuses to proceed as the superuser: the whole design restricts a user's
/// view of their own files, and running it as root would subvert the
/// read-only bind restrictions.
///
/// # Errors
///
/// Returns an error if the effective user is root, or if the user database
/// has no entry for the invoking uid.
#[cfg(target_os = "linux")]
pub fn resolve() -> Result<Identity> {
    use nix::unistd::{User, getgid, getuid};

    let uid = getuid();
    let gid = getgid();
    if uid.is_root() {
        return Err(DotboxError::Identity {
            message: "refusing to run as root".into(),
        });
    }

    let user = User::from_uid(uid)
        .map_err(|e| DotboxError::Identity {
            message: format!("user database lookup failed: {e}"),
        })?
        .ok_or_else(|| DotboxError::Identity {
            message: format!("no user database entry for uid {uid}"),
        })?;

    tracing::debug!(
        uid = uid.as_raw(),
        gid = gid.as_raw(),
        name = %user.name,
        shell = %user.shell.display(),
        "resolved invoking user"
    );

    Ok(Identity {
        uid: uid.as_raw(),
        gid: gid.as_raw(),
        name: user.name,
        home: user.dir,
        shell: user.shell,
    })
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — the sandbox requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn resolve() -> Result<Identity> {
    Err(DotboxError::Identity {
        message: "Linux required for sandbox operations".into(),
    })
}
