//! Confinement and irreversible privilege drop for the forked child.
//!
//! The steps here run between `fork` and `exec`, in a fixed order, and every
//! failure is fatal to the child: the shell must never start inside a
//! half-confined or re-escalatable process.

use std::convert::Infallible;
use std::path::Path;

use dotbox_common::error::{DotboxError, Result};
use dotbox_common::types::Identity;

/// Confines the process to the sandbox root and moves into the user's home.
///
/// `home` is the user's ordinary absolute home path; after `chroot` it
/// resolves inside the confined view.
///
/// # Errors
///
/// Returns an error if `chroot(2)` or `chdir(2)` fails.
#[cfg(target_os = "linux")]
pub fn confine(root: &Path, home: &Path) -> Result<()> {
    nix::unistd::chroot(root).map_err(|e| DotboxError::Privilege {
        message: format!("chroot {}: {e}", root.display()),
    })?;
    nix::unistd::chdir(home).map_err(|e| DotboxError::Privilege {
        message: format!("chdir {}: {e}", home.display()),
    })?;
    Ok(())
}

/// Drops group and user identity down to the invoking user's original ids,
/// then verifies the drop cannot be reversed.
///
/// Group comes first: once the user id is gone, the right to change groups
/// goes with it.
///
/// # Errors
///
/// Returns an error if `setgid(2)` or `setuid(2)` fails, or if the
/// verification finds that superuser identity can still be reacquired.
#[cfg(target_os = "linux")]
pub fn drop_privileges(identity: &Identity) -> Result<()> {
    use nix::unistd::{Gid, Uid, setgid, setuid};

    setgid(Gid::from_raw(identity.gid)).map_err(|e| DotboxError::Privilege {
        message: format!("setgid {}: {e}", identity.gid),
    })?;
    setuid(Uid::from_raw(identity.uid)).map_err(|e| DotboxError::Privilege {
        message: format!("setuid {}: {e}", identity.uid),
    })?;
    verify_privileges_dropped()
}

/// Asserts that superuser identity cannot be reacquired.
///
/// The restore attempt is *expected to fail*; that failure is the invariant
/// being checked. An attempt that succeeds means the preceding drop left a
/// way back to root (saved-id mismatches on setuid binaries can do this),
/// and the caller must abort before any shell is executed.
///
/// # Errors
///
/// Returns an error when privileges can be restored.
#[cfg(target_os = "linux")]
pub fn verify_privileges_dropped() -> Result<()> {
    verify_with(|| nix::unistd::setuid(nix::unistd::Uid::from_raw(0)))
}

fn verify_with<E>(restore: impl FnOnce() -> std::result::Result<(), E>) -> Result<()> {
    match restore() {
        Ok(()) => Err(DotboxError::Privilege {
            message: "privileges can be restored after drop".into(),
        }),
        Err(_) => Ok(()),
    }
}

/// Replaces the process image with the user's login shell, no arguments.
///
/// # Errors
///
/// Returning at all means `execv(2)` failed.
#[cfg(target_os = "linux")]
pub fn exec_shell(shell: &Path) -> Result<Infallible> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let program =
        CString::new(shell.as_os_str().as_bytes()).map_err(|_| DotboxError::Privilege {
            message: format!("shell path {} contains a NUL byte", shell.display()),
        })?;
    nix::unistd::execv(&program, &[program.as_c_str()]).map_err(|e| DotboxError::Privilege {
        message: format!("exec {}: {e}", shell.display()),
    })
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — confinement requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn confine(_root: &Path, _home: &Path) -> Result<()> {
    Err(linux_required())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — privilege manipulation requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn drop_privileges(_identity: &Identity) -> Result<()> {
    Err(linux_required())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — privilege manipulation requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn verify_privileges_dropped() -> Result<()> {
    Err(linux_required())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — exec requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn exec_shell(_shell: &Path) -> Result<Infallible> {
    Err(linux_required())
}

#[cfg(not(target_os = "linux"))]
fn linux_required() -> DotboxError {
    DotboxError::Privilege {
        message: "Linux required for sandbox operations".into(),
    }
}
