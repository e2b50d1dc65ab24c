//! Private mount namespace isolation.
//!
//! Everything dotbox mounts must stay invisible to the rest of the host, and
//! ambient propagation settings (e.g. a session manager marking `/` shared)
//! must not leak mounts back out.

use dotbox_common::error::{DotboxError, Result};

/// Moves the calling process into a new, private mount namespace.
///
/// After `unshare(CLONE_NEWNS)` the root mount's propagation is remounted
/// `MS_PRIVATE | MS_REC`, so every later mount and unmount is confined to
/// this process and its descendants. There is no fallback: without isolation
/// every subsequent mount would land in the host's mount table.
///
/// Needs no privilege beyond what the invoking process already has.
///
/// # Errors
///
/// Returns an error if `unshare(2)` or the propagation remount fails.
#[cfg(target_os = "linux")]
pub fn isolate() -> Result<()> {
    use nix::mount::{MsFlags, mount};
    use nix::sched::{CloneFlags, unshare};

    unshare(CloneFlags::CLONE_NEWNS).map_err(|e| DotboxError::Namespace {
        message: format!("mount namespace creation failed: {e}"),
    })?;

    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_PRIVATE | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| DotboxError::Namespace {
        message: format!("marking root mount private failed: {e}"),
    })?;

    tracing::debug!("mount namespace isolated");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — mount namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn isolate() -> Result<()> {
    Err(DotboxError::Namespace {
        message: "Linux required for sandbox operations".into(),
    })
}
