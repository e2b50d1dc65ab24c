//! Read-only bind mounts composing the sandbox's filesystem view.
//!
//! Each [`MountSpec`] is one bind-mount intent with an explicit
//! [`MountState`] tag, so a double mount or double unmount is a state match,
//! not a forgotten flag check. The fixed table in [`fixed_mounts`] is applied
//! in declared order and torn down in exact reverse.

use std::path::{Path, PathBuf};

use dotbox_common::error::{DotboxError, Result};
use dotbox_common::types::MountState;

use crate::scaffold;

/// Restrictions a spec may lift from the default mount profile.
///
/// The default profile is bind + read-only. A relaxation only ever subtracts
/// from that profile, never adds to it, and read-only is the only
/// restriction in the profile there is to lift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Relax {
    /// Permit writes through the mount.
    pub write: bool,
}

/// One bind-mount intent: a host source, where and how to attach it inside
/// the sandbox root, and whether it is currently live.
#[derive(Debug, Clone)]
pub struct MountSpec {
    source: PathBuf,
    fstype: Option<&'static str>,
    target: Option<PathBuf>,
    relax: Relax,
    state: MountState,
}

impl MountSpec {
    /// A bind of a host path onto the same path inside the sandbox root.
    #[must_use]
    pub fn mirror(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            fstype: None,
            target: None,
            relax: Relax::default(),
            state: MountState::Unmounted,
        }
    }

    /// Same as [`MountSpec::mirror`], with an explicit filesystem type.
    #[must_use]
    pub fn mirror_typed(source: impl Into<PathBuf>, fstype: &'static str) -> Self {
        Self {
            fstype: Some(fstype),
            ..Self::mirror(source)
        }
    }

    /// A bind of `source` onto an explicit target path.
    #[must_use]
    pub fn onto(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::mirror(source)
        }
    }

    /// Returns the host source path.
    #[must_use]
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> MountState {
        self.state
    }

    /// The target inside `root`: the explicit target when one was given,
    /// otherwise the source re-rooted under `root`.
    fn resolve_target(&self, root: &Path) -> Result<PathBuf> {
        match &self.target {
            Some(target) => Ok(target.clone()),
            None => scaffold::rebase(root, &self.source),
        }
    }

    /// Mounts this spec read-only under `root`.
    ///
    /// A source absent on the host is skipped silently: the spec stays
    /// `Unmounted` for good and is simply not part of this sandbox. The
    /// target directory chain is created on demand.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be derived or the mount syscall
    /// fails. A failed mount means the sandbox cannot be trusted; the caller
    /// aborts setup rather than continue with a partial view.
    pub fn bind(&mut self, root: &Path) -> Result<()> {
        if !self.source.exists() {
            tracing::debug!(source = %self.source.display(), "source absent, skipping");
            return Ok(());
        }

        let target = self.resolve_target(root)?;
        scaffold::ensure_dir(&target);
        bind_syscall(&self.source, &target, self.fstype, self.relax)?;

        tracing::debug!(
            source = %self.source.display(),
            target = %target.display(),
            "mounted"
        );
        self.target = Some(target);
        self.state = MountState::Mounted;
        Ok(())
    }

    /// Unmounts this spec if it is live.
    ///
    /// Teardown must reach every remaining mount, so an unmount failure is a
    /// warning, not an error, and the state drops to `Unmounted` either way,
    /// which makes a second eject a no-op.
    pub fn eject(&mut self) {
        if self.state != MountState::Mounted {
            return;
        }
        if let Some(target) = &self.target {
            if let Err(e) = umount_syscall(target) {
                tracing::warn!(target = %target.display(), error = %e, "umount failed");
            }
        }
        self.state = MountState::Unmounted;
    }
}

/// The ordered table of host trees exposed inside every sandbox.
///
/// Order matters twice: `/dev/pts` must mount after `/dev` because it lands
/// inside it, and teardown walks the list strictly in reverse so nested
/// mounts come off before their parents.
#[must_use]
pub fn fixed_mounts() -> Vec<MountSpec> {
    vec![
        MountSpec::mirror("/bin"),
        MountSpec::mirror("/dev"),
        MountSpec::mirror_typed("/dev/pts", "pts"),
        MountSpec::mirror("/etc"),
        MountSpec::mirror("/lib"),
        MountSpec::mirror("/lib64"),
        MountSpec::mirror_typed("/proc", "proc"),
        MountSpec::mirror_typed("/sys", "sysfs"),
        MountSpec::mirror("/tmp"),
        MountSpec::mirror("/usr"),
        MountSpec::mirror("/var"),
    ]
}

#[cfg(target_os = "linux")]
fn bind_syscall(
    source: &Path,
    target: &Path,
    fstype: Option<&str>,
    relax: Relax,
) -> Result<()> {
    nix::mount::mount(
        Some(source),
        target,
        fstype,
        effective_flags(relax),
        None::<&str>,
    )
    .map_err(|e| DotboxError::Mount {
        source_path: source.to_path_buf(),
        target: target.to_path_buf(),
        message: e.to_string(),
    })
}

/// The default restrictive profile with the requested relaxations removed.
#[cfg(target_os = "linux")]
fn effective_flags(relax: Relax) -> nix::mount::MsFlags {
    use nix::mount::MsFlags;

    let mut flags = MsFlags::MS_BIND | MsFlags::MS_RDONLY;
    if relax.write {
        flags &= !MsFlags::MS_RDONLY;
    }
    flags
}

#[cfg(target_os = "linux")]
fn umount_syscall(target: &Path) -> std::result::Result<(), nix::errno::Errno> {
    nix::mount::umount(target)
}

/// Stub for non-Linux platforms.
#[cfg(not(target_os = "linux"))]
fn bind_syscall(
    source: &Path,
    target: &Path,
    _fstype: Option<&str>,
    _relax: Relax,
) -> Result<()> {
    Err(DotboxError::Mount {
        source_path: source.to_path_buf(),
        target: target.to_path_buf(),
        message: "bind mounts require Linux".into(),
    })
}

/// Stub for non-Linux platforms.
#[cfg(not(target_os = "linux"))]
fn umount_syscall(_target: &Path) -> std::result::Result<(), &'static str> {
    Err("bind mounts require Linux")
}
