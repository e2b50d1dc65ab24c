//! Domain primitive types used across the dotbox workspace.

use std::fmt;
use std::path::{Path, PathBuf};

/// Identity of the invoking user, read once at startup from the host's user
/// database and immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Numeric user id.
    pub uid: u32,
    /// Numeric group id.
    pub gid: u32,
    /// Login name.
    pub name: String,
    /// Home directory on the host.
    pub home: PathBuf,
    /// Login shell.
    pub shell: PathBuf,
}

/// Scaffold paths for one sandbox invocation.
///
/// `root` embeds the process id, so two concurrent invocations never share a
/// scaffold. `home` is the invoking user's home path re-rooted under `root`;
/// it is the mount point for the optional home overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPaths {
    root: PathBuf,
    home: PathBuf,
}

impl SandboxPaths {
    /// Creates a new path pair from an already-derived root and home.
    #[must_use]
    pub fn new(root: PathBuf, home: PathBuf) -> Self {
        Self { root, home }
    }

    /// Returns the scaffold root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the sandboxed home directory (inside the scaffold root).
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }
}

/// Lifecycle state of a single mount.
///
/// A spec transitions `Unmounted -> Mounted` on a successful bind and back on
/// eject; a spec whose host source is absent stays `Unmounted` forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MountState {
    /// Not currently mounted.
    #[default]
    Unmounted,
    /// Live in this process's mount namespace.
    Mounted,
}

impl fmt::Display for MountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmounted => write!(f, "unmounted"),
            Self::Mounted => write!(f, "mounted"),
        }
    }
}
