//! System-wide constants.

/// Application name used in log output.
pub const APP_NAME: &str = "dotbox";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "dotbox";

/// Scaffold location relative to the invoking user's home directory; the
/// process id is appended to make each invocation's root unique.
pub const CACHE_SUBDIR: &str = ".cache/dotbox";

/// Maximum directory depth below the scaffold root that safe cleanup will
/// accept. The scaffold itself only ever creates mount-point directories one
/// or two levels deep (e.g. `dev/pts`); anything deeper was not ours.
pub const SCAFFOLD_MAX_DEPTH: u32 = 2;
