//! Unified error types for the dotbox workspace.
//!
//! Setup errors are fatal by policy (the sandbox must never run
//! half-confined); teardown-time failures are logged as warnings at the call
//! site and never surface through this type.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum DotboxError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The invoking user's identity could not be established or is unusable.
    #[error("identity error: {message}")]
    Identity {
        /// Description of the identity failure.
        message: String,
    },

    /// Mount namespace isolation failed.
    #[error("namespace error: {message}")]
    Namespace {
        /// Description of the namespace failure.
        message: String,
    },

    /// A bind mount could not be established.
    #[error("mount {source_path} -> {target}: {message}")]
    Mount {
        /// Host path being mounted.
        source_path: PathBuf,
        /// Target path inside the sandbox root.
        target: PathBuf,
        /// Description of the mount failure.
        message: String,
    },

    /// The scaffold root already exists on disk.
    #[error("scaffold root {path} already exists")]
    RootExists {
        /// The colliding path.
        path: PathBuf,
    },

    /// Spawning the confined child failed.
    #[error("process error: {message}")]
    Process {
        /// Description of the process failure.
        message: String,
    },

    /// Confinement or privilege manipulation failed.
    #[error("privilege error: {message}")]
    Privilege {
        /// Description of the privilege failure.
        message: String,
    },

    /// A derived path could not be constructed.
    #[error("path error: {message}")]
    Path {
        /// Description of the malformed path.
        message: String,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, DotboxError>;
