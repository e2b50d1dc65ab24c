//! # dotbox-core
//!
//! Low-level Linux primitives for the dotbox sandbox:
//! - **Identity**: one-shot resolution of the invoking user.
//! - **Namespace**: private mount namespace isolation.
//! - **Mount**: the ordered read-only bind-mount view and its teardown.
//! - **Scaffold**: mount-point directory creation and verify-then-delete
//!   removal of the scaffold tree.
//! - **Privilege**: chroot confinement and the irreversible privilege drop,
//!   including the restore-must-fail self check.
//! - **Lifecycle**: the orchestrated run from namespace setup to cleanup.
//!
//! All unsafe system calls are encapsulated in safe wrappers with proper
//! error handling and `// SAFETY:` documentation.

pub mod identity;
pub mod lifecycle;
pub mod mount;
pub mod namespace;
pub mod privilege;
pub mod scaffold;
