//! End-to-end tests for the portable half of the sandbox pipeline.
//!
//! These tests verify the lifecycle pieces that need no mount privileges:
//! 1. Scaffold-path derivation (per-pid uniqueness, home re-rooting)
//! 2. The fixed mount table (content, order, reverse teardown order)
//! 3. Mount-spec state transitions for absent sources
//! 4. Scaffold creation and the verify-then-delete cleanup contract
//!
//! The privileged half (namespace isolation, live binds, chroot, privilege
//! drop) runs only inside a real sandbox invocation on a Linux host.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use dotbox_common::types::{Identity, MountState};
use dotbox_core::lifecycle::Sandbox;
use dotbox_core::mount::{MountSpec, fixed_mounts};
use dotbox_core::scaffold;

fn invoker(home: &Path) -> Identity {
    Identity {
        uid: 1000,
        gid: 1000,
        name: "u".into(),
        home: home.to_path_buf(),
        shell: PathBuf::from("/bin/sh"),
    }
}

// ── Paths ────────────────────────────────────────────────────────────

#[test]
fn pipeline_scaffold_paths_are_unique_and_nested() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sandbox = Sandbox::new(invoker(dir.path()), None).expect("prepare");

    let root = sandbox.paths().root();
    assert!(root.starts_with(dir.path().join(".cache/dotbox")));
    assert!(root.ends_with(std::process::id().to_string()));
    assert!(sandbox.paths().home().starts_with(root));
}

#[test]
fn pipeline_root_collision_is_fatal_not_overwritten() {
    let dir = tempfile::tempdir().expect("tempdir");
    let sandbox = Sandbox::new(invoker(dir.path()), None).expect("prepare");
    let root = sandbox.paths().root().to_path_buf();

    std::fs::create_dir_all(&root).expect("mkdir");
    std::fs::write(root.join("marker"), b"keep").expect("write");

    assert!(Sandbox::new(invoker(dir.path()), None).is_err());
    assert!(root.join("marker").is_file());
}

// ── Mount table ──────────────────────────────────────────────────────

#[test]
fn pipeline_fixed_mounts_cover_the_eleven_system_trees() {
    let sources: Vec<_> = fixed_mounts()
        .iter()
        .map(|m| m.source().to_path_buf())
        .collect();
    assert_eq!(sources.len(), 11);
    assert_eq!(sources.first(), Some(&PathBuf::from("/bin")));
    assert_eq!(sources.last(), Some(&PathBuf::from("/var")));
}

#[test]
fn pipeline_absent_sources_never_mount() {
    let root = tempfile::tempdir().expect("tempdir");
    let mut spec = MountSpec::mirror("/dotbox-test/no-such-tree");

    spec.bind(root.path()).expect("bind skips absent source");
    assert_eq!(spec.state(), MountState::Unmounted);

    // A second eject is equally uneventful.
    spec.eject();
    spec.eject();
    assert_eq!(spec.state(), MountState::Unmounted);
}

// ── Scaffold cleanup ─────────────────────────────────────────────────

#[test]
fn pipeline_cleanup_removes_what_the_scaffold_created() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("box");

    // Mirror what a real run produces: mount-point directories, depth <= 2.
    for mount in fixed_mounts() {
        let target = scaffold::rebase(&root, mount.source()).expect("rebase");
        scaffold::ensure_dir(&target);
    }
    assert!(root.join("dev/pts").is_dir());

    scaffold::safe_cleanup(&root).expect("cleanup");
    assert!(!root.exists());
}

#[test]
fn pipeline_cleanup_refuses_a_tree_the_shell_touched() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("box");
    scaffold::ensure_dir(&root.join("tmp"));
    std::fs::write(root.join("tmp/escaped"), b"left behind").expect("write");

    assert!(scaffold::safe_cleanup(&root).is_err());
    assert!(root.join("tmp/escaped").is_file());
}
