//! Scaffold directory creation and verify-then-delete removal.
//!
//! The scaffold is the throwaway directory tree that hosts the sandbox's
//! mount points. Creation is best-effort; removal is all-or-nothing and
//! refuses to touch a tree that no longer looks like something this program
//! created.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use dotbox_common::constants::SCAFFOLD_MAX_DEPTH;
use dotbox_common::error::{DotboxError, Result};

/// Re-roots an absolute host path under `root`.
///
/// `rebase("/home/u/.cache/dotbox/42", "/dev/pts")` yields
/// `/home/u/.cache/dotbox/42/dev/pts`.
///
/// # Errors
///
/// Returns an error if `path` is not absolute.
pub fn rebase(root: &Path, path: &Path) -> Result<PathBuf> {
    let relative = path.strip_prefix("/").map_err(|_| DotboxError::Path {
        message: format!("cannot rebase relative path {}", path.display()),
    })?;
    Ok(root.join(relative))
}

/// Creates every missing component of `path`, top-down.
///
/// Scaffolding is best-effort: "already exists" is success, and any other
/// creation failure is logged and skipped so the remaining components still
/// get their chance. A component that truly failed to appear surfaces later,
/// at the mount that needed it.
pub fn ensure_dir(path: &Path) {
    let mut assembled = PathBuf::new();
    for component in path.components() {
        assembled.push(component);
        if matches!(
            component,
            Component::RootDir | Component::Prefix(_) | Component::CurDir
        ) {
            continue;
        }
        match fs::create_dir(&assembled) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => tracing::warn!(path = %assembled.display(), error = %e, "mkdir failed"),
        }
    }
}

/// Walks the tree under `path` depth-first. `check` runs on each entry
/// before descending into it and stops the whole walk by returning an
/// error; `act` runs after an entry's children (post-order, so children
/// come before their parent). Depths start at 1 for direct children of the
/// walk root. Symlinks are not followed.
fn walk_tree<C, A>(path: &Path, depth: u32, check: &mut C, act: &mut A) -> io::Result<()>
where
    C: FnMut(&Path, &fs::Metadata, u32) -> io::Result<()>,
    A: FnMut(&Path) -> io::Result<()>,
{
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        let meta = fs::symlink_metadata(&entry_path)?;
        check(&entry_path, &meta, depth)?;
        if meta.is_dir() {
            walk_tree(&entry_path, depth + 1, check, act)?;
        }
        act(&entry_path)?;
    }
    Ok(())
}

/// Removes the scaffold tree at `root`, but only if it still looks exactly
/// like something this program created: directories only, nothing deeper
/// than [`SCAFFOLD_MAX_DEPTH`] levels below the root.
///
/// Verification and removal are separate passes over the tree. If
/// verification finds anything unexpected (say, a file the confined shell
/// left behind, or a symlink), nothing at all is removed and `root` is left
/// fully intact.
///
/// # Errors
///
/// Returns an error when verification fails or the walk itself fails; in
/// both cases no entry has been deleted. Individual `rmdir` failures after a
/// clean verification are logged and skipped.
pub fn safe_cleanup(root: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(root).map_err(|e| DotboxError::Io {
        path: root.to_path_buf(),
        source: e,
    })?;
    if !meta.is_dir() {
        return Err(DotboxError::Path {
            message: format!("{} is not a directory", root.display()),
        });
    }

    walk_tree(
        root,
        1,
        &mut |path, meta, depth| {
            if depth > SCAFFOLD_MAX_DEPTH {
                return Err(io::Error::other(format!(
                    "entry {} deeper than {SCAFFOLD_MAX_DEPTH} levels",
                    path.display()
                )));
            }
            if !meta.is_dir() {
                return Err(io::Error::other(format!(
                    "unexpected non-directory {}",
                    path.display()
                )));
            }
            Ok(())
        },
        &mut |_| Ok(()),
    )
    .map_err(|e| DotboxError::Io {
        path: root.to_path_buf(),
        source: e,
    })?;

    walk_tree(
        root,
        1,
        &mut |_, _, _| Ok(()),
        &mut |path| {
            if let Err(e) = fs::remove_dir(path) {
                tracing::warn!(path = %path.display(), error = %e, "rmdir failed");
            }
            Ok(())
        },
    )
    .map_err(|e| DotboxError::Io {
        path: root.to_path_buf(),
        source: e,
    })?;

    if let Err(e) = fs::remove_dir(root) {
        tracing::warn!(path = %root.display(), error = %e, "rmdir failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebase_roots_absolute_paths() {
        let joined = rebase(Path::new("/box/root"), Path::new("/dev/pts")).expect("rebase");
        assert_eq!(joined, PathBuf::from("/box/root/dev/pts"));
    }

    #[test]
    fn rebase_rejects_relative_paths() {
        assert!(rebase(Path::new("/box/root"), Path::new("dev/pts")).is_err());
    }

    #[test]
    fn ensure_dir_creates_nested_components() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("a/b/c");
        ensure_dir(&target);
        assert!(target.is_dir());
    }

    #[test]
    fn ensure_dir_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("a/b");
        ensure_dir(&target);
        ensure_dir(&target);
        assert!(target.is_dir());
    }

    #[test]
    fn ensure_dir_tolerates_existing_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefix = dir.path().join("a");
        fs::create_dir(&prefix).expect("mkdir");
        ensure_dir(&prefix.join("b"));
        assert!(prefix.join("b").is_dir());
    }

    #[test]
    fn cleanup_removes_directory_only_tree() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("scaffold");
        ensure_dir(&root.join("dev/pts"));
        ensure_dir(&root.join("bin"));
        safe_cleanup(&root).expect("cleanup");
        assert!(!root.exists());
    }

    #[test]
    fn cleanup_removes_empty_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("scaffold");
        ensure_dir(&root);
        safe_cleanup(&root).expect("cleanup");
        assert!(!root.exists());
    }

    #[test]
    fn cleanup_refuses_files_and_leaves_tree_intact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("scaffold");
        ensure_dir(&root.join("bin"));
        fs::write(root.join("bin/stray"), b"escaped").expect("write");

        assert!(safe_cleanup(&root).is_err());
        assert!(root.join("bin/stray").is_file());
        assert!(root.join("bin").is_dir());
    }

    #[test]
    fn cleanup_refuses_trees_deeper_than_two_levels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("scaffold");
        ensure_dir(&root.join("a/b/c"));

        assert!(safe_cleanup(&root).is_err());
        assert!(root.join("a/b/c").is_dir());
    }

    #[test]
    #[cfg(unix)]
    fn cleanup_refuses_symlinks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("scaffold");
        let outside = dir.path().join("outside");
        ensure_dir(&root);
        ensure_dir(&outside);
        std::os::unix::fs::symlink(&outside, root.join("link")).expect("symlink");

        assert!(safe_cleanup(&root).is_err());
        assert!(root.join("link").exists());
        assert!(outside.is_dir());
    }
}
