//! Sandbox lifecycle orchestration.
//!
//! One pass through the whole machine: isolate the mount namespace, resolve
//! the invoking user, build the scaffold, apply the mounts in declared
//! order, fork, confine the child, wait for the shell to finish, then unwind
//! every mount in reverse and remove the scaffold, but only if it is
//! provably unmodified.

use std::path::{Path, PathBuf};

use dotbox_common::constants::CACHE_SUBDIR;
use dotbox_common::error::{DotboxError, Result};
use dotbox_common::types::{Identity, SandboxPaths};

use crate::mount::MountSpec;
use crate::{identity, mount, namespace, scaffold};

/// Runs the complete sandbox lifecycle and returns the confined shell's exit
/// status.
///
/// # Errors
///
/// Returns an error on any setup failure: namespace isolation, identity
/// resolution, a scaffold-root collision, a failed mount, or a failed fork.
/// Setup never leaves the process half-confined; the first failure aborts.
/// Teardown failures, by contrast, are logged and never returned, so every
/// remaining mount still gets its unmount.
pub fn run(home_override: Option<PathBuf>) -> Result<i32> {
    namespace::isolate()?;
    let invoker = identity::resolve()?;
    let sandbox = Sandbox::new(invoker, home_override)?;
    sandbox.launch()
}

/// Derives the per-invocation scaffold root for a user's home and a pid.
fn scaffold_root(home: &Path, pid: u32) -> PathBuf {
    home.join(CACHE_SUBDIR).join(pid.to_string())
}

/// A fully prepared sandbox: who is entering it, where its scaffold lives,
/// and the ordered mounts composing its filesystem view.
#[derive(Debug)]
pub struct Sandbox {
    identity: Identity,
    paths: SandboxPaths,
    fixed: Vec<MountSpec>,
    home_overlay: Option<MountSpec>,
}

impl Sandbox {
    /// Prepares a sandbox for the given user, deriving its unique scaffold
    /// paths and mount table. With a `home_override`, that directory will be
    /// bound over the sandboxed home, after all fixed mounts.
    ///
    /// # Errors
    ///
    /// Returns an error if the home path cannot be re-rooted or if the
    /// scaffold root already exists; a collision is never overwritten.
    pub fn new(identity: Identity, home_override: Option<PathBuf>) -> Result<Self> {
        let root = scaffold_root(&identity.home, std::process::id());
        let home = scaffold::rebase(&root, &identity.home)?;
        if root.exists() {
            return Err(DotboxError::RootExists { path: root });
        }
        let paths = SandboxPaths::new(root, home);
        let home_overlay =
            home_override.map(|dir| MountSpec::onto(dir, paths.home().to_path_buf()));

        Ok(Self {
            identity,
            paths,
            fixed: mount::fixed_mounts(),
            home_overlay,
        })
    }

    /// Returns the scaffold paths for this invocation.
    #[must_use]
    pub fn paths(&self) -> &SandboxPaths {
        &self.paths
    }

    /// Builds the mount view, runs the confined shell to completion, and
    /// tears everything down again. Returns the shell's exit status.
    ///
    /// # Errors
    ///
    /// Returns an error if any setup mount or the fork fails. Once the child
    /// is running, nothing on the teardown path errors any more.
    pub fn launch(mut self) -> Result<i32> {
        scaffold::ensure_dir(self.paths.root());
        scaffold::ensure_dir(self.paths.home());

        for spec in &mut self.fixed {
            spec.bind(self.paths.root())?;
        }
        if let Some(overlay) = &mut self.home_overlay {
            overlay.bind(self.paths.root())?;
        }

        let status = self.spawn_shell()?;

        if let Some(overlay) = &mut self.home_overlay {
            overlay.eject();
        }
        for spec in self.fixed.iter_mut().rev() {
            spec.eject();
        }

        if let Err(e) = scaffold::safe_cleanup(self.paths.root()) {
            tracing::warn!(
                root = %self.paths.root().display(),
                error = %e,
                "cleanup refused, leaving scaffold untouched"
            );
        }

        Ok(status)
    }

    /// Forks; the child walks the confinement state machine and execs the
    /// shell, the parent waits for it.
    #[cfg(target_os = "linux")]
    #[allow(unsafe_code)]
    fn spawn_shell(&self) -> Result<i32> {
        use nix::unistd::{ForkResult, fork};

        // SAFETY: the process is single-threaded at this point; the child
        // only confines itself and execs, or exits.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => self.confined_child(),
            Ok(ForkResult::Parent { .. }) => Ok(await_child()),
            Err(e) => Err(DotboxError::Process {
                message: format!("fork failed: {e}"),
            }),
        }
    }

    /// Child side: never returns. On success the shell replaces this
    /// process image; on any failure the child exits immediately without
    /// unwinding into the parent's teardown logic.
    #[cfg(target_os = "linux")]
    #[allow(unsafe_code)]
    fn confined_child(&self) -> ! {
        use crate::privilege;

        let outcome = privilege::confine(self.paths.root(), &self.identity.home)
            .and_then(|()| privilege::drop_privileges(&self.identity))
            .and_then(|()| privilege::exec_shell(&self.identity.shell));

        if let Err(e) = outcome {
            tracing::error!(error = %e, "confinement failed");
        }
        // SAFETY: _exit skips atexit handlers; the parent owns teardown and
        // must not have it run twice.
        unsafe { libc::_exit(1) }
    }

    /// Stub for non-Linux platforms.
    #[cfg(not(target_os = "linux"))]
    fn spawn_shell(&self) -> Result<i32> {
        Err(DotboxError::Process {
            message: "Linux required for sandbox operations".into(),
        })
    }
}

/// One observed outcome of a wait call, reduced to what the loop needs.
enum WaitEvent {
    /// A child terminated with this exit status.
    Exited(i32),
    /// A state change that is not a termination.
    Running,
    /// The wait was interrupted by a signal.
    Interrupted,
    /// No children remain.
    Drained,
    /// Any other wait failure.
    Failed(String),
}

/// Waits until no children remain, retrying interrupted waits, and returns
/// the last observed exit status. Wait failures other than "no children
/// left" are logged and end the loop.
fn await_child_with<F: FnMut() -> WaitEvent>(mut wait_once: F) -> i32 {
    let mut status = 0;
    loop {
        match wait_once() {
            WaitEvent::Exited(code) => status = code,
            WaitEvent::Running | WaitEvent::Interrupted => {}
            WaitEvent::Drained => break,
            WaitEvent::Failed(message) => {
                tracing::warn!(message = %message, "wait failed");
                break;
            }
        }
    }
    status
}

#[cfg(target_os = "linux")]
fn await_child() -> i32 {
    use nix::errno::Errno;
    use nix::sys::wait::{WaitStatus, wait};

    await_child_with(|| match wait() {
        Ok(WaitStatus::Exited(_, code)) => WaitEvent::Exited(code),
        Ok(WaitStatus::Signaled(_, signal, _)) => WaitEvent::Exited(128 + signal as i32),
        Ok(_) => WaitEvent::Running,
        Err(Errno::EINTR) => WaitEvent::Interrupted,
        Err(Errno::ECHILD) => WaitEvent::Drained,
        Err(e) => WaitEvent::Failed(e.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoker(home: &Path) -> Identity {
        Identity {
            uid: 1000,
            gid: 1000,
            name: "u".into(),
            home: home.to_path_buf(),
            shell: PathBuf::from("/bin/sh"),
        }
    }

    #[test]
    fn scaffold_root_embeds_home_and_pid() {
        let root = scaffold_root(Path::new("/home/u"), 4242);
        assert_eq!(root, PathBuf::from("/home/u/.cache/dotbox/4242"));
    }

    #[test]
    fn scaffold_roots_are_disjoint_across_pids() {
        let first = scaffold_root(Path::new("/home/u"), 4242);
        let second = scaffold_root(Path::new("/home/u"), 4243);
        assert_ne!(first, second);
        assert!(!second.starts_with(&first));
    }

    #[test]
    fn sandbox_home_is_real_home_under_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sandbox = Sandbox::new(invoker(dir.path()), None).expect("new");
        assert!(sandbox.paths().home().starts_with(sandbox.paths().root()));
        assert!(
            sandbox
                .paths()
                .root()
                .starts_with(dir.path().join(".cache/dotbox"))
        );
    }

    #[test]
    fn preexisting_scaffold_root_is_a_collision() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = scaffold_root(dir.path(), std::process::id());
        std::fs::create_dir_all(&root).expect("mkdir");

        let result = Sandbox::new(invoker(dir.path()), None);
        assert!(matches!(result, Err(DotboxError::RootExists { .. })));
    }

    #[test]
    fn wait_retries_interrupts_and_keeps_last_status() {
        let mut events = vec![
            WaitEvent::Interrupted,
            WaitEvent::Running,
            WaitEvent::Exited(7),
            WaitEvent::Interrupted,
            WaitEvent::Drained,
        ]
        .into_iter();
        let status = await_child_with(|| events.next().expect("scripted event"));
        assert_eq!(status, 7);
    }

    #[test]
    fn wait_without_any_exit_reports_zero() {
        let mut events = vec![WaitEvent::Drained].into_iter();
        assert_eq!(await_child_with(|| events.next().expect("event")), 0);
    }

    #[test]
    fn wait_stops_on_unexpected_failure() {
        let mut events = vec![
            WaitEvent::Exited(3),
            WaitEvent::Failed("wait gone wrong".into()),
            WaitEvent::Exited(9),
        ]
        .into_iter();
        assert_eq!(await_child_with(|| events.next().expect("event")), 3);
    }
}
