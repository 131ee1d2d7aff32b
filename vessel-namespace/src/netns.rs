//! Namespace-scoped execution
//!
//! Runs a callback with the calling thread's network namespace
//! temporarily switched to another process's, restoring the original
//! on every exit path.
//!
//! The setns/restore pair applies to the calling OS thread, so the
//! whole acquire/execute/release sequence must stay on one thread.
//! Everything in this crate is synchronous, which makes that hold by
//! construction; callers must not move this call onto a migrating
//! task scheduler.

use std::fs::File;
use std::os::fd::AsFd;

use nix::sched::{CloneFlags, setns};
use tracing::{debug, error};
use vessel_core::{Error, ProcessId, Result};

/// Restores the saved network namespace when dropped
struct NetnsGuard {
    original: File,
}

impl Drop for NetnsGuard {
    fn drop(&mut self) {
        if let Err(e) = setns(self.original.as_fd(), CloneFlags::CLONE_NEWNET) {
            // A thread stuck in the wrong namespace cannot be repaired here
            error!(error = %e, "failed to restore original network namespace");
        }
    }
}

/// Execute `f` inside the network namespace of `pid`
///
/// Opens `/proc/<pid>/ns/net`; an unreachable process or namespace
/// handle fails immediately with a namespace-not-found error, there is
/// no retry. The original namespace is restored whether `f` returns
/// `Ok`, returns `Err`, or panics.
///
/// # Errors
/// Returns error if the namespace handle cannot be opened, the switch
/// fails, or `f` itself fails.
pub fn with_network_namespace<T, F>(pid: ProcessId, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let target = File::open(format!("/proc/{pid}/ns/net")).map_err(|_| Error::Namespace {
        message: format!("unable to find network namespace for process with pid '{pid}'"),
    })?;

    let original = File::open("/proc/self/ns/net")?;

    setns(target.as_fd(), CloneFlags::CLONE_NEWNET).map_err(|e| Error::Namespace {
        message: format!("failed to enter network namespace of pid {pid}: {e}"),
    })?;

    debug!(%pid, "entered target network namespace");

    let _guard = NetnsGuard { original };
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_root() -> bool {
        nix::unistd::geteuid().is_root()
    }

    fn current_netns_id() -> String {
        std::fs::read_link("/proc/self/ns/net")
            .unwrap()
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_missing_namespace_fails_immediately() {
        // No process can have this pid
        let result = with_network_namespace(ProcessId::from_raw(i32::MAX), || Ok(()));

        let err = result.unwrap_err();
        assert!(err.to_string().contains("unable to find network namespace"));
    }

    #[test]
    fn test_restores_namespace_after_success() {
        if !is_root() {
            eprintln!("Skipping test: requires root privileges");
            return;
        }

        let before = current_netns_id();
        let value =
            with_network_namespace(ProcessId::current(), || Ok(current_netns_id())).unwrap();
        let after = current_netns_id();

        assert_eq!(before, after);
        assert!(!value.is_empty());
    }

    #[test]
    fn test_restores_namespace_after_callback_error() {
        if !is_root() {
            eprintln!("Skipping test: requires root privileges");
            return;
        }

        let before = current_netns_id();
        let result: Result<()> = with_network_namespace(ProcessId::current(), || {
            Err(Error::Network {
                message: "boom".to_string(),
            })
        });
        let after = current_netns_id();

        assert!(result.is_err());
        assert_eq!(before, after);
    }
}
