//! Namespaced child spawn via clone(2)
//!
//! This module uses `unsafe` for clone() which is inherently unsafe
//! but necessary: the six namespaces must exist atomically at
//! process-creation time, before the child re-execs itself.
//!
//! The kernel creates the namespaces synchronously, so the returned
//! pid already names a fully-namespaced process even though the
//! child's own setup is still in flight. The only gate is the uid/gid
//! map: the child blocks on a pipe until the parent has written the
//! single-entry maps, because a user-namespaced process has no usable
//! credentials before they exist.

#![allow(unsafe_code)]

use std::ffi::CString;
use std::fs;
use std::os::fd::{AsRawFd, OwnedFd};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{Gid, Pid, Uid, pipe};
use tracing::{debug, error, info, warn};
use vessel_core::{Error, ProcessId, Result};

use crate::config::NamespaceConfig;

const STACK_SIZE: usize = 1024 * 1024; // 1MB child stack

/// Spawn `argv` as a re-executed child inside freshly-created namespaces
///
/// Returns once the child pid is known; the child's own mount/pivot
/// work runs concurrently from that point on. `argv[0]` is the program
/// path (normally `/proc/self/exe`).
///
/// # Errors
/// Returns error if clone fails or the uid/gid maps cannot be written.
pub fn spawn(config: &NamespaceConfig, argv: &[CString]) -> Result<ProcessId> {
    if argv.is_empty() {
        return Err(Error::InvalidConfig {
            message: "spawn argv cannot be empty".to_string(),
        });
    }

    let flags = config.to_clone_flags();

    info!(
        namespaces = ?config.enabled_namespaces(),
        "spawning namespaced child"
    );

    // Both ends survive the clone in both processes; the child closes
    // its copy of the write end and blocks until the parent's copy
    // closes too, which happens only after the maps are written.
    let (map_ready_r, map_ready_w): (OwnedFd, OwnedFd) = pipe()?;
    let read_fd = map_ready_r.as_raw_fd();
    let write_fd = map_ready_w.as_raw_fd();

    let mut stack = vec![0u8; STACK_SIZE];
    let argv = argv.to_vec();

    let child = unsafe {
        nix::sched::clone(
            Box::new(move || child_entry(&argv, read_fd, write_fd)),
            &mut stack,
            flags,
            Some(Signal::SIGCHLD as i32),
        )
    }
    .map_err(|e| Error::Namespace {
        message: format!("clone failed: {e}"),
    })?;

    debug!(pid = %child, "child cloned");

    if config.user {
        write_id_maps(child)?;
    }

    // Closing the write end delivers EOF to the child and releases it
    drop(map_ready_w);
    drop(map_ready_r);

    Ok(ProcessId::from(child))
}

/// Runs in the child, inside all requested namespaces, before exec
fn child_entry(argv: &[CString], read_fd: i32, write_fd: i32) -> isize {
    // Close our copy of the write end so the parent's close is EOF
    unsafe { libc::close(write_fd) };

    // Block until the parent has written the uid/gid maps
    let mut buf = [0u8; 1];
    loop {
        let n = unsafe { libc::read(read_fd, buf.as_mut_ptr().cast(), 1) };
        if n == 0 {
            break;
        }
        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EINTR) {
                continue;
            }
            eprintln!("child: waiting for uid map failed: {err}");
            return 1;
        }
    }
    unsafe { libc::close(read_fd) };

    // Replace the child image with the re-exec target
    let result = nix::unistd::execv(&argv[0], argv);

    // Only reached when exec failed
    eprintln!("child: exec {:?} failed: {:?}", argv[0], result);
    127
}

/// Write the single-entry uid/gid mapping for a user-namespaced child
///
/// Maps the host uid/gid onto container uid/gid 0. `setgroups` must be
/// denied before an unprivileged parent may write the gid map.
fn write_id_maps(pid: Pid) -> Result<()> {
    let uid = Uid::current().as_raw();
    let gid = Gid::current().as_raw();

    fs::write(format!("/proc/{pid}/setgroups"), "deny").map_err(|e| Error::Namespace {
        message: format!("failed to deny setgroups for pid {pid}: {e}"),
    })?;
    fs::write(format!("/proc/{pid}/uid_map"), format!("0 {uid} 1")).map_err(|e| {
        Error::Namespace {
            message: format!("failed to write uid_map for pid {pid}: {e}"),
        }
    })?;
    fs::write(format!("/proc/{pid}/gid_map"), format!("0 {gid} 1")).map_err(|e| {
        Error::Namespace {
            message: format!("failed to write gid_map for pid {pid}: {e}"),
        }
    })?;

    debug!(%pid, uid, gid, "uid/gid maps written");

    Ok(())
}

/// Wait for the namespaced child to terminate
///
/// Blocks until the child exits; Ctrl+C in the parent is forwarded to
/// the child as SIGTERM rather than killing the parent wait loop.
///
/// # Errors
/// Returns error if waitpid fails.
pub fn wait(pid: ProcessId) -> Result<i32> {
    let child = pid.as_nix_pid();

    if let Err(e) = ctrlc::set_handler(move || {
        warn!("received Ctrl+C, forwarding SIGTERM to child");
        let _ = kill(child, Signal::SIGTERM);
    }) {
        // Not fatal, the child just won't see a forwarded signal
        warn!(error = %e, "could not set signal handler");
    }

    debug!(%pid, "waiting for child");

    loop {
        match waitpid(child, None) {
            Ok(WaitStatus::Exited(_, exit_code)) => {
                info!(%pid, exit_code, "child exited");
                return Ok(exit_code);
            }
            Ok(WaitStatus::Signaled(_, signal, _)) => {
                warn!(%pid, ?signal, "child terminated by signal");
                return Ok(128 + signal as i32);
            }
            Ok(status) => {
                debug!(%pid, ?status, "child status, continuing to wait");
            }
            Err(Errno::EINTR) => {
                continue;
            }
            Err(Errno::ECHILD) => {
                warn!(%pid, "child no longer exists");
                return Ok(0);
            }
            Err(e) => {
                error!(%pid, error = %e, "wait failed");
                return Err(Error::Namespace {
                    message: format!("wait for pid {pid} failed: {e}"),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_rejects_empty_argv() {
        let config = NamespaceConfig::default();
        assert!(spawn(&config, &[]).is_err());
    }

    #[test]
    fn test_spawn_and_wait_namespaced_child() {
        let config = NamespaceConfig::default();
        let argv = vec![CString::new("/bin/true").unwrap()];

        // Unprivileged user namespaces may be disabled on the host
        let pid = match spawn(&config, &argv) {
            Ok(pid) => pid,
            Err(e) => {
                eprintln!("Skipping test (cannot create namespaces): {e}");
                return;
            }
        };

        let exit_code = wait(pid).unwrap();
        assert_eq!(exit_code, 0);
    }
}
