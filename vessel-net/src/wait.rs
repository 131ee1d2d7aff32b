//! Network readiness poll
//!
//! The only synchronization between the parent building the network
//! fabric and the child preparing its namespaces: the child repeatedly
//! counts its interfaces and proceeds once something beyond loopback
//! has appeared. This is a coarse proxy — it proves the veth was
//! injected, not that its address or route is in place yet — and the
//! bounded-wait semantics are deliberate, not to be strengthened into
//! a handshake.

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;
use vessel_core::{Error, Result};

use crate::netlink::NetlinkHandle;

/// Default maximum time to wait for the veth to appear
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(3);

/// Default interval between interface counts
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Block until the current network namespace looks configured
///
/// Counts interfaces at `interval` until more than one exists (a
/// fresh namespace holds only loopback) or `max_wait` elapses.
///
/// # Errors
/// Returns a timeout error if the count stays at one past `max_wait`,
/// or any error from listing interfaces.
pub fn wait_for_network(max_wait: Duration, interval: Duration) -> Result<()> {
    let mut netlink = NetlinkHandle::new()?;
    wait_with_lister(|| netlink.link_count(), max_wait, interval)
}

/// Readiness loop over an arbitrary interface lister
///
/// # Errors
/// Same contract as [`wait_for_network`].
pub fn wait_with_lister<F>(
    mut list_interfaces: F,
    max_wait: Duration,
    interval: Duration,
) -> Result<()>
where
    F: FnMut() -> Result<usize>,
{
    let started = Instant::now();

    loop {
        let count = list_interfaces()?;
        if count > 1 {
            debug!(interfaces = count, "network namespace looks configured");
            return Ok(());
        }

        if started.elapsed() > max_wait {
            return Err(Error::Timeout {
                message: format!("timeout after {max_wait:?} waiting for network"),
            });
        }

        thread::sleep(interval);
    }
}
