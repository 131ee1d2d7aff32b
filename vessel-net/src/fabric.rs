//! Kernel link fabric: bridge and veth creation
//!
//! The traits keep the host configurer testable with in-memory fakes;
//! the [`Bridge`] and [`Veth`] implementations drive the real kernel
//! through netlink.
//!
//! Both implementations are idempotent at the creation step: a link
//! that already exists under the expected name is treated as already
//! configured and reused, never as an error. This allows re-running a
//! previously-partially-built network without manual cleanup.

use ipnetwork::Ipv4Network;
use tracing::{debug, info};
use vessel_core::{ProcessId, Result};

use crate::netlink::NetlinkHandle;

/// Both ends of a veth pair, resolved to kernel link indices
#[derive(Debug, Clone)]
pub struct VethPair {
    /// Host-end link name (`<prefix>0`)
    pub host_name: String,
    /// Container-end link name (`<prefix>1`)
    pub container_name: String,
    /// Host-end link index
    pub host_index: u32,
    /// Container-end link index
    pub container_index: u32,
}

/// Bridge construction capability
pub trait BridgeFabric {
    /// Create the named bridge with `addr`, or reuse an existing one;
    /// returns the bridge link index
    fn ensure(&mut self, name: &str, addr: Ipv4Network) -> Result<u32>;

    /// Attach a link to the bridge (set its master)
    fn attach(&mut self, bridge_index: u32, link_index: u32) -> Result<()>;
}

/// Veth pair construction capability
pub trait VethFabric {
    /// Create the `<prefix>0`/`<prefix>1` pair, or reuse an existing one
    fn ensure(&mut self, name_prefix: &str) -> Result<VethPair>;

    /// Move the container end into the network namespace of `pid`
    fn move_to_namespace(&mut self, pair: &VethPair, pid: ProcessId) -> Result<()>;
}

/// Netlink-backed bridge fabric
pub struct Bridge {
    netlink: NetlinkHandle,
}

impl Bridge {
    /// Create a bridge fabric over a fresh netlink socket
    ///
    /// # Errors
    /// Returns error if the netlink socket cannot be created.
    pub fn new() -> Result<Self> {
        Ok(Self {
            netlink: NetlinkHandle::new()?,
        })
    }
}

impl BridgeFabric for Bridge {
    fn ensure(&mut self, name: &str, addr: Ipv4Network) -> Result<u32> {
        if self.netlink.link_exists(name) {
            debug!(bridge = name, "bridge already exists, reusing");
            return self.netlink.ifindex(name);
        }

        let index = self.netlink.create_bridge(name)?;
        self.netlink.add_address(index, addr)?;
        self.netlink.set_link_up(index)?;

        info!(bridge = name, %addr, "bridge created");

        Ok(index)
    }

    fn attach(&mut self, bridge_index: u32, link_index: u32) -> Result<()> {
        self.netlink.set_link_master(link_index, bridge_index)
    }
}

/// Netlink-backed veth fabric
pub struct Veth {
    netlink: NetlinkHandle,
}

impl Veth {
    /// Create a veth fabric over a fresh netlink socket
    ///
    /// # Errors
    /// Returns error if the netlink socket cannot be created.
    pub fn new() -> Result<Self> {
        Ok(Self {
            netlink: NetlinkHandle::new()?,
        })
    }
}

impl VethFabric for Veth {
    fn ensure(&mut self, name_prefix: &str) -> Result<VethPair> {
        let host_name = format!("{name_prefix}0");
        let container_name = format!("{name_prefix}1");

        if self.netlink.link_exists(&host_name) {
            debug!(veth = %host_name, "veth pair already exists, reusing");
        } else {
            let (host_index, _) = self
                .netlink
                .create_veth_pair(&host_name, &container_name)?;
            self.netlink.set_link_up(host_index)?;
            info!(host = %host_name, container = %container_name, "veth pair created");
        }

        Ok(VethPair {
            host_index: self.netlink.ifindex(&host_name)?,
            container_index: self.netlink.ifindex(&container_name)?,
            host_name,
            container_name,
        })
    }

    fn move_to_namespace(&mut self, pair: &VethPair, pid: ProcessId) -> Result<()> {
        debug!(link = %pair.container_name, %pid, "moving veth end into namespace");
        self.netlink
            .move_link_to_pid_namespace(pair.container_index, pid)
    }
}
