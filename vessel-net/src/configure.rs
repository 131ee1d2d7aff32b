//! Host- and container-side network configuration strategies
//!
//! Two strategies share one capability: apply a network configuration
//! to a target identified by process id. The host strategy builds the
//! bridge/veth fabric in the default namespace and injects the
//! container end; the container strategy switches into the target
//! namespace and gives the injected end its address and route.
//!
//! Ordering is enforced by sequential invocation in
//! [`apply_network`]: the container strategy can only find
//! `<prefix>1` after the host strategy has moved it.

use tracing::{error, info};
use vessel_core::{Error, ProcessId, Result};
use vessel_namespace::with_network_namespace;

use crate::config::{NetworkConfig, NetworkSettings};
use crate::fabric::{Bridge, BridgeFabric, Veth, VethFabric};
use crate::netlink::NetlinkHandle;

/// Apply a network configuration to the process identified by `pid`
pub trait Configurer {
    /// Perform this strategy's part of the network setup
    ///
    /// # Errors
    /// Any step failure aborts the whole setup; interfaces already
    /// created are not rolled back.
    fn apply(&mut self, config: &NetworkConfig, pid: ProcessId) -> Result<()>;
}

/// Host-side strategy: bridge + veth fabric in the default namespace
pub struct HostConfigurer<B, V> {
    bridge: B,
    veth: V,
}

impl HostConfigurer<Bridge, Veth> {
    /// Create a host configurer over real netlink fabric
    ///
    /// # Errors
    /// Returns error if the netlink sockets cannot be created.
    pub fn new() -> Result<Self> {
        Ok(Self {
            bridge: Bridge::new()?,
            veth: Veth::new()?,
        })
    }
}

impl<B, V> HostConfigurer<B, V> {
    /// Create a host configurer over caller-supplied fabric
    pub fn with_fabric(bridge: B, veth: V) -> Self {
        Self { bridge, veth }
    }
}

impl<B: BridgeFabric, V: VethFabric> Configurer for HostConfigurer<B, V> {
    fn apply(&mut self, config: &NetworkConfig, pid: ProcessId) -> Result<()> {
        let bridge_index = self.bridge.ensure(&config.bridge_name, config.bridge)?;

        let pair = self.veth.ensure(&config.veth_name_prefix)?;

        self.bridge.attach(bridge_index, pair.host_index)?;

        self.veth.move_to_namespace(&pair, pid)?;

        Ok(())
    }
}

/// Container-side strategy: runs inside the target namespace
pub struct ContainerConfigurer;

impl Configurer for ContainerConfigurer {
    fn apply(&mut self, config: &NetworkConfig, pid: ProcessId) -> Result<()> {
        let veth_name = config.container_veth_name();
        let container = config.container;
        let gateway = config.gateway();

        with_network_namespace(pid, || {
            // Socket opened after the switch, so it binds to the
            // container's network namespace
            let mut netlink = NetlinkHandle::new()?;

            let index = netlink.ifindex(&veth_name).map_err(|_| Error::Network {
                message: format!("container veth '{veth_name}' not found"),
            })?;

            netlink.add_address(index, container)?;
            netlink.set_link_up(index)?;
            netlink.add_default_route(index, gateway)
        })
    }
}

/// Build the full network path for a spawned container
///
/// Parses and validates `settings` (precondition failures happen here,
/// before any interface exists), then applies the host strategy
/// followed by the container strategy against the child's pid.
///
/// # Errors
/// Returns error on invalid settings or any fabric/configuration
/// failure; no rollback of interfaces already created.
pub fn apply_network(settings: &NetworkSettings, pid: ProcessId) -> Result<()> {
    let config = settings.parse()?;

    info!(
        bridge = %config.bridge_name,
        bridge_addr = %config.bridge,
        container_addr = %config.container,
        %pid,
        "applying network configuration"
    );

    let mut host = HostConfigurer::new()?;
    host.apply(&config, pid).map_err(|e| {
        error!(error = %e, "host network strategy failed");
        e
    })?;

    let mut container = ContainerConfigurer;
    container.apply(&config, pid).map_err(|e| {
        error!(error = %e, "container network strategy failed");
        e
    })?;

    info!(%pid, "network configuration applied");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipnetwork::Ipv4Network;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::fabric::VethPair;

    type CallLog = Rc<RefCell<Vec<String>>>;

    struct FakeBridge {
        log: CallLog,
        exists: bool,
        fail_ensure: bool,
    }

    impl BridgeFabric for FakeBridge {
        fn ensure(&mut self, name: &str, _addr: Ipv4Network) -> Result<u32> {
            if self.fail_ensure {
                return Err(Error::Network {
                    message: "bridge ensure failed".to_string(),
                });
            }
            let verb = if self.exists { "reuse" } else { "create" };
            self.log.borrow_mut().push(format!("bridge {verb} {name}"));
            self.exists = true;
            Ok(10)
        }

        fn attach(&mut self, bridge_index: u32, link_index: u32) -> Result<()> {
            self.log
                .borrow_mut()
                .push(format!("attach {link_index} to {bridge_index}"));
            Ok(())
        }
    }

    struct FakeVeth {
        log: CallLog,
        exists: bool,
    }

    impl VethFabric for FakeVeth {
        fn ensure(&mut self, name_prefix: &str) -> Result<VethPair> {
            let verb = if self.exists { "reuse" } else { "create" };
            self.log
                .borrow_mut()
                .push(format!("veth {verb} {name_prefix}"));
            self.exists = true;
            Ok(VethPair {
                host_name: format!("{name_prefix}0"),
                container_name: format!("{name_prefix}1"),
                host_index: 20,
                container_index: 21,
            })
        }

        fn move_to_namespace(&mut self, pair: &VethPair, pid: ProcessId) -> Result<()> {
            self.log
                .borrow_mut()
                .push(format!("move {} to {pid}", pair.container_name));
            Ok(())
        }
    }

    fn test_config() -> NetworkConfig {
        NetworkSettings::default().parse().unwrap()
    }

    #[test]
    fn test_host_strategy_order() {
        let log: CallLog = Rc::default();
        let mut host = HostConfigurer::with_fabric(
            FakeBridge {
                log: Rc::clone(&log),
                exists: false,
                fail_ensure: false,
            },
            FakeVeth {
                log: Rc::clone(&log),
                exists: false,
            },
        );

        host.apply(&test_config(), ProcessId::from_raw(42)).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "bridge create brg0",
                "veth create veth",
                "attach 20 to 10",
                "move veth1 to 42",
            ]
        );
    }

    #[test]
    fn test_host_strategy_idempotent_rerun() {
        let log: CallLog = Rc::default();
        let mut host = HostConfigurer::with_fabric(
            FakeBridge {
                log: Rc::clone(&log),
                exists: true,
                fail_ensure: false,
            },
            FakeVeth {
                log: Rc::clone(&log),
                exists: true,
            },
        );

        host.apply(&test_config(), ProcessId::from_raw(42)).unwrap();

        // Existing fabric is reused, but attach and move still run
        assert_eq!(
            *log.borrow(),
            vec![
                "bridge reuse brg0",
                "veth reuse veth",
                "attach 20 to 10",
                "move veth1 to 42",
            ]
        );
    }

    #[test]
    fn test_host_strategy_stops_on_first_failure() {
        let log: CallLog = Rc::default();
        let mut host = HostConfigurer::with_fabric(
            FakeBridge {
                log: Rc::clone(&log),
                exists: false,
                fail_ensure: true,
            },
            FakeVeth {
                log: Rc::clone(&log),
                exists: false,
            },
        );

        let result = host.apply(&test_config(), ProcessId::from_raw(42));

        assert!(result.is_err());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_apply_network_rejects_bad_cidr_before_any_fabric() {
        let settings = NetworkSettings {
            bridge_cidr: "not-an-ip".to_string(),
            ..Default::default()
        };

        // Fails in parse, before any netlink socket or interface exists
        let err = apply_network(&settings, ProcessId::from_raw(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }
}
