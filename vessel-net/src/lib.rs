//! Network fabric for Vessel containers
//!
//! Builds the private network path between the host and a container's
//! network namespace: a bridge in the default namespace, a veth pair
//! with one end attached to the bridge and the other injected into the
//! container, plus the address/route configuration applied from inside
//! the target namespace. Also provides the readiness poll the
//! container uses to detect the injected veth.

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

pub mod config;
pub mod configure;
pub mod fabric;
pub mod netlink;
pub mod wait;

pub use config::{NetworkConfig, NetworkSettings};
pub use configure::{Configurer, ContainerConfigurer, HostConfigurer, apply_network};
pub use fabric::{Bridge, BridgeFabric, Veth, VethFabric, VethPair};
pub use netlink::NetlinkHandle;
pub use wait::{DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL, wait_for_network};
