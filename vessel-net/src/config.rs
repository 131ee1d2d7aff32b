//! Network configuration parsing and validation
//!
//! String inputs (CLI flags or defaults) are validated into a typed
//! [`NetworkConfig`] before any interface is touched, so a malformed
//! CIDR can never leave half-built fabric behind.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use vessel_core::{Error, Result};

/// Default bridge interface name
pub const DEFAULT_BRIDGE_NAME: &str = "brg0";

/// Default bridge address (CIDR)
pub const DEFAULT_BRIDGE_CIDR: &str = "10.10.10.1/24";

/// Default container address (CIDR)
pub const DEFAULT_CONTAINER_CIDR: &str = "10.10.10.2/24";

/// Default veth name prefix (`veth0` host end, `veth1` container end)
pub const DEFAULT_VETH_PREFIX: &str = "veth";

// Linux IFNAMSIZ minus the NUL terminator
const MAX_IFNAME_LEN: usize = 15;

/// Raw network parameters as taken from the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Bridge interface name
    pub bridge_name: String,

    /// Bridge address in CIDR notation
    pub bridge_cidr: String,

    /// Container address in CIDR notation
    pub container_cidr: String,

    /// Veth pair name prefix
    pub veth_name_prefix: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            bridge_name: DEFAULT_BRIDGE_NAME.to_string(),
            bridge_cidr: DEFAULT_BRIDGE_CIDR.to_string(),
            container_cidr: DEFAULT_CONTAINER_CIDR.to_string(),
            veth_name_prefix: DEFAULT_VETH_PREFIX.to_string(),
        }
    }
}

impl NetworkSettings {
    /// Validate the raw settings into a typed configuration
    ///
    /// # Errors
    /// Returns error if either CIDR fails to parse, the two addresses
    /// do not share a subnet or do not differ, or an interface name
    /// would not fit in `IFNAMSIZ`.
    pub fn parse(&self) -> Result<NetworkConfig> {
        let bridge: Ipv4Network =
            self.bridge_cidr
                .parse()
                .map_err(|e| Error::InvalidConfig {
                    message: format!("bridge CIDR '{}' is not valid: {e}", self.bridge_cidr),
                })?;

        let container: Ipv4Network =
            self.container_cidr
                .parse()
                .map_err(|e| Error::InvalidConfig {
                    message: format!(
                        "container CIDR '{}' is not valid: {e}",
                        self.container_cidr
                    ),
                })?;

        if bridge.network() != container.network() || bridge.prefix() != container.prefix() {
            return Err(Error::InvalidConfig {
                message: format!(
                    "bridge address {bridge} and container address {container} must share a subnet"
                ),
            });
        }

        if bridge.ip() == container.ip() {
            return Err(Error::InvalidConfig {
                message: format!("bridge and container addresses must differ, both are {bridge}"),
            });
        }

        if self.bridge_name.is_empty() || self.bridge_name.len() > MAX_IFNAME_LEN {
            return Err(Error::InvalidConfig {
                message: format!("bridge name '{}' is not a valid link name", self.bridge_name),
            });
        }

        // Room for the trailing 0/1 discriminator
        if self.veth_name_prefix.is_empty() || self.veth_name_prefix.len() + 1 > MAX_IFNAME_LEN {
            return Err(Error::InvalidConfig {
                message: format!(
                    "veth name prefix '{}' is not a valid link name prefix",
                    self.veth_name_prefix
                ),
            });
        }

        Ok(NetworkConfig {
            bridge_name: self.bridge_name.clone(),
            veth_name_prefix: self.veth_name_prefix.clone(),
            bridge,
            container,
        })
    }
}

/// Validated network configuration, read-only after parse
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bridge interface name
    pub bridge_name: String,

    /// Veth pair name prefix
    pub veth_name_prefix: String,

    /// Bridge address with subnet
    pub bridge: Ipv4Network,

    /// Container address with subnet
    pub container: Ipv4Network,
}

impl NetworkConfig {
    /// Name of the host-side veth end
    #[must_use]
    pub fn host_veth_name(&self) -> String {
        format!("{}0", self.veth_name_prefix)
    }

    /// Name of the container-side veth end
    #[must_use]
    pub fn container_veth_name(&self) -> String {
        format!("{}1", self.veth_name_prefix)
    }

    /// Gateway seen from inside the container (the bridge address)
    #[must_use]
    pub fn gateway(&self) -> Ipv4Addr {
        self.bridge.ip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let config = NetworkSettings::default().parse().unwrap();

        assert_eq!(config.bridge_name, "brg0");
        assert_eq!(config.host_veth_name(), "veth0");
        assert_eq!(config.container_veth_name(), "veth1");
        assert_eq!(config.bridge.ip(), Ipv4Addr::new(10, 10, 10, 1));
        assert_eq!(config.container.ip(), Ipv4Addr::new(10, 10, 10, 2));
        assert_eq!(config.gateway(), Ipv4Addr::new(10, 10, 10, 1));
        assert_eq!(config.bridge.prefix(), 24);
    }

    #[test]
    fn test_malformed_bridge_cidr_rejected() {
        let settings = NetworkSettings {
            bridge_cidr: "not-an-ip".to_string(),
            ..Default::default()
        };

        let err = settings.parse().unwrap_err();
        assert!(err.to_string().contains("not-an-ip"));
    }

    #[test]
    fn test_malformed_container_cidr_rejected() {
        let settings = NetworkSettings {
            container_cidr: "10.10.10.2".to_string(), // missing prefix
            ..Default::default()
        };

        assert!(settings.parse().is_err());
    }

    #[test]
    fn test_addresses_must_share_subnet() {
        let settings = NetworkSettings {
            container_cidr: "192.168.1.2/24".to_string(),
            ..Default::default()
        };

        let err = settings.parse().unwrap_err();
        assert!(err.to_string().contains("share a subnet"));
    }

    #[test]
    fn test_addresses_must_differ() {
        let settings = NetworkSettings {
            container_cidr: DEFAULT_BRIDGE_CIDR.to_string(),
            ..Default::default()
        };

        let err = settings.parse().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_interface_names_bounded() {
        let settings = NetworkSettings {
            bridge_name: "a".repeat(16),
            ..Default::default()
        };
        assert!(settings.parse().is_err());

        let settings = NetworkSettings {
            veth_name_prefix: "a".repeat(15),
            ..Default::default()
        };
        assert!(settings.parse().is_err());
    }
}
