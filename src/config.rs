//! Server configuration: bind address and the two well-known ports.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default port of the client-facing service interface.
pub const DEFAULT_SERVICE_PORT: u16 = 6000;

/// Default port of the storage-node registration interface.
pub const DEFAULT_REGISTRATION_PORT: u16 = 6001;

/// Naming-server configuration, loadable from a TOML file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address both listeners bind on.
    pub bind: IpAddr,
    /// Port of the client-facing service interface.
    pub service_port: u16,
    /// Port of the storage-node registration interface.
    pub registration_port: u16,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            service_port: DEFAULT_SERVICE_PORT,
            registration_port: DEFAULT_REGISTRATION_PORT,
        }
    }
}

impl Config {
    /// Loads a configuration file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            Error::InvalidArgument(format!("cannot read config {}: {err}", path.display()))
        })?;
        toml::from_str(&raw).map_err(|err| {
            Error::InvalidArgument(format!("cannot parse config {}: {err}", path.display()))
        })
    }

    pub fn service_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.service_port)
    }

    pub fn registration_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.registration_port)
    }
}
