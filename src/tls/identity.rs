//! Discovery of the addresses a development certificate has to cover.
//!
//! The certificate is always valid for `localhost` and `127.0.0.1`, plus
//! every non-loopback IPv4 address assigned to one of the host's interfaces
//! so that other devices on the LAN can reach the server by IP.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr};

use log::{debug, info};

use super::error::{BootstrapError, Result};

/// DNS name embedded in every generated certificate.
pub const LOCALHOST: &str = "localhost";

/// Read-only view of the host's interface/address table.
pub trait InterfaceTable {
    /// Names of all interfaces, in the order the OS reports them.
    fn interface_names(&self) -> io::Result<Vec<String>>;

    /// Addresses assigned to a single interface.
    fn addresses(&self, interface: &str) -> io::Result<Vec<IpAddr>>;
}

/// Names and addresses a certificate asserts it is valid for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySet {
    dns_names: Vec<String>,
    ips: Vec<Ipv4Addr>,
}

impl IdentitySet {
    /// Identity set containing only `localhost` / `127.0.0.1`.
    pub fn loopback() -> Self {
        Self {
            dns_names: vec![LOCALHOST.to_string()],
            ips: vec![Ipv4Addr::LOCALHOST],
        }
    }

    pub fn dns_names(&self) -> &[String] {
        &self.dns_names
    }

    pub fn ips(&self) -> &[Ipv4Addr] {
        &self.ips
    }

    fn push(&mut self, ip: Ipv4Addr) {
        self.ips.push(ip);
    }
}

impl fmt::Display for IdentitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ips: Vec<String> = self.ips.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", ips.join(" "))
    }
}

/// Build the identity set from an interface table.
///
/// Only a failure of the top-level listing is an error. An interface whose
/// addresses cannot be read is skipped and the rest are still examined.
pub fn discover(table: &impl InterfaceTable) -> Result<IdentitySet> {
    let names = table
        .interface_names()
        .map_err(BootstrapError::InterfaceEnumeration)?;

    let mut identities = IdentitySet::loopback();
    for name in &names {
        let addrs = match table.addresses(name) {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!("Skipping interface {name}: {e}");
                continue;
            }
        };
        for addr in addrs {
            if let IpAddr::V4(v4) = addr
                && !v4.is_loopback()
            {
                identities.push(v4);
            }
        }
    }

    info!("Certificate will be valid for the following IPs: {identities}");
    Ok(identities)
}

/// Interface an address entry belongs to. IPv4 aliases are reported under
/// their label (`eth0:1`) but are assigned to the base interface.
#[cfg_attr(not(unix), allow(dead_code))]
fn base_interface(entry_name: &str) -> &str {
    entry_name
        .split_once(':')
        .map_or(entry_name, |(base, _)| base)
}

/// The operating system's interface table.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInterfaces;

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        impl InterfaceTable for SystemInterfaces {
            fn interface_names(&self) -> io::Result<Vec<String>> {
                let interfaces = nix::net::if_::if_nameindex()?;
                Ok(interfaces
                    .iter()
                    .map(|iface| iface.name().to_string_lossy().into_owned())
                    .collect())
            }

            fn addresses(&self, interface: &str) -> io::Result<Vec<IpAddr>> {
                use std::net::{SocketAddrV4, SocketAddrV6};

                let mut addrs = Vec::new();
                for entry in nix::ifaddrs::getifaddrs()? {
                    if base_interface(&entry.interface_name) != interface {
                        continue;
                    }
                    let Some(storage) = entry.address else {
                        continue;
                    };
                    if let Some(sin) = storage.as_sockaddr_in() {
                        addrs.push(IpAddr::V4(*SocketAddrV4::from(*sin).ip()));
                    } else if let Some(sin6) = storage.as_sockaddr_in6() {
                        addrs.push(IpAddr::V6(*SocketAddrV6::from(*sin6).ip()));
                    }
                }
                Ok(addrs)
            }
        }
    } else {
        impl InterfaceTable for SystemInterfaces {
            fn interface_names(&self) -> io::Result<Vec<String>> {
                log::warn!("Interface enumeration not supported on this platform, using loopback only");
                Ok(Vec::new())
            }

            fn addresses(&self, _interface: &str) -> io::Result<Vec<IpAddr>> {
                Ok(Vec::new())
            }
        }
    }
}
