//! Host discovery for the server certificate.
//!
//! The server certificate has to be valid for every address a client might
//! use to reach the listener. By default that is every IPv4 address bound to
//! a local interface, followed by whatever names the operator passes on the
//! command line.

use std::collections::HashSet;
use std::net::Ipv4Addr;

use nix::ifaddrs::getifaddrs;
use tracing::debug;

/// List the IPv4 addresses of all local interfaces, in interface order.
///
/// Interfaces without an address and non-IPv4 families are skipped.
pub fn interface_ipv4_addresses() -> std::io::Result<Vec<Ipv4Addr>> {
    let addrs = getifaddrs().map_err(std::io::Error::from)?;
    let mut out = Vec::new();
    for ifaddr in addrs {
        let Some(ip) = ifaddr
            .address
            .as_ref()
            .and_then(|addr| addr.as_sockaddr_in())
            .map(|sin| sin.ip())
        else {
            continue;
        };
        debug!(interface = %ifaddr.interface_name, %ip, "Discovered interface address");
        out.push(ip);
    }
    Ok(out)
}

/// Build the ordered host list for the server certificate.
///
/// Discovered interface addresses (when `discover` is set) come first,
/// then `supplied` names. Repeated entries keep their first position.
pub fn resolve_hosts<I, S>(discover: bool, supplied: I) -> std::io::Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let discovered = if discover {
        interface_ipv4_addresses()?
    } else {
        Vec::new()
    };

    Ok(dedup_keep_first(
        discovered
            .into_iter()
            .map(|ip| ip.to_string())
            .chain(supplied.into_iter().map(Into::into)),
    ))
}

fn dedup_keep_first(hosts: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    hosts.filter(|h| seen.insert(h.clone())).collect()
}
