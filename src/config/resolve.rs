// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Device address resolution

use std::net::{IpAddr, Ipv4Addr};

use tracing::{debug, info};

use super::ConfigError;

/// Four dot-separated groups of one to three digits
fn looks_dotted_quad(address: &str) -> bool {
    let groups: Vec<&str> = address.split('.').collect();
    groups.len() == 4
        && groups
            .iter()
            .all(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()))
}

/// Resolve a configured address to an IPv4 address, once, at startup
///
/// Numeric addresses are validated octet by octet; anything else is looked
/// up through the system resolver.
pub async fn resolve_address(address: &str) -> Result<IpAddr, ConfigError> {
    let address = address.trim();

    if looks_dotted_quad(address) {
        let mut octets = [0u8; 4];
        for (slot, group) in octets.iter_mut().zip(address.split('.')) {
            *slot = group
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(address.to_string()))?;
        }
        debug!("Verified {} as a dotted-quad address", address);
        return Ok(IpAddr::V4(Ipv4Addr::from(octets)));
    }

    if address.is_empty() {
        return Err(ConfigError::InvalidAddress(address.to_string()));
    }

    let unresolvable = |reason: String| ConfigError::Unresolvable {
        host: address.to_string(),
        reason,
    };

    let resolved = tokio::net::lookup_host((address, 0))
        .await
        .map_err(|e| unresolvable(e.to_string()))?
        .map(|socket| socket.ip())
        .find(IpAddr::is_ipv4)
        .ok_or_else(|| unresolvable("no IPv4 address".to_string()))?;

    info!("Resolved {} to {}", address, resolved);
    Ok(resolved)
}
