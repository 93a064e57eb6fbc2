// SPDX-License-Identifier: Apache-2.0

use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::{ErrorKind, NetfabError};

const IPV4_ADDR_LEN: u8 = 32;

pub(crate) fn is_ipv6_addr(addr: &str) -> bool {
    addr.contains(':')
}

/// Convert an IPv4 prefix length to its dotted netmask form, e.g.
/// `8` to `255.0.0.0`.
pub(crate) fn prefix_to_netmask(prefix: u8) -> Result<String, NetfabError> {
    if prefix > IPV4_ADDR_LEN {
        return Err(NetfabError::new(
            ErrorKind::InvalidArgument,
            format!("Invalid IPv4 prefix length {prefix}"),
        ));
    }
    let mask: u32 = if prefix == 0 {
        0
    } else {
        u32::MAX << (IPV4_ADDR_LEN - prefix)
    };
    Ok(Ipv4Addr::from(mask).to_string())
}

/// Convert a dotted IPv4 netmask to its prefix length, e.g.
/// `255.255.252.0` to `22`. The mask must be contiguous.
pub(crate) fn netmask_to_prefix(netmask: &str) -> Result<u8, NetfabError> {
    let mask = u32::from(Ipv4Addr::from_str(netmask).map_err(|_| {
        NetfabError::new(
            ErrorKind::InvalidArgument,
            format!("Invalid IPv4 netmask {netmask}"),
        )
    })?);
    let prefix = mask.count_ones() as u8;
    let expect: u32 = if prefix == 0 {
        0
    } else {
        u32::MAX << (IPV4_ADDR_LEN - prefix)
    };
    if mask != expect {
        return Err(NetfabError::new(
            ErrorKind::InvalidArgument,
            format!("Non-contiguous IPv4 netmask {netmask}"),
        ));
    }
    Ok(prefix)
}

/// Split a CIDR destination into `(network, netmask)`.
/// IPv6 destinations keep the prefix length as the netmask value since
/// every consumer of IPv6 routes works with prefix lengths.
pub(crate) fn cidr_split(
    destination: &str,
) -> Result<(String, String), NetfabError> {
    let (network, prefix_str) = match destination.split_once('/') {
        Some((n, p)) => (n, p),
        None => {
            return Err(NetfabError::new(
                ErrorKind::InvalidArgument,
                format!("Route destination {destination} is not in CIDR form"),
            ));
        }
    };
    if is_ipv6_addr(network) {
        return Ok((network.to_string(), prefix_str.to_string()));
    }
    let prefix = prefix_str.parse::<u8>().map_err(|_| {
        NetfabError::new(
            ErrorKind::InvalidArgument,
            format!("Invalid prefix length in route destination {destination}"),
        )
    })?;
    Ok((network.to_string(), prefix_to_netmask(prefix)?))
}

/// CIDR form of a subnet address: pass through an already-CIDR address,
/// otherwise join the bare address with the prefix length derived from
/// the separate netmask.
pub(crate) fn address_to_cidr(
    address: &str,
    netmask: Option<&str>,
) -> Result<String, NetfabError> {
    if address.contains('/') {
        return Ok(address.to_string());
    }
    match netmask {
        Some(netmask) if !netmask.is_empty() => {
            if is_ipv6_addr(address) {
                Ok(format!("{address}/{netmask}"))
            } else {
                Ok(format!("{address}/{}", netmask_to_prefix(netmask)?))
            }
        }
        _ => Ok(address.to_string()),
    }
}
