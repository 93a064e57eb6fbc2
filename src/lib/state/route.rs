// SPDX-License-Identifier: Apache-2.0

use crate::{
    ip::{cidr_split, is_ipv6_addr},
    ErrorKind, NetfabError, RouteConfig,
};

/// A route normalized to network + netmask form. IPv4 netmasks are
/// dotted, IPv6 ones are prefix lengths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub network: String,
    pub netmask: String,
    pub gateway: Option<String>,
    pub metric: Option<u32>,
}

impl Route {
    pub fn from_config(config: &RouteConfig) -> Result<Self, NetfabError> {
        let (network, netmask) = if let Some(dest) = config.destination.as_ref()
        {
            cidr_split(dest)?
        } else if let Some(network) = config.network.as_ref() {
            if network.contains('/') {
                cidr_split(network)?
            } else {
                let netmask = match config.netmask.as_ref() {
                    Some(netmask) => netmask.to_string(),
                    None if is_ipv6_addr(network) => "0".to_string(),
                    None => "0.0.0.0".to_string(),
                };
                (network.to_string(), netmask)
            }
        } else {
            return Err(NetfabError::new(
                ErrorKind::InvalidSchema,
                "Route entry requires a destination or a network".to_string(),
            ));
        };
        Ok(Self {
            network,
            netmask,
            gateway: config.gateway.clone(),
            metric: config.metric,
        })
    }

    pub fn is_ipv6(&self) -> bool {
        is_ipv6_addr(&self.network)
    }

    pub fn is_default(&self) -> bool {
        if self.is_ipv6() {
            self.network == "::"
        } else {
            self.network == "0.0.0.0" && self.netmask == "0.0.0.0"
        }
    }
}
