// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::Path;

use crate::{
    state::{Interface, InterfaceKind, Route},
    util::{target_path, write_file},
    NetfabError, NetworkState, Renderer, SubnetConfig, SubnetType,
};

const DEFAULT_SYSCONF_DIR: &str = "etc/sysconfig/network-scripts";
const DEFAULT_NETRULES_PATH: &str = "etc/udev/rules.d/70-persistent-net.rules";
const DEFAULT_DNS_PATH: &str = "etc/resolv.conf";

fn file_header(comment: &str) -> String {
    format!(
        "{comment} Created by netfab on instance boot automatically, \
         do not edit.\n{comment}\n"
    )
}

/// Renders RHEL-style ifcfg key-value files plus resolv.conf and udev
/// naming rules.
#[derive(Debug, Clone)]
pub struct SysconfigRenderer {
    pub sysconf_dir: String,
    pub netrules_path: Option<String>,
    pub dns_path: String,
}

impl Default for SysconfigRenderer {
    fn default() -> Self {
        Self {
            sysconf_dir: DEFAULT_SYSCONF_DIR.to_string(),
            netrules_path: Some(DEFAULT_NETRULES_PATH.to_string()),
            dns_path: DEFAULT_DNS_PATH.to_string(),
        }
    }
}

/// Sorted KEY=value serialization; values carrying whitespace get
/// quoted. Empty values still produce a `KEY=` line.
fn serialize_conf(conf: &BTreeMap<String, String>) -> String {
    let mut out = file_header("#");
    for (key, value) in conf {
        if value.split_whitespace().count() > 1 {
            out.push_str(&format!("{key}=\"{value}\"\n"));
        } else {
            out.push_str(&format!("{key}={value}\n"));
        }
    }
    out
}

fn set(conf: &mut BTreeMap<String, String>, key: &str, value: &str) {
    conf.insert(key.to_string(), value.to_string());
}

fn iface_type(kind: InterfaceKind) -> &'static str {
    match kind {
        InterfaceKind::Bond => "Bond",
        InterfaceKind::Bridge => "Bridge",
        _ => "Ethernet",
    }
}

impl SysconfigRenderer {
    fn base_conf(
        &self,
        state: &NetworkState,
        iface: &Interface,
    ) -> BTreeMap<String, String> {
        let mut conf = BTreeMap::new();
        set(&mut conf, "DEVICE", &iface.name);
        set(&mut conf, "BOOTPROTO", "none");
        set(&mut conf, "NM_CONTROLLED", "no");
        set(&mut conf, "ONBOOT", "yes");
        set(&mut conf, "USERCTL", "no");
        set(&mut conf, "TYPE", iface_type(iface.kind));
        if let Some(mac) = iface.mac_address.as_deref() {
            set(&mut conf, "HWADDR", mac);
        }
        if let Some(mtu) = iface.mtu {
            set(&mut conf, "MTU", &mtu.to_string());
        }
        if let Some(master) = iface.bond_master.as_deref() {
            set(&mut conf, "MASTER", master);
            set(&mut conf, "SLAVE", "yes");
        }
        if let Some(bridge) = state.bridge_for(&iface.name) {
            set(&mut conf, "BRIDGE", &bridge.name);
        }
        if iface.kind == InterfaceKind::Bond && !iface.bond_params.is_empty() {
            let opts: Vec<String> = iface
                .bond_params
                .iter()
                .map(|(key, value)| {
                    let key = key
                        .strip_prefix("bond-")
                        .or_else(|| key.strip_prefix("bond_"))
                        .unwrap_or(key);
                    format!("{key}={value}")
                })
                .collect();
            set(&mut conf, "BONDING_OPTS", &opts.join(" "));
        }
        if iface.kind == InterfaceKind::Vlan {
            set(&mut conf, "VLAN", "yes");
            if let Some(link) = iface.vlan_link.as_deref() {
                set(&mut conf, "PHYSDEV", link);
            }
        }
        conf
    }

    fn render_ifcfg_files(
        &self,
        state: &NetworkState,
        target: &Path,
    ) -> Result<(), NetfabError> {
        for iface in state.iter_interfaces() {
            if iface.kind == InterfaceKind::Loopback {
                continue;
            }
            let base = self.base_conf(state, iface);
            let mut files: Vec<(String, BTreeMap<String, String>)> =
                Vec::new();
            let mut v4_routes: Vec<(String, Vec<Route>)> = Vec::new();
            if iface.subnets.len() > 1 {
                // The base file stays an address-less carrier and each
                // subnet becomes an alias device.
                files.push((iface.name.clone(), base.clone()));
                for (index, subnet) in iface.subnets.iter().enumerate() {
                    let alias = format!("{}:{}", iface.name, index);
                    let mut conf = base.clone();
                    set(&mut conf, "DEVICE", &alias);
                    let routes = apply_subnet(&mut conf, subnet)?;
                    files.push((alias.clone(), conf));
                    if !routes.is_empty() {
                        v4_routes.push((alias, routes));
                    }
                }
            } else {
                let mut conf = base;
                if let Some(subnet) = iface.subnets.first() {
                    let routes = apply_subnet(&mut conf, subnet)?;
                    if !routes.is_empty() {
                        v4_routes.push((iface.name.clone(), routes));
                    }
                }
                files.push((iface.name.clone(), conf));
            }
            for (name, conf) in files {
                let relpath = format!("{}/ifcfg-{}", self.sysconf_dir, name);
                write_file(
                    &target_path(target, &relpath),
                    &serialize_conf(&conf),
                )?;
            }
            for (name, routes) in v4_routes {
                let mut conf = BTreeMap::new();
                for (index, route) in routes.iter().enumerate() {
                    set(
                        &mut conf,
                        &format!("ADDRESS{index}"),
                        &route.network,
                    );
                    set(
                        &mut conf,
                        &format!("NETMASK{index}"),
                        &route.netmask,
                    );
                    if let Some(gateway) = route.gateway.as_deref() {
                        set(&mut conf, &format!("GATEWAY{index}"), gateway);
                    }
                }
                let relpath = format!("{}/route-{}", self.sysconf_dir, name);
                write_file(
                    &target_path(target, &relpath),
                    &serialize_conf(&conf),
                )?;
            }
        }
        Ok(())
    }

    fn render_resolv_conf(
        &self,
        state: &NetworkState,
        target: &Path,
    ) -> Result<(), NetfabError> {
        let mut nameservers: Vec<String> = Vec::new();
        let mut searchdomains: Vec<String> = Vec::new();
        for iface in state.iter_interfaces() {
            for subnet in &iface.subnets {
                for ns in &subnet.dns_nameservers {
                    if !nameservers.contains(ns) {
                        nameservers.push(ns.clone());
                    }
                }
                for domain in &subnet.dns_search {
                    if !searchdomains.contains(domain) {
                        searchdomains.push(domain.clone());
                    }
                }
            }
        }
        for ns in state.dns_nameservers() {
            if !nameservers.contains(ns) {
                nameservers.push(ns.clone());
            }
        }
        for domain in state.dns_searchdomains() {
            if !searchdomains.contains(domain) {
                searchdomains.push(domain.clone());
            }
        }
        if nameservers.is_empty() && searchdomains.is_empty() {
            return Ok(());
        }
        let mut content = file_header(";");
        for ns in &nameservers {
            content.push_str(&format!("nameserver {ns}\n"));
        }
        if !searchdomains.is_empty() {
            content.push_str(&format!("search {}\n", searchdomains.join(" ")));
        }
        write_file(&target_path(target, &self.dns_path), &content)
    }
}

/// Apply one subnet onto an ifcfg map, returning the IPv4 routes that
/// belong in the companion route file.
fn apply_subnet(
    conf: &mut BTreeMap<String, String>,
    subnet: &SubnetConfig,
) -> Result<Vec<Route>, NetfabError> {
    match subnet.subnet_type {
        SubnetType::Dhcp6 => {
            set(conf, "BOOTPROTO", "dhcp");
            set(conf, "DHCPV6C", "yes");
            set(conf, "IPV6INIT", "yes");
        }
        SubnetType::Dhcp | SubnetType::Dhcp4 => {
            set(conf, "BOOTPROTO", "dhcp");
        }
        SubnetType::Static => {
            set(conf, "BOOTPROTO", "static");
            if let Some(address) = subnet.address.as_deref() {
                if crate::ip::is_ipv6_addr(address) {
                    set(conf, "IPV6ADDR", address);
                    set(conf, "IPV6INIT", "yes");
                    set(
                        conf,
                        "NETMASK",
                        subnet.netmask.as_deref().unwrap_or(""),
                    );
                } else if let Some((addr, prefix)) = address.split_once('/') {
                    set(conf, "IPADDR", addr);
                    let prefix = prefix.parse::<u8>().map_err(|_| {
                        NetfabError::new(
                            crate::ErrorKind::InvalidArgument,
                            format!("Invalid address {address}"),
                        )
                    })?;
                    set(
                        conf,
                        "NETMASK",
                        &crate::ip::prefix_to_netmask(prefix)?,
                    );
                } else {
                    set(conf, "IPADDR", address);
                    set(
                        conf,
                        "NETMASK",
                        subnet.netmask.as_deref().unwrap_or(""),
                    );
                }
            }
        }
        SubnetType::Manual | SubnetType::Loopback => {
            set(conf, "BOOTPROTO", "none");
            set(conf, "ONBOOT", "no");
        }
    }
    if let Some(gateway) = subnet.gateway.as_deref() {
        if crate::ip::is_ipv6_addr(gateway) {
            set(conf, "IPV6_DEFAULTGW", gateway);
            set(conf, "DEFROUTE", "yes");
        } else {
            set(conf, "GATEWAY", gateway);
            set(conf, "DEFROUTE", "yes");
        }
    }
    let mut v4_routes = Vec::new();
    for route_config in &subnet.routes {
        let route = Route::from_config(route_config)?;
        if route.is_default() {
            set(conf, "DEFROUTE", "yes");
            if let Some(gateway) = route.gateway.as_deref() {
                if route.is_ipv6() {
                    set(conf, "IPV6_DEFAULTGW", gateway);
                } else {
                    set(conf, "GATEWAY", gateway);
                }
            }
        }
        if !route.is_ipv6() {
            v4_routes.push(route);
        }
    }
    Ok(v4_routes)
}

impl Renderer for SysconfigRenderer {
    fn render_network_state(
        &self,
        state: &NetworkState,
        target: &Path,
    ) -> Result<(), NetfabError> {
        self.render_ifcfg_files(state, target)?;
        self.render_resolv_conf(state, target)?;
        if let Some(netrules_path) = self.netrules_path.as_deref() {
            let rules = super::eni::persistent_net_rules(state);
            if !rules.is_empty() {
                write_file(&target_path(target, netrules_path), &rules)?;
            }
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        super::sysconfig_available()
    }
}
