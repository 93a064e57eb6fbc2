// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use crate::{
    state::{Interface, InterfaceKind, Route},
    util::{target_path, write_file},
    ConfigEntry, DeviceConfig, ErrorKind, NameserverEntry, NetfabError,
    NetworkConfig, NetworkState, Renderer, SubnetConfig, SubnetControl,
    SubnetType,
};

const DEFAULT_ENI_PATH: &str = "etc/network/interfaces";
const DEFAULT_LINKS_PREFIX: &str = "etc/systemd/network/50-netfab-";
const DEFAULT_NETRULES_PATH: &str = "etc/udev/rules.d/70-persistent-net.rules";

/// Renders a Debian `/etc/network/interfaces` file plus optional udev
/// persistent-net rules and systemd `.link` naming files.
#[derive(Debug, Clone)]
pub struct EniRenderer {
    pub eni_path: String,
    pub eni_header: Option<String>,
    pub links_path_prefix: Option<String>,
    pub netrules_path: Option<String>,
}

impl Default for EniRenderer {
    fn default() -> Self {
        Self {
            eni_path: DEFAULT_ENI_PATH.to_string(),
            eni_header: None,
            links_path_prefix: Some(DEFAULT_LINKS_PREFIX.to_string()),
            netrules_path: Some(DEFAULT_NETRULES_PATH.to_string()),
        }
    }
}

impl EniRenderer {
    /// Renderer writing only the interfaces file at `eni_path`.
    pub fn bare(eni_path: &str) -> Self {
        Self {
            eni_path: eni_path.to_string(),
            eni_header: None,
            links_path_prefix: None,
            netrules_path: None,
        }
    }
}

impl Renderer for EniRenderer {
    fn render_network_state(
        &self,
        state: &NetworkState,
        target: &Path,
    ) -> Result<(), NetfabError> {
        let content = network_state_to_eni(
            state,
            self.eni_header.as_deref(),
            false,
        )?;
        write_file(&target_path(target, &self.eni_path), &content)?;
        if let Some(netrules_path) = self.netrules_path.as_deref() {
            let rules = persistent_net_rules(state);
            if !rules.is_empty() {
                write_file(&target_path(target, netrules_path), &rules)?;
            }
        }
        if let Some(prefix) = self.links_path_prefix.as_deref() {
            for iface in state.iter_interfaces() {
                if iface.kind != InterfaceKind::Physical {
                    continue;
                }
                let mac = match iface.mac_address.as_deref() {
                    Some(mac) => mac,
                    None => continue,
                };
                let relpath = format!("{}{}.link", prefix, iface.name);
                let content = format!(
                    "[Match]\nMACAddress={}\n\n[Link]\nName={}\n",
                    mac, iface.name
                );
                write_file(&target_path(target, &relpath), &content)?;
            }
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        super::eni_available()
    }
}

pub(crate) fn persistent_net_rules(state: &NetworkState) -> String {
    let mut rules = String::new();
    for iface in state.iter_interfaces() {
        if iface.kind != InterfaceKind::Physical {
            continue;
        }
        if let Some(mac) = iface.mac_address.as_deref() {
            rules.push_str(&format!(
                "SUBSYSTEM==\"net\", ACTION==\"add\", DRIVERS==\"?*\", \
                 ATTR{{address}}==\"{}\", NAME=\"{}\"\n",
                mac, iface.name
            ));
        }
    }
    rules
}

fn kind_rank(kind: InterfaceKind) -> u8 {
    match kind {
        InterfaceKind::Loopback => 0,
        InterfaceKind::Physical => 1,
        InterfaceKind::Bond => 2,
        InterfaceKind::Bridge => 3,
        InterfaceKind::Vlan => 4,
    }
}

fn subnet_is_ipv6(subnet: &SubnetConfig) -> bool {
    if subnet.subnet_type == SubnetType::Dhcp6 {
        return true;
    }
    matches!(
        subnet.subnet_type,
        SubnetType::Static | SubnetType::Manual
    ) && subnet
        .address
        .as_deref()
        .map(crate::ip::is_ipv6_addr)
        .unwrap_or(false)
}

fn route_lines(route: &Route, indent: usize) -> Vec<String> {
    let gateway = match route.gateway.as_deref() {
        Some(gateway) => gateway,
        None => return Vec::new(),
    };
    let args = if route.is_default() {
        if route.is_ipv6() {
            format!("-A inet6 default gw {gateway}")
        } else {
            format!("default gw {gateway}")
        }
    } else {
        let metric = match route.metric {
            Some(metric) => format!(" metric {metric}"),
            None => String::new(),
        };
        format!(
            "-net {} netmask {} gw {}{}",
            route.network, route.netmask, gateway, metric
        )
    };
    let pad = " ".repeat(indent);
    vec![
        format!("{pad}post-up route add {args} || true"),
        format!("{pad}pre-down route del {args} || true"),
    ]
}

/// The `key value` attribute lines an interface carries on its first
/// stanza: composite membership, composite parameters and hardware
/// address pinning.
fn iface_attr_lines(iface: &Interface, render_hwaddress: bool) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(master) = iface.bond_master.as_deref() {
        lines.push(format!("bond-master {master}"));
    }
    match iface.kind {
        InterfaceKind::Bond => {
            for (key, value) in &iface.bond_params {
                lines.push(format!("{key} {value}"));
            }
            lines.push("bond-slaves none".to_string());
        }
        InterfaceKind::Bridge => {
            if !iface.bridge_ports.is_empty() {
                lines.push(format!(
                    "bridge_ports {}",
                    iface.bridge_ports.join(" ")
                ));
            }
            for (key, value) in &iface.bridge_params {
                lines.push(format!("{key} {value}"));
            }
        }
        InterfaceKind::Vlan => {
            if let Some(link) = iface.vlan_link.as_deref() {
                lines.push(format!("vlan-raw-device {link}"));
            }
            if let Some(id) = iface.vlan_id {
                lines.push(format!("vlan_id {id}"));
            }
        }
        InterfaceKind::Physical | InterfaceKind::Loopback => {
            if iface.is_bond_member() {
                for (key, value) in &iface.bond_params {
                    lines.push(format!("{key} {value}"));
                }
            }
        }
    }
    if let Some(mtu) = iface.mtu {
        lines.push(format!("mtu {mtu}"));
    }
    if let Some(mac) = iface.mac_address.as_deref() {
        let always = matches!(
            iface.kind,
            InterfaceKind::Bond | InterfaceKind::Bridge | InterfaceKind::Vlan
        );
        if always || render_hwaddress {
            lines.push(format!("hwaddress {mac}"));
        }
    }
    lines
}

fn subnet_lines(subnet: &SubnetConfig) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(address) = subnet.address.as_deref() {
        lines.push(format!("address {address}"));
    }
    if let Some(netmask) = subnet.netmask.as_deref() {
        lines.push(format!("netmask {netmask}"));
    }
    if let Some(broadcast) = subnet.broadcast.as_deref() {
        lines.push(format!("broadcast {broadcast}"));
    }
    if let Some(gateway) = subnet.gateway.as_deref() {
        lines.push(format!("gateway {gateway}"));
    }
    if let Some(metric) = subnet.metric {
        lines.push(format!("metric {metric}"));
    }
    if !subnet.dns_nameservers.is_empty() {
        lines.push(format!(
            "dns-nameservers {}",
            subnet.dns_nameservers.join(" ")
        ));
    }
    if !subnet.dns_search.is_empty() {
        lines.push(format!("dns-search {}", subnet.dns_search.join(" ")));
    }
    lines
}

fn iface_sections(
    state: &NetworkState,
    iface: &Interface,
    render_hwaddress: bool,
) -> Result<Vec<String>, NetfabError> {
    let mut subnets = iface.subnets.clone();
    // Global DNS lands on the loopback stanza.
    if iface.name == "lo" {
        if let Some(subnet) = subnets.first_mut() {
            if !state.dns_nameservers().is_empty() {
                subnet.dns_nameservers = state.dns_nameservers().to_vec();
            }
            if !state.dns_searchdomains().is_empty() {
                subnet.dns_search = state.dns_searchdomains().to_vec();
            }
        }
    }
    if subnets.is_empty() {
        let mut lines = Vec::new();
        if iface.is_bond_member() {
            lines.push(format!("auto {}", iface.name));
        }
        lines.push(format!("iface {} inet manual", iface.name));
        let mut attrs = iface_attr_lines(iface, render_hwaddress);
        attrs.sort_unstable();
        for attr in attrs {
            lines.push(format!("    {attr}"));
        }
        return Ok(vec![lines.join("\n")]);
    }
    let mut sections = Vec::new();
    for (index, subnet) in subnets.iter().enumerate() {
        let mut lines = Vec::new();
        if index == 0 {
            match subnet.control {
                SubnetControl::Auto => {
                    lines.push(format!("auto {}", iface.name));
                }
                SubnetControl::Hotplug => {
                    lines.push(format!("allow-hotplug {}", iface.name));
                }
                SubnetControl::Manual => {
                    lines.push(format!("# control-manual {}", iface.name));
                }
            }
        } else {
            lines.push(format!("# control-alias {}", iface.name));
        }
        let family = if subnet_is_ipv6(subnet) { "inet6" } else { "inet" };
        let mode = if subnet.subnet_type.is_dhcp() {
            "dhcp"
        } else {
            subnet.subnet_type.as_str()
        };
        lines.push(format!("iface {} {} {}", iface.name, family, mode));
        let mut body = subnet_lines(subnet);
        if index == 0 {
            body.extend(iface_attr_lines(iface, render_hwaddress));
        }
        body.sort_unstable();
        for line in body {
            lines.push(format!("    {line}"));
        }
        for route_config in &subnet.routes {
            let route = Route::from_config(route_config)?;
            lines.extend(route_lines(&route, 4));
        }
        sections.push(lines.join("\n"));
    }
    Ok(sections)
}

/// Render the whole state to interfaces(5) text. `render_hwaddress`
/// adds `hwaddress` pinning lines to physical stanzas, used when the
/// text leaves the host it was generated on.
pub fn network_state_to_eni(
    state: &NetworkState,
    header: Option<&str>,
    render_hwaddress: bool,
) -> Result<String, NetfabError> {
    let mut order: Vec<&Interface> = state.iter_interfaces().collect();
    order.sort_by_key(|i| (kind_rank(i.kind), i.name.clone()));
    let mut sections = Vec::new();
    for iface in order {
        sections.extend(iface_sections(state, iface, render_hwaddress)?);
    }
    for route in state.iter_routes() {
        let lines = route_lines(route, 0);
        if !lines.is_empty() {
            sections.push(lines.join("\n"));
        }
    }
    let mut content = String::new();
    if let Some(header) = header {
        content.push_str(header);
    }
    content.push_str(&sections.join("\n\n"));
    content.push('\n');
    Ok(content)
}

#[derive(Debug, Default)]
struct EniStanza {
    method: String,
    control: SubnetControl,
    address: Option<String>,
    netmask: Option<String>,
    broadcast: Option<String>,
    gateway: Option<String>,
    hwaddress: Option<String>,
    dns_nameservers: Vec<String>,
    dns_search: Vec<String>,
}

/// Import a legacy interfaces(5) file as a declarative document.
/// Alias stanzas (`eth0:1`) fold into their parent device; `lo` is not
/// imported as an interface, its DNS options become a global
/// nameserver entry.
pub fn convert_eni_data(
    eni_data: &str,
) -> Result<NetworkConfig, NetfabError> {
    let mut stanzas: Vec<(String, EniStanza)> = Vec::new();
    let mut controls: Vec<(String, SubnetControl)> = Vec::new();
    let mut current: Option<usize> = None;
    for raw_line in eni_data.lines() {
        let line = match raw_line.split_once('#') {
            Some((before, _)) => before,
            None => raw_line,
        };
        let mut tokens = line.split_whitespace();
        let keyword = match tokens.next() {
            Some(keyword) => keyword,
            None => continue,
        };
        let indented = raw_line.starts_with([' ', '\t']);
        match keyword {
            "auto" | "allow-auto" if !indented => {
                for name in tokens {
                    controls.push((name.to_string(), SubnetControl::Auto));
                }
                current = None;
            }
            "allow-hotplug" if !indented => {
                for name in tokens {
                    controls.push((name.to_string(), SubnetControl::Hotplug));
                }
                current = None;
            }
            "iface" if !indented => {
                let name = tokens.next().ok_or_else(|| {
                    NetfabError::new(
                        ErrorKind::InvalidArgument,
                        format!("Invalid iface line: {raw_line}"),
                    )
                })?;
                let _family = tokens.next();
                let method = tokens.next().unwrap_or("manual");
                stanzas.push((
                    name.to_string(),
                    EniStanza {
                        method: method.to_string(),
                        control: SubnetControl::Manual,
                        ..Default::default()
                    },
                ));
                current = Some(stanzas.len() - 1);
            }
            "source" | "source-directory" if !indented => {
                current = None;
            }
            option => {
                let pos = match current {
                    Some(pos) => pos,
                    None => continue,
                };
                let stanza = &mut stanzas[pos].1;
                let values: Vec<String> =
                    tokens.map(str::to_string).collect();
                let value = values.join(" ");
                match option {
                    "address" => stanza.address = Some(value),
                    "netmask" => stanza.netmask = Some(value),
                    "broadcast" => stanza.broadcast = Some(value),
                    "gateway" => stanza.gateway = Some(value),
                    "hwaddress" => stanza.hwaddress = Some(value),
                    "dns-nameservers" => stanza.dns_nameservers = values,
                    "dns-search" => stanza.dns_search = values,
                    _ => {}
                }
            }
        }
    }
    for (name, control) in controls {
        for (stanza_name, stanza) in stanzas.iter_mut() {
            if *stanza_name == name {
                stanza.control = control;
            }
        }
    }

    let mut devices: Vec<(String, DeviceConfig)> = Vec::new();
    let mut global_dns = NameserverEntry::default();
    for (name, stanza) in stanzas {
        let devname = match name.split_once(':') {
            Some((devname, _)) => devname.to_string(),
            None => name,
        };
        if devname == "lo" {
            global_dns
                .address
                .extend(stanza.dns_nameservers.iter().cloned());
            global_dns.search.extend(stanza.dns_search.iter().cloned());
            continue;
        }
        let subnet_type = match stanza.method.as_str() {
            "static" => SubnetType::Static,
            "dhcp" => SubnetType::Dhcp,
            "loopback" => SubnetType::Loopback,
            _ => SubnetType::Manual,
        };
        let subnet = SubnetConfig {
            subnet_type,
            address: stanza.address,
            netmask: stanza.netmask,
            broadcast: stanza.broadcast,
            gateway: stanza.gateway,
            control: stanza.control,
            dns_nameservers: stanza.dns_nameservers,
            dns_search: stanza.dns_search,
            ..Default::default()
        };
        match devices.iter_mut().find(|(n, _)| *n == devname) {
            Some((_, device)) => device.subnets.push(subnet),
            None => {
                devices.push((
                    devname.clone(),
                    DeviceConfig {
                        name: devname,
                        mac_address: stanza.hwaddress,
                        mtu: None,
                        subnets: vec![subnet],
                    },
                ));
            }
        }
    }
    devices.sort_by(|a, b| a.0.cmp(&b.0));
    let mut entries: Vec<ConfigEntry> = devices
        .into_iter()
        .map(|(_, device)| ConfigEntry::Physical(device))
        .collect();
    if !global_dns.address.is_empty() || !global_dns.search.is_empty() {
        entries.push(ConfigEntry::Nameserver(global_dns));
    }
    NetworkConfig::from_entries(entries)
}
