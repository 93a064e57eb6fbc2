// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use crate::{
    state::{Interface, InterfaceKind, Route},
    util::{target_path, write_file},
    DeviceInfo, NetfabError, NetworkState, Renderer, SubnetType,
    SysfsDeviceInfo,
};

use super::{CommandRunner, ExecCommandRunner};

const DEFAULT_NETPLAN_PATH: &str = "etc/netplan/50-netfab.yaml";

/// The config snapd ships on first boot. Only a byte-identical copy is
/// safe to clean up; anything else was touched by the user.
const KNOWN_SNAPD_CONFIG: &str = "\
# This is the initial network config.
# It can be overwritten by cloud-init or console-conf.
network:
    version: 2
    ethernets:
        all-en:
            match:
                name: \"en*\"
            dhcp4: true
        all-eth:
            match:
                name: \"eth*\"
            dhcp4: true
";

const SNAPD_CONFIG_PATH: &str = "etc/netplan/00-snapd-config.yaml";

const SNAPD_DERIVED_PATHS: [&str; 3] = [
    "run/systemd/network/10-netplan-all-en.network",
    "run/systemd/network/10-netplan-all-eth.network",
    "run/systemd/generator/netplan.stamp",
];

/// Remove the distro-seeded default netplan config, but only when it
/// is still exactly the shipped content.
pub fn clean_default(target: &Path) -> Result<(), NetfabError> {
    let seeded = target_path(target, SNAPD_CONFIG_PATH);
    let content = match std::fs::read_to_string(&seeded) {
        Ok(content) => content,
        Err(_) => return Ok(()),
    };
    if content != KNOWN_SNAPD_CONFIG {
        return Ok(());
    }
    log::debug!("Removing seeded default config {}", seeded.display());
    std::fs::remove_file(&seeded)?;
    for relpath in SNAPD_DERIVED_PATHS {
        let derived = target_path(target, relpath);
        if derived.exists() {
            std::fs::remove_file(&derived)?;
        }
    }
    Ok(())
}

/// Minimal YAML tree with a PyYAML-shaped text form: 4-space indent,
/// sequence dashes at the parent key's column, mappings inside
/// sequences opened as `-   key: value`.
enum Node {
    Scalar(String),
    Map(Vec<(String, Node)>),
    List(Vec<Node>),
}

impl Node {
    fn scalar(value: impl std::fmt::Display) -> Self {
        Self::Scalar(value.to_string())
    }

    fn emit_map(entries: &[(String, Node)], indent: usize, out: &mut String) {
        let pad = " ".repeat(indent);
        for (key, node) in entries {
            match node {
                Node::Scalar(value) => {
                    out.push_str(&format!("{pad}{key}: {value}\n"));
                }
                Node::Map(children) if children.is_empty() => {
                    out.push_str(&format!("{pad}{key}: {{}}\n"));
                }
                Node::Map(children) => {
                    out.push_str(&format!("{pad}{key}:\n"));
                    Self::emit_map(children, indent + 4, out);
                }
                Node::List(items) => {
                    out.push_str(&format!("{pad}{key}:\n"));
                    Self::emit_list(items, indent, out);
                }
            }
        }
    }

    fn emit_list(items: &[Node], indent: usize, out: &mut String) {
        let pad = " ".repeat(indent);
        for item in items {
            match item {
                Node::Scalar(value) => {
                    out.push_str(&format!("{pad}- {value}\n"));
                }
                Node::Map(children) => {
                    let mut first = true;
                    for (key, node) in children {
                        let value = match node {
                            Node::Scalar(value) => value,
                            _ => continue,
                        };
                        if first {
                            out.push_str(&format!("{pad}-   {key}: {value}\n"));
                            first = false;
                        } else {
                            out.push_str(&format!("{pad}    {key}: {value}\n"));
                        }
                    }
                }
                Node::List(_) => {}
            }
        }
    }
}

/// Renders a netplan v2 YAML file and optionally pokes netplan and
/// udev afterwards.
pub struct NetplanRenderer {
    pub netplan_path: String,
    pub postcmds: bool,
    runner: Box<dyn CommandRunner>,
    devinfo: Box<dyn DeviceInfo>,
}

impl Default for NetplanRenderer {
    fn default() -> Self {
        Self {
            netplan_path: DEFAULT_NETPLAN_PATH.to_string(),
            postcmds: false,
            runner: Box::new(ExecCommandRunner),
            devinfo: Box::<SysfsDeviceInfo>::default(),
        }
    }
}

impl NetplanRenderer {
    pub fn new(
        netplan_path: &str,
        postcmds: bool,
        runner: Box<dyn CommandRunner>,
        devinfo: Box<dyn DeviceInfo>,
    ) -> Self {
        Self {
            netplan_path: netplan_path.to_string(),
            postcmds,
            runner,
            devinfo,
        }
    }

    fn run_postcmds(&self) {
        if let Err(e) = self.runner.run(&["netplan", "generate"]) {
            log::warn!("netplan generate failed: {e}");
        }
        for dev in self.devinfo.devices() {
            let sys_path = format!("/sys/class/net/{dev}");
            if let Err(e) = self.runner.run(&[
                "udevadm",
                "test-builtin",
                "net_setup_link",
                &sys_path,
            ]) {
                log::warn!("Setting up link for {dev} failed: {e}");
            }
        }
    }
}

impl Renderer for NetplanRenderer {
    fn render_network_state(
        &self,
        state: &NetworkState,
        target: &Path,
    ) -> Result<(), NetfabError> {
        let content = network_state_to_netplan(state)?;
        write_file(&target_path(target, &self.netplan_path), &content)?;
        clean_default(target)?;
        if self.postcmds {
            self.run_postcmds();
        }
        Ok(())
    }

    fn is_available(&self) -> bool {
        super::netplan_available()
    }
}

fn strip_bond_prefix(key: &str) -> &str {
    key.strip_prefix("bond-")
        .or_else(|| key.strip_prefix("bond_"))
        .unwrap_or(key)
}

/// Addresses, dhcp flags, gateways, routes and local nameservers
/// shared by every device section.
fn subnet_entries(
    iface: &Interface,
    entries: &mut Vec<(String, Node)>,
) -> Result<(), NetfabError> {
    let mut addresses = Vec::new();
    let mut routes = Vec::new();
    let mut dhcp4 = false;
    let mut dhcp6 = false;
    let mut gateway4 = None;
    let mut gateway6 = None;
    for subnet in &iface.subnets {
        match subnet.subnet_type {
            SubnetType::Dhcp | SubnetType::Dhcp4 => dhcp4 = true,
            SubnetType::Dhcp6 => dhcp6 = true,
            SubnetType::Static => {
                if let Some(address) = subnet.address.as_deref() {
                    addresses.push(crate::ip::address_to_cidr(
                        address,
                        subnet.netmask.as_deref(),
                    )?);
                }
                if let Some(gateway) = subnet.gateway.as_deref() {
                    if crate::ip::is_ipv6_addr(gateway) {
                        gateway6 = Some(gateway.to_string());
                    } else {
                        gateway4 = Some(gateway.to_string());
                    }
                }
            }
            SubnetType::Manual | SubnetType::Loopback => {}
        }
        for route_config in &subnet.routes {
            let route = Route::from_config(route_config)?;
            let via = match route.gateway.as_deref() {
                Some(via) => via.to_string(),
                None => continue,
            };
            routes.push(Node::Map(vec![
                (
                    "to".to_string(),
                    Node::scalar(format!(
                        "{}/{}",
                        route.network, route.netmask
                    )),
                ),
                ("via".to_string(), Node::scalar(via)),
            ]));
        }
    }
    if !addresses.is_empty() {
        entries.push((
            "addresses".to_string(),
            Node::List(addresses.into_iter().map(Node::scalar).collect()),
        ));
    }
    if dhcp4 {
        entries.push(("dhcp4".to_string(), Node::scalar("true")));
    }
    if dhcp6 {
        entries.push(("dhcp6".to_string(), Node::scalar("true")));
    }
    if let Some(gateway) = gateway4 {
        entries.push(("gateway4".to_string(), Node::scalar(gateway)));
    }
    if let Some(gateway) = gateway6 {
        entries.push(("gateway6".to_string(), Node::scalar(gateway)));
    }
    if !routes.is_empty() {
        entries.push(("routes".to_string(), Node::List(routes)));
    }
    Ok(())
}

fn nameserver_entry(
    nameservers: &[String],
    searchdomains: &[String],
) -> Option<(String, Node)> {
    if nameservers.is_empty() && searchdomains.is_empty() {
        return None;
    }
    let mut children = Vec::new();
    if !nameservers.is_empty() {
        children.push((
            "addresses".to_string(),
            Node::List(
                nameservers.iter().map(Node::scalar).collect(),
            ),
        ));
    }
    if !searchdomains.is_empty() {
        children.push((
            "search".to_string(),
            Node::List(
                searchdomains.iter().map(Node::scalar).collect(),
            ),
        ));
    }
    Some(("nameservers".to_string(), Node::Map(children)))
}

fn local_dns(iface: &Interface) -> (Vec<String>, Vec<String>) {
    let mut nameservers = Vec::new();
    let mut searchdomains = Vec::new();
    for subnet in &iface.subnets {
        nameservers.extend(subnet.dns_nameservers.iter().cloned());
        searchdomains.extend(subnet.dns_search.iter().cloned());
    }
    (nameservers, searchdomains)
}

pub(crate) fn network_state_to_netplan(
    state: &NetworkState,
) -> Result<String, NetfabError> {
    let mut ethernets = Vec::new();
    let mut bonds = Vec::new();
    let mut bridges = Vec::new();
    let mut vlans = Vec::new();
    for iface in state.iter_interfaces() {
        let mut entries: Vec<(String, Node)> = Vec::new();
        match iface.kind {
            InterfaceKind::Loopback => continue,
            InterfaceKind::Physical => {
                subnet_entries(iface, &mut entries)?;
                if let Some(mac) = iface.mac_address.as_deref() {
                    entries.push((
                        "match".to_string(),
                        Node::Map(vec![(
                            "macaddress".to_string(),
                            Node::scalar(mac.to_lowercase()),
                        )]),
                    ));
                    entries.push((
                        "set-name".to_string(),
                        Node::scalar(&iface.name),
                    ));
                }
                // Ethernets are where host-wide DNS is anchored.
                let (ns, search) = state.effective_dns(iface);
                entries.extend(nameserver_entry(&ns, &search));
            }
            InterfaceKind::Bond => {
                subnet_entries(iface, &mut entries)?;
                entries.push((
                    "interfaces".to_string(),
                    Node::List(
                        iface.bond_ports.iter().map(Node::scalar).collect(),
                    ),
                ));
                if !iface.bond_params.is_empty() {
                    let mut params: Vec<(String, Node)> = iface
                        .bond_params
                        .iter()
                        .map(|(key, value)| {
                            (
                                strip_bond_prefix(key).to_string(),
                                Node::scalar(value),
                            )
                        })
                        .collect();
                    params.sort_by(|a, b| a.0.cmp(&b.0));
                    entries
                        .push(("parameters".to_string(), Node::Map(params)));
                }
                let (ns, search) = local_dns(iface);
                entries.extend(nameserver_entry(&ns, &search));
            }
            InterfaceKind::Bridge => {
                subnet_entries(iface, &mut entries)?;
                entries.push((
                    "interfaces".to_string(),
                    Node::List(
                        iface.bridge_ports.iter().map(Node::scalar).collect(),
                    ),
                ));
                let (ns, search) = local_dns(iface);
                entries.extend(nameserver_entry(&ns, &search));
            }
            InterfaceKind::Vlan => {
                subnet_entries(iface, &mut entries)?;
                if let Some(id) = iface.vlan_id {
                    entries.push(("id".to_string(), Node::scalar(id)));
                }
                if let Some(link) = iface.vlan_link.as_deref() {
                    entries.push(("link".to_string(), Node::scalar(link)));
                }
                let (ns, search) = local_dns(iface);
                entries.extend(nameserver_entry(&ns, &search));
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let section = (iface.name.clone(), Node::Map(entries));
        match iface.kind {
            InterfaceKind::Physical => ethernets.push(section),
            InterfaceKind::Bond => bonds.push(section),
            InterfaceKind::Bridge => bridges.push(section),
            InterfaceKind::Vlan => vlans.push(section),
            InterfaceKind::Loopback => {}
        }
    }
    for sections in [&mut ethernets, &mut bonds, &mut bridges, &mut vlans] {
        sections.sort_by(|a, b| a.0.cmp(&b.0));
    }
    let mut network = vec![("version".to_string(), Node::scalar(2))];
    for (key, sections) in [
        ("ethernets", ethernets),
        ("bonds", bonds),
        ("bridges", bridges),
        ("vlans", vlans),
    ] {
        if !sections.is_empty() {
            network.push((key.to_string(), Node::Map(sections)));
        }
    }
    let mut out = String::from("\nnetwork:\n");
    Node::emit_map(&network, 4, &mut out);
    Ok(out)
}
