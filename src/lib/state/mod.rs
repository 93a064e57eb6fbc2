// SPDX-License-Identifier: Apache-2.0

mod iface;
mod route;

pub use self::iface::{Interface, InterfaceKind};
pub use self::route::Route;

use crate::{
    ConfigEntry, DeviceConfig, ErrorKind, NetfabError, NetworkConfig,
    SubnetConfig, SubnetType,
};

/// The normalized model every renderer consumes: interfaces in document
/// order (loopback first), global routes and global DNS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkState {
    ifaces: Vec<Interface>,
    routes: Vec<Route>,
    dns_nameservers: Vec<String>,
    dns_searchdomains: Vec<String>,
}

impl NetworkState {
    /// Walk the declarative document in order and resolve it. With
    /// `skip_broken` a malformed entry is logged and dropped instead of
    /// failing the whole document.
    pub fn parse(
        config: &NetworkConfig,
        skip_broken: bool,
    ) -> Result<Self, NetfabError> {
        let mut state = Self::default();
        for value in &config.config {
            let entry: ConfigEntry = match serde_yaml::from_value(value.clone())
            {
                Ok(entry) => entry,
                Err(e) => {
                    let err = NetfabError::new(
                        ErrorKind::InvalidSchema,
                        format!("Invalid config entry: {e}"),
                    );
                    if skip_broken {
                        log::warn!("Skipping broken config entry: {err}");
                        continue;
                    }
                    return Err(err);
                }
            };
            if let Err(e) = state.apply_entry(&entry) {
                if skip_broken && e.kind() != ErrorKind::Bug {
                    log::warn!("Skipping broken config entry: {e}");
                    continue;
                }
                return Err(e);
            }
        }
        state.ensure_loopback();
        Ok(state)
    }

    fn apply_entry(&mut self, entry: &ConfigEntry) -> Result<(), NetfabError> {
        match entry {
            ConfigEntry::Physical(device) => {
                self.upsert_device(device, InterfaceKind::Physical);
            }
            ConfigEntry::Loopback(device) => {
                self.upsert_device(device, InterfaceKind::Loopback);
            }
            ConfigEntry::Bond(bond) => {
                let params = mapping_to_params(&bond.params, false);
                for member in &bond.bond_interfaces {
                    self.require_iface(member, &bond.device.name)?;
                }
                let iface =
                    self.upsert_device(&bond.device, InterfaceKind::Bond);
                iface.bond_ports = bond.bond_interfaces.clone();
                iface.bond_params = params.clone();
                for member in &bond.bond_interfaces {
                    if let Some(port) = self.iface_mut(member) {
                        port.bond_master = Some(bond.device.name.clone());
                        port.bond_params = params.clone();
                    }
                }
            }
            ConfigEntry::Bridge(bridge) => {
                let params = mapping_to_params(&bridge.params, true);
                for port in &bridge.bridge_interfaces {
                    self.require_iface(port, &bridge.device.name)?;
                }
                let iface =
                    self.upsert_device(&bridge.device, InterfaceKind::Bridge);
                iface.bridge_ports = bridge.bridge_interfaces.clone();
                iface.bridge_params = params;
            }
            ConfigEntry::Vlan(vlan) => {
                self.require_iface(&vlan.vlan_link, &vlan.device.name)?;
                let iface =
                    self.upsert_device(&vlan.device, InterfaceKind::Vlan);
                iface.vlan_link = Some(vlan.vlan_link.clone());
                iface.vlan_id = Some(vlan.vlan_id);
            }
            ConfigEntry::Nameserver(ns) => {
                self.dns_nameservers.extend(ns.address.iter().cloned());
                self.dns_searchdomains.extend(ns.search.iter().cloned());
            }
            ConfigEntry::Route(route) => {
                self.routes.push(Route::from_config(route)?);
            }
        }
        Ok(())
    }

    fn require_iface(
        &self,
        name: &str,
        referrer: &str,
    ) -> Result<(), NetfabError> {
        if self.iface(name).is_none() {
            return Err(NetfabError::new(
                ErrorKind::DanglingReference,
                format!(
                    "Interface {referrer} refers to undeclared \
                     interface {name}"
                ),
            ));
        }
        Ok(())
    }

    /// Later entries for an already declared name update the existing
    /// record in place; the document never yields duplicate names.
    fn upsert_device(
        &mut self,
        device: &DeviceConfig,
        kind: InterfaceKind,
    ) -> &mut Interface {
        let pos = match self.ifaces.iter().position(|i| i.name == device.name)
        {
            Some(pos) => pos,
            None => {
                self.ifaces
                    .push(Interface::new(device.name.clone(), kind));
                self.ifaces.len() - 1
            }
        };
        let iface = &mut self.ifaces[pos];
        iface.kind = kind;
        if device.mac_address.is_some() {
            iface.mac_address = device.mac_address.clone();
        }
        if device.mtu.is_some() {
            iface.mtu = device.mtu;
        }
        if !device.subnets.is_empty() {
            iface.subnets = device.subnets.clone();
        }
        iface
    }

    fn ensure_loopback(&mut self) {
        if self.ifaces.iter().any(|i| i.name == "lo") {
            return;
        }
        let mut lo = Interface::new("lo".to_string(), InterfaceKind::Loopback);
        lo.subnets = vec![SubnetConfig::new(SubnetType::Loopback)];
        self.ifaces.insert(0, lo);
    }

    pub fn iter_interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.ifaces.iter()
    }

    pub fn iter_routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn iface(&self, name: &str) -> Option<&Interface> {
        self.ifaces.iter().find(|i| i.name == name)
    }

    fn iface_mut(&mut self, name: &str) -> Option<&mut Interface> {
        self.ifaces.iter_mut().find(|i| i.name == name)
    }

    /// Member names of a bond or bridge, empty for other kinds.
    pub fn members<'a>(&self, iface: &'a Interface) -> &'a [String] {
        match iface.kind {
            InterfaceKind::Bond => &iface.bond_ports,
            InterfaceKind::Bridge => &iface.bridge_ports,
            _ => &[],
        }
    }

    /// The bridge a port belongs to, if any.
    pub fn bridge_for(&self, port: &str) -> Option<&Interface> {
        self.ifaces.iter().find(|i| {
            i.kind == InterfaceKind::Bridge
                && i.bridge_ports.iter().any(|p| p == port)
        })
    }

    pub fn dns_nameservers(&self) -> &[String] {
        &self.dns_nameservers
    }

    pub fn dns_searchdomains(&self) -> &[String] {
        &self.dns_searchdomains
    }

    /// Interface-local subnet DNS (in subnet order) followed by the
    /// global entries, first occurrence kept.
    pub fn effective_dns(
        &self,
        iface: &Interface,
    ) -> (Vec<String>, Vec<String>) {
        let mut nameservers = Vec::new();
        let mut searchdomains = Vec::new();
        for subnet in &iface.subnets {
            nameservers.extend(subnet.dns_nameservers.iter().cloned());
            searchdomains.extend(subnet.dns_search.iter().cloned());
        }
        nameservers.extend(self.dns_nameservers.iter().cloned());
        searchdomains.extend(self.dns_searchdomains.iter().cloned());
        dedup_keep_first(&mut nameservers);
        dedup_keep_first(&mut searchdomains);
        (nameservers, searchdomains)
    }
}

fn dedup_keep_first(values: &mut Vec<String>) {
    let mut seen = Vec::new();
    values.retain(|v| {
        if seen.contains(v) {
            false
        } else {
            seen.push(v.clone());
            true
        }
    });
}

/// Stringify composite parameters. With `drop_falsy`, values that
/// stringify to nothing, `0` or `false` are omitted entirely.
fn mapping_to_params(
    mapping: &serde_yaml::Mapping,
    drop_falsy: bool,
) -> Vec<(String, String)> {
    let mut params = Vec::new();
    for (key, value) in mapping {
        let key = match key.as_str() {
            Some(key) => key.to_string(),
            None => continue,
        };
        let value = match value {
            serde_yaml::Value::String(s) => s.clone(),
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        if drop_falsy && (value.is_empty() || value == "0" || value == "false")
        {
            continue;
        }
        params.push((key, value));
    }
    params
}
