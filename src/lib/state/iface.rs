// SPDX-License-Identifier: Apache-2.0

use crate::SubnetConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InterfaceKind {
    Loopback,
    Physical,
    Bond,
    Bridge,
    Vlan,
}

/// A fully resolved interface record. Composite membership is written
/// both ways during parsing: a bond knows its ports and every port
/// carries `bond_master` plus a copy of the bond parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub name: String,
    pub kind: InterfaceKind,
    pub mac_address: Option<String>,
    pub mtu: Option<u64>,
    pub subnets: Vec<SubnetConfig>,
    pub bond_master: Option<String>,
    pub bond_params: Vec<(String, String)>,
    pub bond_ports: Vec<String>,
    pub bridge_ports: Vec<String>,
    pub bridge_params: Vec<(String, String)>,
    pub vlan_link: Option<String>,
    pub vlan_id: Option<u32>,
}

impl Interface {
    pub fn new(name: String, kind: InterfaceKind) -> Self {
        Self {
            name,
            kind,
            mac_address: None,
            mtu: None,
            subnets: Vec::new(),
            bond_master: None,
            bond_params: Vec::new(),
            bond_ports: Vec::new(),
            bridge_ports: Vec::new(),
            bridge_params: Vec::new(),
            vlan_link: None,
            vlan_id: None,
        }
    }

    pub fn is_bond_member(&self) -> bool {
        self.bond_master.is_some()
    }
}
