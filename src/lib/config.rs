// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::{ErrorKind, NetfabError};

pub const CUR_SCHEMA_VERSION: u32 = 1;

fn default_version() -> u32 {
    CUR_SCHEMA_VERSION
}

/// The versioned declarative document: an ordered sequence of entries.
/// Entries stay as raw YAML values so that a single malformed entry can
/// be skipped under `skip_broken` instead of failing whole-document
/// deserialization; [crate::NetworkState::parse] types them one by one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub config: Vec<serde_yaml::Value>,
}

impl NetworkConfig {
    pub fn from_entries(
        entries: Vec<ConfigEntry>,
    ) -> Result<Self, NetfabError> {
        let mut config = Vec::new();
        for entry in entries {
            config.push(serde_yaml::to_value(&entry)?);
        }
        Ok(Self {
            version: CUR_SCHEMA_VERSION,
            config,
        })
    }

    /// Type every entry, failing on the first malformed one.
    pub fn entries(&self) -> Result<Vec<ConfigEntry>, NetfabError> {
        self.config
            .iter()
            .map(|value| {
                serde_yaml::from_value(value.clone()).map_err(|e| {
                    NetfabError::new(
                        ErrorKind::InvalidSchema,
                        format!("Invalid config entry: {e}"),
                    )
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConfigEntry {
    Physical(DeviceConfig),
    Loopback(DeviceConfig),
    Bond(BondEntry),
    Bridge(BridgeEntry),
    Vlan(VlanEntry),
    Nameserver(NameserverEntry),
    Route(RouteConfig),
}

/// Fields shared by every interface entry kind.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<SubnetConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BondEntry {
    #[serde(flatten)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub bond_interfaces: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_yaml::Mapping::is_empty")]
    pub params: serde_yaml::Mapping,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BridgeEntry {
    #[serde(flatten)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub bridge_interfaces: Vec<String>,
    #[serde(default, skip_serializing_if = "serde_yaml::Mapping::is_empty")]
    pub params: serde_yaml::Mapping,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VlanEntry {
    #[serde(flatten)]
    pub device: DeviceConfig,
    pub vlan_link: String,
    pub vlan_id: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NameserverEntry {
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "crate::deserializer::one_or_many_string"
    )]
    pub address: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "crate::deserializer::one_or_many_string"
    )]
    pub search: Vec<String>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubnetType {
    Dhcp,
    Dhcp4,
    Dhcp6,
    Static,
    #[default]
    Manual,
    Loopback,
}

impl SubnetType {
    pub fn is_dhcp(&self) -> bool {
        matches!(self, Self::Dhcp | Self::Dhcp4 | Self::Dhcp6)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dhcp => "dhcp",
            Self::Dhcp4 => "dhcp4",
            Self::Dhcp6 => "dhcp6",
            Self::Static => "static",
            Self::Manual => "manual",
            Self::Loopback => "loopback",
        }
    }
}

/// How ifup/ifdown style tooling should treat the interface; `manual`
/// means it should not be touched automatically.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubnetControl {
    #[default]
    Auto,
    Manual,
    Hotplug,
}

/// One IP configuration attached to an interface. `address` is either
/// CIDR or a bare IP with the prefix carried by `netmask`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubnetConfig {
    #[serde(rename = "type")]
    pub subnet_type: SubnetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::deserializer::option_string_or_number"
    )]
    pub netmask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub metric: Option<u32>,
    #[serde(default)]
    pub control: SubnetControl,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "crate::deserializer::one_or_many_string"
    )]
    pub dns_nameservers: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "crate::deserializer::one_or_many_string"
    )]
    pub dns_search: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<RouteConfig>,
}

impl Default for SubnetConfig {
    fn default() -> Self {
        Self {
            subnet_type: SubnetType::Manual,
            address: None,
            netmask: None,
            broadcast: None,
            gateway: None,
            metric: None,
            control: SubnetControl::Auto,
            dns_nameservers: Vec::new(),
            dns_search: Vec::new(),
            routes: Vec::new(),
        }
    }
}

impl SubnetConfig {
    pub fn new(subnet_type: SubnetType) -> Self {
        Self {
            subnet_type,
            ..Default::default()
        }
    }
}

/// A route, either a global entry or subnet-scoped. The destination is
/// given as CIDR or as a separate network/netmask pair.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::deserializer::option_string_or_number"
    )]
    pub netmask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::deserializer::option_u32_or_string"
    )]
    pub metric: Option<u32>,
}
