// SPDX-License-Identifier: Apache-2.0

pub mod cmdline;
mod config;
mod deserializer;
mod devinfo;
mod error;
mod ip;
mod renderer;
mod state;
mod util;

pub use self::config::{
    BondEntry, BridgeEntry, ConfigEntry, DeviceConfig, NameserverEntry,
    NetworkConfig, RouteConfig, SubnetConfig, SubnetControl, SubnetType,
    VlanEntry, CUR_SCHEMA_VERSION,
};
pub use self::devinfo::{
    generate_fallback_config, interfaces_by_mac, DeviceInfo, SysfsDeviceInfo,
};
pub use self::error::{ErrorKind, NetfabError};
pub use self::renderer::{
    clean_default, convert_eni_data, network_state_to_eni, CommandRunner,
    EniRenderer, ExecCommandRunner, NetplanRenderer, Renderer,
    RendererSelector, SysconfigRenderer,
};
pub use self::state::{Interface, InterfaceKind, NetworkState, Route};
