// SPDX-License-Identifier: Apache-2.0

mod eni;
mod netplan;
mod sysconfig;

pub use self::eni::{convert_eni_data, network_state_to_eni, EniRenderer};
pub use self::netplan::{clean_default, NetplanRenderer};
pub use self::sysconfig::SysconfigRenderer;

use std::path::Path;
use std::process::Command;

use crate::{util::which, ErrorKind, NetfabError, NetworkState};

/// A renderer turns the normalized state into host configuration files
/// under `target`. Rendering never mutates the state and the emitted
/// bytes are deterministic for a given state.
pub trait Renderer {
    fn render_network_state(
        &self,
        state: &NetworkState,
        target: &Path,
    ) -> Result<(), NetfabError>;

    /// Whether the host carries the tooling this renderer's output is
    /// written for.
    fn is_available(&self) -> bool;
}

/// Runs post-render host commands. Injected so rendering into a
/// scratch directory never touches the live system.
pub trait CommandRunner {
    fn run(&self, cmd: &[&str]) -> Result<(), NetfabError>;
}

/// Spawns the command and checks its exit status.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecCommandRunner;

impl CommandRunner for ExecCommandRunner {
    fn run(&self, cmd: &[&str]) -> Result<(), NetfabError> {
        let (program, args) = match cmd.split_first() {
            Some(split) => split,
            None => {
                return Err(NetfabError::new(
                    ErrorKind::Bug,
                    "Got empty command".to_string(),
                ));
            }
        };
        let status = Command::new(program).args(args).status()?;
        if !status.success() {
            return Err(NetfabError::new(
                ErrorKind::Bug,
                format!("Command {cmd:?} failed: {status}"),
            ));
        }
        Ok(())
    }
}

pub(crate) fn eni_available() -> bool {
    which("ifup").is_some() && which("ifdown").is_some()
}

pub(crate) fn sysconfig_available() -> bool {
    which("ifup").is_some()
        && which("ifdown").is_some()
        && Path::new("/etc/sysconfig/network-scripts/network-functions")
            .is_file()
}

pub(crate) fn netplan_available() -> bool {
    which("netplan").is_some()
}

/// Ordered renderer registry. `search`/`select` walk the caller's
/// priority list against host availability.
pub struct RendererSelector {
    entries: Vec<(&'static str, Box<dyn Renderer>)>,
}

impl RendererSelector {
    pub const DEFAULT_PRIORITY: [&'static str; 3] =
        ["eni", "sysconfig", "netplan"];

    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut selector = Self::new();
        selector.register("eni", Box::<EniRenderer>::default());
        selector.register("sysconfig", Box::<SysconfigRenderer>::default());
        selector.register("netplan", Box::<NetplanRenderer>::default());
        selector
    }

    pub fn register(&mut self, name: &'static str, renderer: Box<dyn Renderer>) {
        self.entries.push((name, renderer));
    }

    fn get(&self, name: &str) -> Result<&dyn Renderer, NetfabError> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, r)| r.as_ref())
            .ok_or_else(|| {
                NetfabError::new(
                    ErrorKind::InvalidArgument,
                    format!("Unknown renderer name {name}"),
                )
            })
    }

    /// Names from `priority` whose renderer is available on this host,
    /// in priority order. With `first` the scan stops at the first hit.
    pub fn search(
        &self,
        priority: &[&str],
        first: bool,
    ) -> Result<Vec<String>, NetfabError> {
        let mut found = Vec::new();
        for name in priority {
            if self.get(name)?.is_available() {
                found.push(name.to_string());
                if first {
                    break;
                }
            }
        }
        Ok(found)
    }

    /// The first available renderer from `priority`.
    pub fn select(
        &self,
        priority: &[&str],
    ) -> Result<(String, &dyn Renderer), NetfabError> {
        let found = self.search(priority, true)?;
        match found.first() {
            Some(name) => Ok((name.clone(), self.get(name)?)),
            None => Err(NetfabError::new(
                ErrorKind::RendererNotFound,
                format!("No available network renderers found. Searched \
                         through list: {priority:?}"),
            )),
        }
    }
}

impl Default for RendererSelector {
    fn default() -> Self {
        Self::with_defaults()
    }
}
