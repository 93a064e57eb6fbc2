// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::path::Path;

use super::parse_yaml;
use crate::{Renderer, SysconfigRenderer};

fn render_to_dir(yaml: &str) -> tempfile::TempDir {
    let state = parse_yaml(yaml);
    let target = tempfile::tempdir().unwrap();
    SysconfigRenderer::default()
        .render_network_state(&state, target.path())
        .unwrap();
    target
}

fn read(target: &Path, relpath: &str) -> String {
    std::fs::read_to_string(target.join(relpath)).unwrap()
}

const STATIC_WITH_DEFAULT_ROUTE_YAML: &str = r#"
version: 1
config:
  - type: physical
    name: eth0
    mac_address: "fa:16:3e:ed:9a:59"
    subnets:
      - type: static
        address: 172.19.1.34
        netmask: 255.255.252.0
        routes:
          - netmask: 0.0.0.0
            network: 0.0.0.0
            gateway: 172.19.3.254
  - type: nameserver
    address: 172.19.0.12
"#;

#[test]
fn test_render_static_with_default_route() {
    let target = render_to_dir(STATIC_WITH_DEFAULT_ROUTE_YAML);
    assert_eq!(
        read(target.path(), "etc/sysconfig/network-scripts/ifcfg-eth0"),
        "\
# Created by netfab on instance boot automatically, do not edit.
#
BOOTPROTO=static
DEFROUTE=yes
DEVICE=eth0
GATEWAY=172.19.3.254
HWADDR=fa:16:3e:ed:9a:59
IPADDR=172.19.1.34
NETMASK=255.255.252.0
NM_CONTROLLED=no
ONBOOT=yes
TYPE=Ethernet
USERCTL=no
"
    );
    assert_eq!(
        read(target.path(), "etc/sysconfig/network-scripts/route-eth0"),
        "\
# Created by netfab on instance boot automatically, do not edit.
#
ADDRESS0=0.0.0.0
GATEWAY0=172.19.3.254
NETMASK0=0.0.0.0
"
    );
    assert_eq!(
        read(target.path(), "etc/resolv.conf"),
        "\
; Created by netfab on instance boot automatically, do not edit.
;
nameserver 172.19.0.12
"
    );
    assert_eq!(
        read(target.path(), "etc/udev/rules.d/70-persistent-net.rules"),
        "SUBSYSTEM==\"net\", ACTION==\"add\", DRIVERS==\"?*\", \
         ATTR{address}==\"fa:16:3e:ed:9a:59\", NAME=\"eth0\"\n"
    );
}

const TWO_SUBNETS_YAML: &str = r#"
version: 1
config:
  - type: physical
    name: eth0
    mac_address: "fa:16:3e:ed:9a:59"
    subnets:
      - type: static
        address: 172.19.1.34
        netmask: 255.255.252.0
        routes:
          - netmask: 0.0.0.0
            network: 0.0.0.0
            gateway: 172.19.3.254
      - type: static
        address: 10.0.0.10
        netmask: 255.255.255.0
  - type: nameserver
    address: 172.19.0.12
"#;

#[test]
fn test_multiple_subnets_render_alias_files() {
    let target = render_to_dir(TWO_SUBNETS_YAML);
    assert_eq!(
        read(target.path(), "etc/sysconfig/network-scripts/ifcfg-eth0"),
        "\
# Created by netfab on instance boot automatically, do not edit.
#
BOOTPROTO=none
DEVICE=eth0
HWADDR=fa:16:3e:ed:9a:59
NM_CONTROLLED=no
ONBOOT=yes
TYPE=Ethernet
USERCTL=no
"
    );
    assert_eq!(
        read(target.path(), "etc/sysconfig/network-scripts/ifcfg-eth0:0"),
        "\
# Created by netfab on instance boot automatically, do not edit.
#
BOOTPROTO=static
DEFROUTE=yes
DEVICE=eth0:0
GATEWAY=172.19.3.254
HWADDR=fa:16:3e:ed:9a:59
IPADDR=172.19.1.34
NETMASK=255.255.252.0
NM_CONTROLLED=no
ONBOOT=yes
TYPE=Ethernet
USERCTL=no
"
    );
    assert_eq!(
        read(target.path(), "etc/sysconfig/network-scripts/ifcfg-eth0:1"),
        "\
# Created by netfab on instance boot automatically, do not edit.
#
BOOTPROTO=static
DEVICE=eth0:1
HWADDR=fa:16:3e:ed:9a:59
IPADDR=10.0.0.10
NETMASK=255.255.255.0
NM_CONTROLLED=no
ONBOOT=yes
TYPE=Ethernet
USERCTL=no
"
    );
}

const V4_AND_V6_SUBNETS_YAML: &str = r#"
version: 1
config:
  - type: physical
    name: eth0
    mac_address: "fa:16:3e:ed:9a:59"
    subnets:
      - type: static
        address: 172.19.1.34
        netmask: 255.255.252.0
        routes:
          - netmask: 0.0.0.0
            network: 0.0.0.0
            gateway: 172.19.3.254
      - type: static
        address: "2001:DB8::10"
        netmask: ''
        routes:
          - gateway: "2001:DB8::1"
            netmask: "::"
            network: "::"
"#;

#[test]
fn test_ipv6_alias_file() {
    let target = render_to_dir(V4_AND_V6_SUBNETS_YAML);
    assert_eq!(
        read(target.path(), "etc/sysconfig/network-scripts/ifcfg-eth0:1"),
        "\
# Created by netfab on instance boot automatically, do not edit.
#
BOOTPROTO=static
DEFROUTE=yes
DEVICE=eth0:1
HWADDR=fa:16:3e:ed:9a:59
IPV6ADDR=2001:DB8::10
IPV6INIT=yes
IPV6_DEFAULTGW=2001:DB8::1
NETMASK=
NM_CONTROLLED=no
ONBOOT=yes
TYPE=Ethernet
USERCTL=no
"
    );
    // v6 routes never land in route files
    assert!(!target
        .path()
        .join("etc/sysconfig/network-scripts/route-eth0:1")
        .exists());
}

#[test]
fn test_dhcp_subnet() {
    let target = render_to_dir(
        r#"
version: 1
config:
  - type: physical
    name: eth1000
    mac_address: "07-1C-C6-75-A4-BE"
    subnets:
      - type: dhcp
"#,
    );
    assert_eq!(
        read(
            target.path(),
            "etc/sysconfig/network-scripts/ifcfg-eth1000"
        ),
        "\
# Created by netfab on instance boot automatically, do not edit.
#
BOOTPROTO=dhcp
DEVICE=eth1000
HWADDR=07-1C-C6-75-A4-BE
NM_CONTROLLED=no
ONBOOT=yes
TYPE=Ethernet
USERCTL=no
"
    );
}

#[test]
fn test_explicit_loopback_not_rendered() {
    let target = render_to_dir(super::EXPLICIT_LOOPBACK_YAML);
    assert!(!target
        .path()
        .join("etc/sysconfig/network-scripts/ifcfg-lo")
        .exists());
    assert_eq!(
        read(target.path(), "etc/sysconfig/network-scripts/ifcfg-eth0"),
        "\
# Created by netfab on instance boot automatically, do not edit.
#
BOOTPROTO=dhcp
DEVICE=eth0
NM_CONTROLLED=no
ONBOOT=yes
TYPE=Ethernet
USERCTL=no
"
    );
}

#[test]
fn test_bond_and_members() {
    let target = render_to_dir(
        r#"
version: 1
config:
  - type: physical
    name: eth1
    mac_address: "aa:d6:9f:2c:e8:80"
  - type: physical
    name: eth2
    mac_address: "c0:bb:9f:2c:e8:80"
  - type: bond
    name: bond0
    bond_interfaces:
      - eth1
      - eth2
    params:
      bond-mode: active-backup
    subnets:
      - type: dhcp
"#,
    );
    let bond =
        read(target.path(), "etc/sysconfig/network-scripts/ifcfg-bond0");
    assert!(bond.contains("TYPE=Bond\n"));
    assert!(bond.contains("BOOTPROTO=dhcp\n"));
    assert!(bond.contains("BONDING_OPTS=mode=active-backup\n"));
    let member =
        read(target.path(), "etc/sysconfig/network-scripts/ifcfg-eth1");
    assert!(member.contains("MASTER=bond0\n"));
    assert!(member.contains("SLAVE=yes\n"));
}

#[test]
fn test_bridge_ports_reference_bridge() {
    let target = render_to_dir(
        r#"
version: 1
config:
  - type: physical
    name: eth3
  - type: bridge
    name: br0
    bridge_interfaces:
      - eth3
    subnets:
      - type: static
        address: 192.168.14.2/24
"#,
    );
    let bridge =
        read(target.path(), "etc/sysconfig/network-scripts/ifcfg-br0");
    assert!(bridge.contains("TYPE=Bridge\n"));
    assert!(bridge.contains("IPADDR=192.168.14.2\n"));
    assert!(bridge.contains("NETMASK=255.255.255.0\n"));
    let port =
        read(target.path(), "etc/sysconfig/network-scripts/ifcfg-eth3");
    assert!(port.contains("BRIDGE=br0\n"));
}

fn collect_files(root: &Path, dir: &Path, out: &mut BTreeMap<String, String>) {
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect_files(root, &path, out);
        } else {
            let relpath = path
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .to_string();
            out.insert(relpath, std::fs::read_to_string(&path).unwrap());
        }
    }
}

#[test]
fn test_render_is_deterministic() {
    let mut trees = Vec::new();
    for _ in 0..2 {
        let target = render_to_dir(super::ALL_YAML);
        let mut files = BTreeMap::new();
        collect_files(target.path(), target.path(), &mut files);
        trees.push(files);
    }
    assert!(trees[0].len() > 5);
    assert_eq!(trees[0], trees[1]);
}

#[test]
fn test_resolv_conf_merges_local_and_global() {
    let target = render_to_dir(
        r#"
version: 1
config:
  - type: physical
    name: eth0
    subnets:
      - type: static
        address: 192.0.2.10/24
        dns_nameservers:
          - 192.0.2.1
        dns_search:
          - example.com
  - type: nameserver
    address:
      - 192.0.2.1
      - 8.8.8.8
    search:
      - example.net
"#,
    );
    assert_eq!(
        read(target.path(), "etc/resolv.conf"),
        "\
; Created by netfab on instance boot automatically, do not edit.
;
nameserver 192.0.2.1
nameserver 8.8.8.8
search example.com example.net
"
    );
}
