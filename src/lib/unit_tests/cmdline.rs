// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::cmdline::{
    config_from_klibc_net_cfg, klibc_to_config_entry,
    read_kernel_cmdline_config,
};
use crate::{
    ConfigEntry, ErrorKind, NetworkConfig, SubnetControl, SubnetType,
};

const DHCP_CONTENT_1: &str = r#"
DEVICE='eth0'
PROTO='dhcp'
IPV4ADDR='192.168.122.89'
IPV4BROADCAST='192.168.122.255'
IPV4NETMASK='255.255.255.0'
IPV4GATEWAY='192.168.122.1'
IPV4DNS0='192.168.122.1'
IPV4DNS1='0.0.0.0'
HOSTNAME='foohost'
DNSDOMAIN=''
NISDOMAIN=''
ROOTSERVER='192.168.122.1'
ROOTPATH=''
filename=''
UPTIME='21'
DHCPLEASETIME='3600'
DOMAINSEARCH='foo.com'
"#;

const DHCP6_CONTENT_1: &str = r#"
DEVICE6=eno1
HOSTNAME=
DNSDOMAIN=
IPV6PROTO=dhcp6
IPV6ADDR=2001:67c:1562:8010:0:1::
IPV6NETMASK=64
IPV6DNS0=2001:67c:1562:8010::2:1
IPV6DOMAINSEARCH=
HOSTNAME=
DNSDOMAIN=
"#;

const STATIC_CONTENT_1: &str = r#"
DEVICE='eth1'
PROTO='static'
IPV4ADDR='10.0.0.2'
IPV4BROADCAST='10.0.0.255'
IPV4NETMASK='255.255.255.0'
IPV4GATEWAY='10.0.0.1'
IPV4DNS0='10.0.1.1'
IPV4DNS1='0.0.0.0'
HOSTNAME='foohost'
UPTIME='21'
DHCPLEASETIME='3600'
DOMAINSEARCH='foo.com'
"#;

fn no_macs() -> BTreeMap<String, String> {
    BTreeMap::new()
}

#[test]
fn test_klibc_dhcp_conversion() {
    let (name, entry) =
        klibc_to_config_entry(DHCP_CONTENT_1, &no_macs()).unwrap();
    assert_eq!(name, "eth0");
    let device = match entry {
        ConfigEntry::Physical(device) => device,
        other => panic!("Expected physical entry, got {other:?}"),
    };
    assert_eq!(device.name, "eth0");
    assert_eq!(device.mac_address, None);
    assert_eq!(device.subnets.len(), 1);
    let subnet = &device.subnets[0];
    assert_eq!(subnet.subnet_type, SubnetType::Dhcp);
    assert_eq!(subnet.control, SubnetControl::Manual);
    assert_eq!(subnet.address, None);
    assert_eq!(subnet.netmask.as_deref(), Some("255.255.255.0"));
    assert_eq!(subnet.broadcast.as_deref(), Some("192.168.122.255"));
    assert_eq!(subnet.gateway.as_deref(), Some("192.168.122.1"));
    // the 0.0.0.0 placeholder in DNS1 is dropped
    assert_eq!(subnet.dns_nameservers, ["192.168.122.1"]);
    assert_eq!(subnet.dns_search, ["foo.com"]);
}

#[test]
fn test_klibc_dhcp6_conversion() {
    let (name, entry) =
        klibc_to_config_entry(DHCP6_CONTENT_1, &no_macs()).unwrap();
    assert_eq!(name, "eno1");
    let device = match entry {
        ConfigEntry::Physical(device) => device,
        other => panic!("Expected physical entry, got {other:?}"),
    };
    assert_eq!(device.subnets.len(), 1);
    let subnet = &device.subnets[0];
    assert_eq!(subnet.subnet_type, SubnetType::Dhcp6);
    assert_eq!(subnet.control, SubnetControl::Manual);
    assert_eq!(subnet.netmask.as_deref(), Some("64"));
    assert_eq!(subnet.dns_nameservers, ["2001:67c:1562:8010::2:1"]);
    assert!(subnet.dns_search.is_empty());
}

#[test]
fn test_klibc_static_conversion() {
    let (name, entry) =
        klibc_to_config_entry(STATIC_CONTENT_1, &no_macs()).unwrap();
    assert_eq!(name, "eth1");
    let device = match entry {
        ConfigEntry::Physical(device) => device,
        other => panic!("Expected physical entry, got {other:?}"),
    };
    let subnet = &device.subnets[0];
    assert_eq!(subnet.subnet_type, SubnetType::Static);
    assert_eq!(subnet.netmask.as_deref(), Some("255.255.255.0"));
    assert_eq!(subnet.gateway.as_deref(), Some("10.0.0.1"));
    assert_eq!(subnet.dns_nameservers, ["10.0.1.1"]);
    assert_eq!(subnet.dns_search, ["foo.com"]);
}

#[test]
fn test_klibc_missing_device_is_error() {
    let result = klibc_to_config_entry("PROTO='dhcp'\n", &no_macs());
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::InvalidSchema);
    }
}

fn write_files(
    dir: &std::path::Path,
    pairs: &[(&str, &str)],
) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for (fname, content) in pairs {
        let path = dir.join(fname);
        std::fs::write(&path, content).unwrap();
        files.push(path);
    }
    files
}

fn test_macs() -> BTreeMap<String, String> {
    let mut macs = BTreeMap::new();
    macs.insert("eth0".to_string(), "b8:ae:ed:75:ff:2a".to_string());
    macs.insert("eth1".to_string(), "b8:ae:ed:75:ff:2b".to_string());
    macs.insert("eno1".to_string(), "14:02:ec:42:48:01".to_string());
    macs
}

#[test]
fn test_config_from_klibc_net_cfg() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_files(
        dir.path(),
        &[
            ("net-eth0.cfg", DHCP_CONTENT_1),
            ("net-eth1.cfg", STATIC_CONTENT_1),
        ],
    );
    let config = config_from_klibc_net_cfg(&files, &test_macs()).unwrap();
    assert_eq!(config.version, 1);
    let entries = config.entries().unwrap();
    assert_eq!(entries.len(), 2);
    match &entries[0] {
        ConfigEntry::Physical(device) => {
            assert_eq!(device.name, "eth0");
            assert_eq!(
                device.mac_address.as_deref(),
                Some("b8:ae:ed:75:ff:2a")
            );
        }
        other => panic!("Expected physical entry, got {other:?}"),
    }
    match &entries[1] {
        ConfigEntry::Physical(device) => {
            assert_eq!(device.name, "eth1");
            assert_eq!(
                device.mac_address.as_deref(),
                Some("b8:ae:ed:75:ff:2b")
            );
        }
        other => panic!("Expected physical entry, got {other:?}"),
    }
}

#[test]
fn test_klibc_merge_v4_and_v6_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_files(
        dir.path(),
        &[
            ("net-eth0.conf", DHCP_CONTENT_1),
            (
                "net6-eth0.conf",
                &DHCP6_CONTENT_1.replace("eno1", "eth0"),
            ),
        ],
    );
    let found = read_kernel_cmdline_config(
        "foo ip=dhcp ip6=dhcp",
        &files,
        &test_macs(),
    )
    .unwrap()
    .unwrap();
    let entries = found.entries().unwrap();
    assert_eq!(entries.len(), 1);
    match &entries[0] {
        ConfigEntry::Physical(device) => {
            assert_eq!(device.name, "eth0");
            assert_eq!(device.subnets.len(), 2);
            assert_eq!(device.subnets[0].subnet_type, SubnetType::Dhcp);
            assert_eq!(device.subnets[1].subnet_type, SubnetType::Dhcp6);
        }
        other => panic!("Expected physical entry, got {other:?}"),
    }
}

#[test]
fn test_ip6_token_only_reads_net6_files() {
    let dir = tempfile::tempdir().unwrap();
    let files = write_files(
        dir.path(),
        &[
            ("net-eth0.conf", DHCP_CONTENT_1),
            ("net6-eno1.conf", DHCP6_CONTENT_1),
        ],
    );
    let found = read_kernel_cmdline_config(
        "foo ip6=dhcp root=/dev/sda",
        &files,
        &test_macs(),
    )
    .unwrap()
    .unwrap();
    let entries = found.entries().unwrap();
    assert_eq!(entries.len(), 1);
    match &entries[0] {
        ConfigEntry::Physical(device) => assert_eq!(device.name, "eno1"),
        other => panic!("Expected physical entry, got {other:?}"),
    }
}

#[test]
fn test_no_ip_tokens_means_no_config() {
    let dir = tempfile::tempdir().unwrap();
    let files =
        write_files(dir.path(), &[("net6-eno1.conf", DHCP6_CONTENT_1)]);
    let found = read_kernel_cmdline_config(
        "foo root=/dev/sda",
        &files,
        &test_macs(),
    )
    .unwrap();
    assert!(found.is_none());
}

fn simple_payload() -> String {
    serde_json::json!({
        "config": [{
            "type": "physical",
            "name": "eth0",
            "mac_address": "c0:d6:9f:2c:e8:80",
            "subnets": [{"type": "dhcp"}]
        }]
    })
    .to_string()
}

#[test]
fn test_cmdline_with_b64_payload() {
    let encoded = STANDARD.encode(simple_payload());
    let cmdline = format!("ro network-config={encoded} root=foo");
    let found = read_kernel_cmdline_config(&cmdline, &[], &no_macs())
        .unwrap()
        .unwrap();
    assert_eq!(found.version, 1);
    let entries = found.entries().unwrap();
    match &entries[0] {
        ConfigEntry::Physical(device) => {
            assert_eq!(device.name, "eth0");
            assert_eq!(
                device.mac_address.as_deref(),
                Some("c0:d6:9f:2c:e8:80")
            );
        }
        other => panic!("Expected physical entry, got {other:?}"),
    }
}

#[test]
fn test_cmdline_with_b64_gz_payload() {
    let mut encoder = flate2::write::GzEncoder::new(
        Vec::new(),
        flate2::Compression::default(),
    );
    encoder.write_all(simple_payload().as_bytes()).unwrap();
    let encoded = STANDARD.encode(encoder.finish().unwrap());
    let cmdline = format!("ro network-config={encoded} root=foo");
    let found = read_kernel_cmdline_config(&cmdline, &[], &no_macs())
        .unwrap()
        .unwrap();
    let entries = found.entries().unwrap();
    match &entries[0] {
        ConfigEntry::Physical(device) => assert_eq!(device.name, "eth0"),
        other => panic!("Expected physical entry, got {other:?}"),
    }
}

#[test]
fn test_cmdline_with_invalid_b64_payload() {
    let result = read_kernel_cmdline_config(
        "ro network-config=!!!not-base64!!! root=foo",
        &[],
        &no_macs(),
    );
    assert!(result.is_err());
    if let Err(e) = result {
        assert_eq!(e.kind(), ErrorKind::DecodeFailure);
    }
}

#[test]
fn test_parse_from_yaml_payload() {
    let config: NetworkConfig =
        serde_yaml::from_str(&simple_payload()).unwrap();
    assert_eq!(config.version, 1);
    assert_eq!(config.config.len(), 1);
}
