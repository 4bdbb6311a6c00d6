//! Validation primitives for network-facing configuration values
//!
//! These run before any value is passed to an external command or emitted
//! into a rendered ruleset; any rejection aborts the apply with a
//! validation error carrying the offending field and value.

use crate::errors::{validation, Result};
use std::net::{IpAddr, Ipv4Addr};

/// Default CIDR prefix used when a netmask is not in the contiguous-mask
/// table (Class C network)
pub const DEFAULT_CIDR: u8 = 24;

/// Validate a network interface name
///
/// Kernel interface names are 1-15 characters of alphanumerics, dash,
/// underscore, and dot.
pub fn interface_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(validation("interface name", "(empty)"));
    }
    if name.len() > 15 {
        return Err(validation("interface name", name));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(validation("interface name", name));
    }
    Ok(())
}

/// Validate an IPv4 or IPv6 address literal
pub fn ip_address(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(validation("ip address", "(empty)"));
    }
    value
        .parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| validation("ip address", value))
}

/// Validate an IPv4 dotted netmask
pub fn netmask(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(validation("netmask", "(empty)"));
    }
    value
        .parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| validation("netmask", value))
}

/// Validate a port specification: a single port, a comma list, or a
/// `lo-hi` range; every port must be in 1..=65535
pub fn port(value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(validation("port", "(empty)"));
    }

    if value.contains('-') {
        let parts: Vec<&str> = value.split('-').collect();
        if parts.len() != 2 {
            return Err(validation("port", value));
        }
        port(parts[0])?;
        return port(parts[1]);
    }

    if value.contains(',') {
        for part in value.split(',') {
            port(part.trim())?;
        }
        return Ok(());
    }

    match value.parse::<u32>() {
        Ok(p) if (1..=65535).contains(&p) => Ok(()),
        _ => Err(validation("port", value)),
    }
}

/// Validate a network protocol name; empty means "any" and is allowed
pub fn protocol(proto: &str) -> Result<()> {
    if proto.is_empty() {
        return Ok(());
    }
    match proto.to_ascii_lowercase().as_str() {
        "tcp" | "udp" | "icmp" | "icmpv6" | "esp" | "ah" | "sctp" | "all" => Ok(()),
        _ => Err(validation("protocol", proto)),
    }
}

/// Validate a firewall chain policy
pub fn policy(value: &str) -> Result<()> {
    match value.to_ascii_lowercase().as_str() {
        "accept" | "drop" => Ok(()),
        _ => Err(validation("policy", value)),
    }
}

/// Validate a firewall rule target
pub fn target(value: &str) -> Result<()> {
    match value.to_ascii_lowercase().as_str() {
        "accept" | "drop" | "reject" => Ok(()),
        _ => Err(validation("target", value)),
    }
}

/// Validate a MAC address (six colon- or hyphen-separated hex octets)
pub fn mac_address(value: &str) -> Result<()> {
    let sep = if value.contains(':') { ':' } else { '-' };
    let octets: Vec<&str> = value.split(sep).collect();
    if octets.len() != 6 {
        return Err(validation("mac address", value));
    }
    for octet in octets {
        if octet.len() != 2 || !octet.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(validation("mac address", value));
        }
    }
    Ok(())
}

/// Validate a hostname or domain name (RFC 1123 labels, max 253 chars)
pub fn hostname(value: &str) -> Result<()> {
    if value.is_empty() || value.len() > 253 {
        return Err(validation("hostname", value));
    }
    for label in value.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(validation("hostname", value));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(validation("hostname", value));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(validation("hostname", value));
        }
    }
    Ok(())
}

/// Strip shell metacharacters from a string destined for a rendered
/// ruleset comment
pub fn sanitize_comment(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ';' | '&' | '|' | '`' | '$' | '(' | ')' | '<' | '>' | '\n' | '\r' | '\\'))
        .collect()
}

/// Convert a dotted netmask to a CIDR prefix length
///
/// Unknown netmasks fall back to [`DEFAULT_CIDR`]; callers should have
/// validated the netmask already.
pub fn netmask_to_cidr(netmask: &str) -> u8 {
    match netmask {
        "255.255.255.255" => 32,
        "255.255.255.254" => 31,
        "255.255.255.252" => 30,
        "255.255.255.248" => 29,
        "255.255.255.240" => 28,
        "255.255.255.224" => 27,
        "255.255.255.192" => 26,
        "255.255.255.128" => 25,
        "255.255.255.0" => 24,
        "255.255.254.0" => 23,
        "255.255.252.0" => 22,
        "255.255.248.0" => 21,
        "255.255.240.0" => 20,
        "255.255.224.0" => 19,
        "255.255.192.0" => 18,
        "255.255.128.0" => 17,
        "255.255.0.0" => 16,
        "255.254.0.0" => 15,
        "255.252.0.0" => 14,
        "255.248.0.0" => 13,
        "255.240.0.0" => 12,
        "255.224.0.0" => 11,
        "255.192.0.0" => 10,
        "255.128.0.0" => 9,
        "255.0.0.0" => 8,
        _ => DEFAULT_CIDR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_name_rules() {
        assert!(interface_name("eth0").is_ok());
        assert!(interface_name("br-lan.10").is_ok());
        assert!(interface_name("").is_err());
        assert!(interface_name("averylonginterface0").is_err());
        assert!(interface_name("eth0; rm -rf /").is_err());
    }

    #[test]
    fn test_ip_address_accepts_v4_and_v6() {
        assert!(ip_address("192.168.1.1").is_ok());
        assert!(ip_address("fe80::1").is_ok());
        assert!(ip_address("999.1.1.1").is_err());
        assert!(ip_address("").is_err());
    }

    #[test]
    fn test_port_forms() {
        assert!(port("22").is_ok());
        assert!(port("80,443").is_ok());
        assert!(port("1024-2048").is_ok());
        assert!(port("0").is_err());
        assert!(port("70000").is_err());
        assert!(port("80-443-8080").is_err());
        assert!(port("ssh").is_err());
    }

    #[test]
    fn test_protocol_set() {
        assert!(protocol("tcp").is_ok());
        assert!(protocol("ICMPv6").is_ok());
        assert!(protocol("").is_ok());
        assert!(protocol("gre").is_err());
    }

    #[test]
    fn test_policy_and_target() {
        assert!(policy("accept").is_ok());
        assert!(policy("reject").is_err());
        assert!(target("reject").is_ok());
        assert!(target("log").is_err());
    }

    #[test]
    fn test_mac_address_forms() {
        assert!(mac_address("aa:bb:cc:dd:ee:ff").is_ok());
        assert!(mac_address("AA-BB-CC-DD-EE-FF").is_ok());
        assert!(mac_address("aa:bb:cc:dd:ee").is_err());
        assert!(mac_address("zz:bb:cc:dd:ee:ff").is_err());
    }

    #[test]
    fn test_hostname_rules() {
        assert!(hostname("router").is_ok());
        assert!(hostname("lan.example.org").is_ok());
        assert!(hostname("-bad").is_err());
        assert!(hostname("a..b").is_err());
    }

    #[test]
    fn test_sanitize_comment_strips_metacharacters() {
        assert_eq!(sanitize_comment("allow $(reboot)"), "allow reboot");
        assert_eq!(sanitize_comment("plain name"), "plain name");
    }

    #[test]
    fn test_netmask_to_cidr_table_and_fallback() {
        assert_eq!(netmask_to_cidr("255.255.255.0"), 24);
        assert_eq!(netmask_to_cidr("255.255.0.0"), 16);
        assert_eq!(netmask_to_cidr("255.255.255.252"), 30);
        // Non-contiguous masks fall back to /24
        assert_eq!(netmask_to_cidr("255.0.255.0"), DEFAULT_CIDR);
    }
}
