//! SSRF guard for the proxy relay
//!
//! Classifies a hostname or IP literal as allowed or blocked. This is a
//! literal-string defense: hostnames are never resolved, so a public name
//! that resolves to a private address passes. It stops the obvious attacks
//! (`localhost`, RFC 1918 literals, link-local metadata endpoints) and
//! nothing more.

use std::fmt;
use url::{Host, Url};

/// Result of classifying a host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostVerdict {
    /// Relay may fetch from this host
    Allowed,
    /// Relay must refuse this host
    Blocked(BlockReason),
}

impl HostVerdict {
    /// True for [`HostVerdict::Blocked`]
    pub fn is_blocked(&self) -> bool {
        matches!(self, HostVerdict::Blocked(_))
    }
}

/// Why a host was blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// `localhost`, `*.localhost` or `*.local`
    LocalName,
    /// `::1`
    Ipv6Loopback,
    /// `fe80:` prefix
    Ipv6LinkLocal,
    /// `fc00::/7`
    Ipv6UniqueLocal,
    /// Dotted quad with an octet outside 0..=255
    MalformedIpv4,
    /// `0.0.0.0/8`
    ThisNetwork,
    /// `10.0.0.0/8`, `172.16.0.0/12`, `192.168.0.0/16`
    PrivateIpv4,
    /// `127.0.0.0/8`
    Ipv4Loopback,
    /// `169.254.0.0/16`
    Ipv4LinkLocal,
    /// URL without a host
    NoHost,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            BlockReason::LocalName => "local hostname",
            BlockReason::Ipv6Loopback => "IPv6 loopback",
            BlockReason::Ipv6LinkLocal => "IPv6 link-local",
            BlockReason::Ipv6UniqueLocal => "IPv6 unique-local",
            BlockReason::MalformedIpv4 => "malformed IPv4 literal",
            BlockReason::ThisNetwork => "this-network IPv4",
            BlockReason::PrivateIpv4 => "private IPv4",
            BlockReason::Ipv4Loopback => "IPv4 loopback",
            BlockReason::Ipv4LinkLocal => "IPv4 link-local",
            BlockReason::NoHost => "no host",
        };
        f.write_str(reason)
    }
}

/// Classify a hostname or IP literal
///
/// Blocks local names, IPv6 loopback/link-local/unique-local literals and
/// IPv4 literals in `0/8`, `10/8`, `127/8`, `169.254/16`, `172.16/12` and
/// `192.168/16`. A dotted quad with an octet above 255 is blocked rather
/// than allowed. Everything else, including any DNS name, is allowed.
pub fn classify(hostname: &str) -> HostVerdict {
    let host = hostname.to_ascii_lowercase();
    // URL hosts render IPv6 literals in brackets
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host.as_str());

    if host == "localhost" || host.ends_with(".localhost") || host.ends_with(".local") {
        return HostVerdict::Blocked(BlockReason::LocalName);
    }

    if host == "::1" {
        return HostVerdict::Blocked(BlockReason::Ipv6Loopback);
    }
    if host.starts_with("fe80:") {
        return HostVerdict::Blocked(BlockReason::Ipv6LinkLocal);
    }
    if host.starts_with("fc") || host.starts_with("fd") {
        return HostVerdict::Blocked(BlockReason::Ipv6UniqueLocal);
    }

    match dotted_quad(host) {
        None => HostVerdict::Allowed,
        Some(None) => HostVerdict::Blocked(BlockReason::MalformedIpv4),
        Some(Some(octets)) => classify_ipv4(octets),
    }
}

/// Classify the host of a parsed URL
///
/// IP hosts are classified in their canonical text form, so encodings the
/// URL parser normalizes (`0x7f.1`, `[0:0::1]`) are caught. An IPv4-mapped
/// IPv6 address is classified as the IPv4 address it maps.
pub fn classify_url(url: &Url) -> HostVerdict {
    match url.host() {
        Some(Host::Domain(domain)) => classify(domain),
        Some(Host::Ipv4(addr)) => classify(&addr.to_string()),
        Some(Host::Ipv6(addr)) => match addr.to_ipv4_mapped() {
            Some(v4) => classify(&v4.to_string()),
            None => classify(&addr.to_string()),
        },
        None => HostVerdict::Blocked(BlockReason::NoHost),
    }
}

fn classify_ipv4([a, b, _, _]: [u8; 4]) -> HostVerdict {
    match (a, b) {
        (0, _) => HostVerdict::Blocked(BlockReason::ThisNetwork),
        (10, _) | (172, 16..=31) | (192, 168) => HostVerdict::Blocked(BlockReason::PrivateIpv4),
        (127, _) => HostVerdict::Blocked(BlockReason::Ipv4Loopback),
        (169, 254) => HostVerdict::Blocked(BlockReason::Ipv4LinkLocal),
        _ => HostVerdict::Allowed,
    }
}

/// Match `^\d{1,3}(\.\d{1,3}){3}$`
///
/// `None` when the pattern does not match, `Some(None)` when it matches but
/// an octet is out of range.
fn dotted_quad(host: &str) -> Option<Option<[u8; 4]>> {
    let mut parts = [0u16; 4];
    let mut count = 0;
    for part in host.split('.') {
        if count == 4 || part.is_empty() || part.len() > 3 {
            return None;
        }
        if !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        parts[count] = part.parse().ok()?;
        count += 1;
    }
    if count != 4 {
        return None;
    }

    let mut octets = [0u8; 4];
    for (octet, part) in octets.iter_mut().zip(parts) {
        match u8::try_from(part) {
            Ok(value) => *octet = value,
            Err(_) => return Some(None),
        }
    }
    Some(Some(octets))
}
