//! Source-IP trust resolution.
//!
//! Two separate questions are answered here: is this client address allowed
//! to talk to us at all, and which address actually identifies the client.
//! Forwarded-IP headers are only believed when the direct peer is itself a
//! configured trusted proxy; anything else would let any caller spoof its
//! way past the allow-list.

use std::net::IpAddr;

use ipnet::IpNet;
use thiserror::Error;

/// Errors building a [`TrustResolver`].
#[derive(Debug, Error, PartialEq)]
pub enum TrustError {
    /// A CIDR entry could not be parsed.
    #[error("invalid CIDR notation '{0}'")]
    InvalidCidr(String),
}

/// Immutable allow-list and proxy-trust configuration.
#[derive(Debug, Clone, Default)]
pub struct TrustResolver {
    networks: Vec<IpNet>,
    trusted_proxies: Vec<IpNet>,
    enabled: bool,
}

/// Normalize a bare IP to single-host CIDR notation.
fn normalize_cidr(entry: &str) -> String {
    if entry.contains('/') {
        entry.to_string()
    } else if entry.contains(':') {
        format!("{entry}/128")
    } else {
        format!("{entry}/32")
    }
}

/// Parse a comma-separated CIDR list, skipping empty entries.
fn parse_networks(cidrs: &str) -> Result<Vec<IpNet>, TrustError> {
    let mut networks = Vec::new();
    for entry in cidrs.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let normalized = normalize_cidr(entry);
        let network: IpNet = normalized
            .parse()
            .map_err(|_| TrustError::InvalidCidr(entry.to_string()))?;
        networks.push(network);
    }
    Ok(networks)
}

impl TrustResolver {
    /// Build a resolver from comma-separated CIDR lists.
    ///
    /// `enabled` controls whether the allow-list is enforced at all;
    /// proxy-trust resolution is always active so that logging sees real
    /// client addresses even on an open server.
    pub fn new(cidrs: &str, enabled: bool, trusted_proxies: &str) -> Result<Self, TrustError> {
        Ok(Self {
            networks: parse_networks(cidrs)?,
            trusted_proxies: parse_networks(trusted_proxies)?,
            enabled,
        })
    }

    /// Whether allow-list enforcement is active.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Check whether an address passes the allow-list.
    pub fn is_allowed(&self, ip: IpAddr) -> bool {
        if !self.enabled {
            return true;
        }
        self.networks.iter().any(|network| network.contains(&ip))
    }

    /// Check whether an address is a configured trusted proxy.
    pub fn is_trusted_proxy(&self, ip: IpAddr) -> bool {
        self.trusted_proxies
            .iter()
            .any(|network| network.contains(&ip))
    }

    /// Resolve the effective client address for a request.
    ///
    /// The forwarded header is honored only when the direct peer is a
    /// trusted proxy. A multi-hop header uses its first entry (the original
    /// client). Unparsable headers fall back to the socket address.
    pub fn resolve_client_ip(&self, peer: IpAddr, forwarded_for: Option<&str>) -> IpAddr {
        let Some(header) = forwarded_for else {
            return peer;
        };
        if !self.is_trusted_proxy(peer) {
            return peer;
        }
        header
            .split(',')
            .next()
            .and_then(|entry| entry.trim().parse::<IpAddr>().ok())
            .unwrap_or(peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_disabled_allows_everything() {
        let resolver = TrustResolver::new("", false, "").unwrap();
        assert!(resolver.is_allowed(ip("8.8.8.8")));
        assert!(resolver.is_allowed(ip("::1")));
    }

    #[test]
    fn test_allow_list_matching() {
        let resolver = TrustResolver::new("192.168.1.0/24", true, "").unwrap();
        assert!(resolver.is_allowed(ip("192.168.1.10")));
        assert!(!resolver.is_allowed(ip("192.168.2.10")));
        assert!(!resolver.is_allowed(ip("8.8.8.8")));
    }

    #[test]
    fn test_bare_ips_normalized_to_host_networks() {
        let resolver = TrustResolver::new("10.1.2.3, fe80::1", true, "").unwrap();
        assert!(resolver.is_allowed(ip("10.1.2.3")));
        assert!(!resolver.is_allowed(ip("10.1.2.4")));
        assert!(resolver.is_allowed(ip("fe80::1")));
        assert!(!resolver.is_allowed(ip("fe80::2")));
    }

    #[test]
    fn test_empty_entries_skipped() {
        let resolver = TrustResolver::new("192.168.1.0/24,, ,", true, "").unwrap();
        assert!(resolver.is_allowed(ip("192.168.1.1")));
    }

    #[test]
    fn test_invalid_cidr_rejected() {
        let result = TrustResolver::new("not-a-network", true, "");
        assert_eq!(
            result.unwrap_err(),
            TrustError::InvalidCidr("not-a-network".to_string())
        );
    }

    #[test]
    fn test_forwarded_header_honored_from_trusted_proxy() {
        let resolver = TrustResolver::new("192.168.1.0/24", true, "10.0.0.0/8").unwrap();

        let client = resolver.resolve_client_ip(ip("10.0.0.5"), Some("192.168.1.10"));
        assert_eq!(client, ip("192.168.1.10"));
        assert!(resolver.is_allowed(client));
    }

    #[test]
    fn test_forwarded_header_ignored_from_untrusted_peer() {
        let resolver = TrustResolver::new("192.168.1.0/24", true, "10.0.0.0/8").unwrap();

        let client = resolver.resolve_client_ip(ip("8.8.8.8"), Some("192.168.1.10"));
        assert_eq!(client, ip("8.8.8.8"));
        assert!(!resolver.is_allowed(client));
    }

    #[test]
    fn test_forwarded_header_uses_first_hop() {
        let resolver = TrustResolver::new("", false, "10.0.0.0/8").unwrap();
        let client =
            resolver.resolve_client_ip(ip("10.0.0.5"), Some("192.168.1.10, 10.0.0.5"));
        assert_eq!(client, ip("192.168.1.10"));
    }

    #[test]
    fn test_garbage_forwarded_header_falls_back_to_peer() {
        let resolver = TrustResolver::new("", false, "10.0.0.0/8").unwrap();
        let client = resolver.resolve_client_ip(ip("10.0.0.5"), Some("not an ip"));
        assert_eq!(client, ip("10.0.0.5"));
    }

    #[test]
    fn test_no_header_uses_peer() {
        let resolver = TrustResolver::new("", false, "10.0.0.0/8").unwrap();
        assert_eq!(resolver.resolve_client_ip(ip("10.0.0.5"), None), ip("10.0.0.5"));
    }
}
