//! Client identity: hashed IPs, proxy-aware peer addresses, and the
//! WebSocket origin allow-list.

use std::net::SocketAddr;

use base64::{Engine, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};

use crate::config::ServerConfig;

/// Origin every public web client is served from.
const WEBAO_ORIGIN: &str = "web.aceattorneyonline.com";

/// One-way identity token for an address.
///
/// The port is ignored so every connection from one host shares an IPID.
/// Accepts bare IPv4 and IPv6 addresses, `ip:port`, and `[v6]:port`.
pub fn ipid(addr: &str) -> String {
    let host = strip_port(addr.trim());
    let digest = Sha256::digest(host.as_bytes());
    let encoded = STANDARD.encode(&digest[..16]);
    encoded.trim_end_matches('=').to_string()
}

fn strip_port(addr: &str) -> &str {
    if let Some(rest) = addr.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match addr.rsplit_once(':') {
        // More than one colon is an unbracketed IPv6 address
        Some((host, _)) if !host.contains(':') => host,
        _ => addr,
    }
}

/// Address to derive the IPID from.
///
/// Behind a reverse proxy the socket peer is the proxy itself, so the first
/// `X-Forwarded-For` entry wins, then `X-Real-IP`. Without proxy mode the
/// headers are client-controlled and ignored.
pub fn real_ip(
    peer: SocketAddr,
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
    reverse_proxy: bool,
) -> String {
    if reverse_proxy {
        let forwarded = forwarded_for
            .and_then(|list| list.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded.or_else(|| real_ip.map(str::trim).filter(|ip| !ip.is_empty())) {
            return ip.to_string();
        }
    }
    peer.ip().to_string()
}

/// Hosts allowed to open WebSocket connections.
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    hosts: Vec<String>,
}

impl AllowedOrigins {
    /// The public web client, the asset server host, and any configured
    /// extras.
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut hosts = vec![WEBAO_ORIGIN.to_string()];
        if config.asset_url.contains("://") {
            if let Some(host) = origin_host(&config.asset_url).filter(|h| !h.is_empty()) {
                hosts.push(host);
            }
        }
        hosts.extend(config.websocket_origins.iter().filter_map(|o| origin_host(o)));
        hosts.dedup();
        Self { hosts }
    }

    /// Whether a handshake with these headers may proceed.
    ///
    /// Missing origins (native clients) and same-host origins are always
    /// allowed.
    pub fn permits(&self, origin: Option<&str>, host: Option<&str>) -> bool {
        let Some(origin) = origin.and_then(origin_host) else {
            return true;
        };
        if host.is_some_and(|host| host.eq_ignore_ascii_case(&origin)) {
            return true;
        }
        self.hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(&origin))
    }
}

/// `host[:port]` of a URL or bare origin.
fn origin_host(url: &str) -> Option<String> {
    let rest = url.trim().split_once("://").map_or(url.trim(), |(_, rest)| rest);
    let host = rest.split(['/', '?', '#']).next()?;
    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipid_ignores_port() {
        assert_eq!(ipid("203.0.113.7:50000"), ipid("203.0.113.7:50001"));
        assert_eq!(ipid("203.0.113.7"), ipid("203.0.113.7:1"));
        assert_ne!(ipid("203.0.113.7"), ipid("203.0.113.8"));
    }

    #[test]
    fn ipid_handles_ipv6() {
        assert_eq!(ipid("[2001:db8::1]:443"), ipid("2001:db8::1"));
    }

    #[test]
    fn ipid_is_22_chars() {
        let id = ipid("127.0.0.1");
        assert_eq!(id.len(), 22);
        assert!(!id.ends_with('='));
    }

    #[test]
    fn forwarded_headers_need_proxy_mode() {
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        assert_eq!(real_ip(peer, Some("1.2.3.4"), None, false), "10.0.0.1");
        assert_eq!(real_ip(peer, Some(" 1.2.3.4 , 10.0.0.1"), None, true), "1.2.3.4");
        assert_eq!(real_ip(peer, None, Some("5.6.7.8"), true), "5.6.7.8");
        assert_eq!(real_ip(peer, Some(""), None, true), "10.0.0.1");
    }

    #[test]
    fn origin_rules() {
        let config = ServerConfig {
            asset_url: "https://assets.example.com/base/".to_string(),
            websocket_origins: vec!["http://localhost:8080".to_string()],
            ..ServerConfig::default()
        };
        let origins = AllowedOrigins::from_config(&config);
        assert!(origins.permits(None, None));
        assert!(origins.permits(Some("https://web.aceattorneyonline.com"), None));
        assert!(origins.permits(Some("https://assets.example.com"), None));
        assert!(origins.permits(Some("http://localhost:8080"), None));
        assert!(origins.permits(Some("https://me.example.org"), Some("me.example.org")));
        assert!(!origins.permits(Some("https://evil.example.net"), Some("me.example.org")));
    }

    #[test]
    fn asset_url_without_scheme_ignored() {
        let config = ServerConfig { asset_url: "assets.example.com".to_string(), ..ServerConfig::default() };
        let origins = AllowedOrigins::from_config(&config);
        assert!(!origins.permits(Some("https://assets.example.com"), None));
    }
}
