//! Pairing payload construction.
//!
//! The mobile app learns where to connect by scanning a QR code (or pasting
//! a string) containing a JSON payload of candidate addresses, the port and
//! the session token.  This module discovers which local addresses are
//! worth advertising.
//!
//! A multi-homed desktop (Wi-Fi + Ethernet + VPN) is reachable on several
//! addresses, and the phone can only guess which one it shares a network
//! with, so the payload advertises every non-loopback IPv4 address and
//! lets the client's resolver walk them in order.  The ordering uses the
//! connected-UDP trick: "connecting" a UDP socket to a public address
//! performs a local routing decision without sending a single packet, and
//! the socket's local address is the one the OS would use for that route.
//! That default-route address goes first, since it is the most likely hit.

use std::net::UdpSocket;

use tracing::debug;

use pocketpad_core::PairingPayload;

use crate::domain::config::RelayConfig;

/// Addresses clients should try, best candidate first.
///
/// Resolution order:
///
/// 1. `advertise_ips` from the config, verbatim, when non-empty.
/// 2. Every non-loopback IPv4 interface address, with the default-route
///    address promoted to the front.
/// 3. `127.0.0.1` as a last resort, so pairing at least works for an
///    emulator on the same machine.
pub fn advertised_addresses(config: &RelayConfig) -> Vec<String> {
    if !config.advertise_ips.is_empty() {
        return config.advertise_ips.clone();
    }

    let mut addresses = local_ipv4_addresses();

    if let Some(primary) = default_route_address() {
        // Promote rather than insert, so the list stays duplicate-free.
        if let Some(pos) = addresses.iter().position(|a| *a == primary) {
            addresses.remove(pos);
        }
        addresses.insert(0, primary);
    }

    if addresses.is_empty() {
        debug!("no routable local address found, advertising loopback");
        addresses.push("127.0.0.1".to_string());
    }
    addresses
}

/// All non-loopback IPv4 addresses, in interface enumeration order.
fn local_ipv4_addresses() -> Vec<String> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            debug!("interface enumeration failed: {e}");
            return Vec::new();
        }
    };

    interfaces
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .filter_map(|iface| match iface.addr {
            if_addrs::IfAddr::V4(v4) => Some(v4.ip.to_string()),
            if_addrs::IfAddr::V6(_) => None,
        })
        .collect()
}

fn default_route_address() -> Option<String> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    // Any public address works; nothing is sent.
    socket.connect("8.8.8.8:80").ok()?;
    let local = socket.local_addr().ok()?;
    if local.ip().is_unspecified() || local.ip().is_loopback() {
        return None;
    }
    Some(local.ip().to_string())
}

/// The name shown in the mobile app's device list.
fn machine_name() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "PocketPad Relay".to_string())
}

/// Builds the payload the relay prints (and renders as a QR code) at
/// startup.  `port` is the *bound* port, which differs from the config when
/// the config asked for an ephemeral one.
pub fn connection_info(config: &RelayConfig, port: u16, token: &str) -> PairingPayload {
    PairingPayload::new(
        advertised_addresses(config),
        port,
        token.to_string(),
        machine_name(),
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertise_ips_override_takes_precedence() {
        let mut config = RelayConfig::default();
        config.advertise_ips = vec!["10.0.0.7".into(), "192.168.1.7".into()];

        let addrs = advertised_addresses(&config);
        assert_eq!(addrs, vec!["10.0.0.7".to_string(), "192.168.1.7".to_string()]);
    }

    #[test]
    fn test_discovery_always_yields_at_least_one_address() {
        let config = RelayConfig::default();
        let addrs = advertised_addresses(&config);
        assert!(!addrs.is_empty());
    }

    #[test]
    fn test_discovery_advertises_every_interface_address() {
        let config = RelayConfig::default();
        let addrs = advertised_addresses(&config);

        // Every non-loopback IPv4 interface must be in the payload, not
        // just the default route.
        for addr in local_ipv4_addresses() {
            assert!(addrs.contains(&addr), "missing interface address {addr}");
        }
    }

    #[test]
    fn test_default_route_address_comes_first_without_duplicates() {
        let config = RelayConfig::default();
        let addrs = advertised_addresses(&config);

        if let Some(primary) = default_route_address() {
            assert_eq!(addrs[0], primary);
        }
        let mut deduped = addrs.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), addrs.len(), "duplicate candidates: {addrs:?}");
    }

    #[test]
    fn test_connection_info_carries_bound_port_and_token() {
        let config = RelayConfig::default();
        let payload = connection_info(&config, 50123, "tok12345");

        assert_eq!(payload.port, 50123);
        assert_eq!(payload.token, "tok12345");
        assert!(!payload.candidates().is_empty());
    }

    #[test]
    fn test_connection_info_serializes_with_ips_array() {
        let mut config = RelayConfig::default();
        config.advertise_ips = vec!["192.168.1.20".into()];
        let payload = connection_info(&config, 4724, "tok");

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""ips":["192.168.1.20"]"#));
        assert!(json.contains(r#""port":4724"#));
    }
}
