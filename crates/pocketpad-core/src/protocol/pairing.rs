//! The pairing payload the desktop embeds in its QR code.
//!
//! The relay produces this JSON once per process; the mobile client scans it
//! and feeds the address candidates into its connection resolver.  How the
//! payload travels (QR render, clipboard, …) is out of scope here.
//!
//! # Legacy format
//!
//! Early desktop builds emitted a singular `ip` field.  Current builds emit
//! an `ips` array covering every local interface so multi-homed desktops
//! (Wi-Fi + Ethernet + VPN) stay reachable.  [`PairingPayload::candidates`]
//! normalises both forms to a list.

use serde::{Deserialize, Serialize};

/// Connection info produced by the desktop, consumed by the mobile client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingPayload {
    /// All candidate IPv4 addresses of the desktop, in preference order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ips: Vec<String>,
    /// Legacy singular address field; treated as a one-element `ips`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// The relay's listening port.
    pub port: u16,
    /// Shared secret the client must present in its `auth` command.
    pub token: String,
    /// Desktop hostname, shown in the mobile UI.
    #[serde(default)]
    pub name: String,
}

impl PairingPayload {
    /// Builds a current-format payload (multi-address).
    pub fn new(ips: Vec<String>, port: u16, token: String, name: String) -> Self {
        Self {
            ips,
            ip: None,
            port,
            token,
            name,
        }
    }

    /// Returns the candidate address list, normalising the legacy `ip` form.
    pub fn candidates(&self) -> Vec<String> {
        if !self.ips.is_empty() {
            self.ips.clone()
        } else {
            self.ip.iter().cloned().collect()
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_format_round_trips() {
        let original = PairingPayload::new(
            vec!["192.168.1.10".into(), "10.0.0.5".into()],
            4724,
            "tok3n".into(),
            "work-desktop".into(),
        );
        let json = serde_json::to_string(&original).unwrap();
        let decoded: PairingPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(original, decoded);
        assert!(!json.contains(r#""ip":"#), "new payloads must not emit the legacy field");
    }

    #[test]
    fn test_candidates_preserves_list_order() {
        let payload = PairingPayload::new(
            vec!["a".into(), "b".into(), "c".into()],
            4724,
            "t".into(),
            "n".into(),
        );
        assert_eq!(payload.candidates(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_legacy_singular_ip_is_accepted_as_one_element_list() {
        // Payload emitted by a pre-multi-interface desktop build.
        let json = r#"{"ip":"192.168.1.42","port":4724,"token":"abcd1234","name":"old-pc"}"#;
        let payload: PairingPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.candidates(), vec!["192.168.1.42"]);
        assert_eq!(payload.port, 4724);
        assert_eq!(payload.token, "abcd1234");
    }

    #[test]
    fn test_ips_takes_precedence_over_legacy_ip_when_both_present() {
        let json = r#"{"ips":["10.0.0.1"],"ip":"192.168.1.1","port":4724,"token":"t","name":"x"}"#;
        let payload: PairingPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.candidates(), vec!["10.0.0.1"]);
    }

    #[test]
    fn test_missing_name_defaults_to_empty() {
        let json = r#"{"ips":["10.0.0.1"],"port":4724,"token":"t"}"#;
        let payload: PairingPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.name, "");
    }

    #[test]
    fn test_payload_without_any_address_yields_no_candidates() {
        let json = r#"{"port":4724,"token":"t","name":"x"}"#;
        let payload: PairingPayload = serde_json::from_str(json).unwrap();
        assert!(payload.candidates().is_empty());
    }
}
