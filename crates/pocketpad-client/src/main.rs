//! Entry point for the PocketPad client engine.
//!
//! The production client is the mobile app, which embeds this crate as a
//! library.  This binary wraps the same engine in a terminal harness for
//! development and debugging: it connects to a relay exactly like the app
//! does and forwards typed lines as keypresses.
//!
//! # Usage
//!
//! ```text
//! pocketpad-client --pairing '<JSON>'            # paste the relay's payload
//! pocketpad-client --host 10.0.0.5 --token abcd  # or spell it out
//!
//! Options:
//!   --pairing <JSON>   Pairing payload as printed by the relay
//!   --host    <ADDR>   Candidate relay address (repeatable, in order)
//!   --port    <PORT>   Relay port [default: 4724]
//!   --token   <TOKEN>  Session token
//! ```
//!
//! Connection lifecycle events are printed as they happen.  Each line read
//! from stdin is sent as one `keypress` command.

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pocketpad_client::infrastructure::network::{ClientEvent, ConnectionConfig, RelayClient};
use pocketpad_core::{ClientCommand, PairingPayload};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// PocketPad client engine (terminal harness).
#[derive(Debug, Parser)]
#[command(
    name = "pocketpad-client",
    about = "Connects to a PocketPad relay and forwards typed lines as keypresses",
    version
)]
struct Cli {
    /// Pairing payload JSON as printed by the relay at startup.
    #[arg(long, conflicts_with_all = ["host", "token"])]
    pairing: Option<String>,

    /// Candidate relay address.  Repeat to give several, in preference
    /// order; an entry may embed its own port (`10.0.0.5:4810`).
    #[arg(long)]
    host: Vec<String>,

    /// Relay port for hosts without an embedded port.
    #[arg(long, default_value_t = 4724)]
    port: u16,

    /// Session token from the relay's pairing payload.
    #[arg(long)]
    token: Option<String>,
}

impl Cli {
    /// Builds the resolver config from either form of the arguments.
    ///
    /// # Errors
    ///
    /// Returns an error when neither `--pairing` nor a usable
    /// `--host`/`--token` pair was given, or the payload JSON is invalid.
    fn into_connection_config(self) -> anyhow::Result<ConnectionConfig> {
        if let Some(json) = self.pairing {
            let payload: PairingPayload =
                serde_json::from_str(&json).context("parsing pairing payload")?;
            return ConnectionConfig::from_payload(&payload)
                .context("pairing payload is unusable");
        }

        if self.host.is_empty() {
            bail!("either --pairing or at least one --host is required");
        }
        let token = match self.token {
            Some(token) => token,
            None => bail!("--token is required when connecting via --host"),
        };

        let payload = PairingPayload::new(self.host, self.port, token, String::new());
        Ok(ConnectionConfig::from_payload(&payload)?)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_connection_config()?;
    let (client, mut events) = RelayClient::new(config);
    Arc::clone(&client).connect();

    // Print lifecycle events as the resolver works through the candidates.
    let mut printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ClientEvent::Connecting { address } => println!("connecting to {address}…"),
                ClientEvent::Active { address, pro } => {
                    println!("connected to {address} (pro: {pro}); type to send keypresses")
                }
                ClientEvent::AuthRejected { message } => {
                    println!(
                        "auth rejected: {}",
                        message.unwrap_or_else(|| "invalid token".to_string())
                    );
                    break;
                }
                ClientEvent::Disconnected => println!("disconnected"),
                ClientEvent::Reconnecting { address } => println!("reconnecting to {address}…"),
                ClientEvent::Failed => {
                    println!("could not reach the relay on any address");
                    break;
                }
            }
        }
    });

    // Forward stdin lines as keypress commands until EOF or a terminal
    // resolver event.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = &mut printer => break,
            line = lines.next_line() => {
                match line.context("reading stdin")? {
                    Some(text) => {
                        let command = ClientCommand::Keypress { key: text };
                        if let Err(e) = client.send_command(&command).await {
                            warn!("keypress dropped: {e}");
                        }
                    }
                    None => break,
                }
            }
        }
    }

    client.disconnect().await;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_pairing_payload_builds_config() {
        let cli = Cli::parse_from([
            "pocketpad-client",
            "--pairing",
            r#"{"ips":["192.168.1.9"],"port":4724,"token":"abcd1234","name":"desk"}"#,
        ]);
        let config = cli.into_connection_config().unwrap();
        assert_eq!(config.addresses, vec!["192.168.1.9"]);
        assert_eq!(config.port, 4724);
        assert_eq!(config.token, "abcd1234");
    }

    #[test]
    fn test_cli_hosts_keep_their_order() {
        let cli = Cli::parse_from([
            "pocketpad-client",
            "--host",
            "10.0.0.5",
            "--host",
            "192.168.1.5",
            "--token",
            "t0k3n",
        ]);
        let config = cli.into_connection_config().unwrap();
        assert_eq!(config.addresses, vec!["10.0.0.5", "192.168.1.5"]);
        assert_eq!(config.token, "t0k3n");
    }

    #[test]
    fn test_cli_default_port() {
        let cli = Cli::parse_from(["pocketpad-client", "--host", "h", "--token", "t"]);
        assert_eq!(cli.port, 4724);
    }

    #[test]
    fn test_cli_without_any_target_is_an_error() {
        let cli = Cli::parse_from(["pocketpad-client"]);
        assert!(cli.into_connection_config().is_err());
    }

    #[test]
    fn test_cli_host_without_token_is_an_error() {
        let cli = Cli::parse_from(["pocketpad-client", "--host", "10.0.0.5"]);
        assert!(cli.into_connection_config().is_err());
    }

    #[test]
    fn test_cli_invalid_pairing_json_is_an_error() {
        let cli = Cli::parse_from(["pocketpad-client", "--pairing", "{broken"]);
        assert!(cli.into_connection_config().is_err());
    }

    #[test]
    fn test_cli_legacy_singular_ip_payload_is_accepted() {
        let cli = Cli::parse_from([
            "pocketpad-client",
            "--pairing",
            r#"{"ip":"192.168.1.42","port":4724,"token":"old","name":"pc"}"#,
        ]);
        let config = cli.into_connection_config().unwrap();
        assert_eq!(config.addresses, vec!["192.168.1.42"]);
    }
}
