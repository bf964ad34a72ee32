//! Entry point for the PocketPad relay.
//!
//! This binary turns a phone into a wireless trackpad and keyboard for the
//! desktop it runs on.  It listens for WebSocket connections from the
//! PocketPad mobile app, authenticates them against a per-run token, and
//! replays their gestures as OS input through the native bridge helper.
//!
//! # Usage
//!
//! ```text
//! pocketpad-relay [OPTIONS]
//!
//! Options:
//!   --port   <PORT>   WebSocket listener port [default: 4724]
//!   --bind   <ADDR>   Bind address [default: 0.0.0.0]
//!   --bridge <PATH>   Input bridge executable [default: pocketpad-bridge]
//!   --config <FILE>   Config file path [default: platform config dir]
//!   --pro             Report the pro entitlement to authenticated clients
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable            | Default            | Description                |
//! |---------------------|--------------------|----------------------------|
//! | `POCKETPAD_PORT`    | `4724`             | WebSocket listener port    |
//! | `POCKETPAD_BIND`    | `0.0.0.0`          | Bind address               |
//! | `POCKETPAD_BRIDGE`  | `pocketpad-bridge` | Input bridge executable    |
//!
//! # Pairing
//!
//! At startup the relay prints a one-line JSON pairing payload (addresses,
//! port, token) to stdout.  The desktop shell renders it as a QR code; the
//! mobile app scans it and connects.  The token is minted fresh on every
//! run, so restarting the relay un-pairs all clients.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pocketpad_relay::application::authorize::AlwaysAuthorized;
use pocketpad_relay::domain::config::{self, RelayConfig};
use pocketpad_relay::infrastructure::bridge::ProcessBridge;
use pocketpad_relay::infrastructure::pairing::connection_info;
use pocketpad_relay::infrastructure::ws_server::RelayServer;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// PocketPad desktop relay.
///
/// Accepts WebSocket connections from the PocketPad mobile app and replays
/// their gestures as local mouse and keyboard input.
#[derive(Debug, Parser)]
#[command(
    name = "pocketpad-relay",
    about = "Turns a phone running PocketPad into a wireless trackpad for this machine",
    version
)]
struct Cli {
    /// TCP port for the WebSocket listener.  Overrides the config file.
    #[arg(long, env = "POCKETPAD_PORT")]
    port: Option<u16>,

    /// Bind address.  `0.0.0.0` accepts connections from the whole LAN,
    /// `127.0.0.1` only from this machine.  Overrides the config file.
    #[arg(long, env = "POCKETPAD_BIND")]
    bind: Option<String>,

    /// Path or name of the input bridge executable.  Overrides the config
    /// file.
    #[arg(long, env = "POCKETPAD_BRIDGE")]
    bridge: Option<String>,

    /// Config file to load instead of the platform default location.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Report the pro entitlement flag to authenticated clients.
    #[arg(long, default_value_t = false)]
    pro: bool,
}

impl Cli {
    /// Loads the config file and applies the CLI overrides on top.
    ///
    /// # Errors
    ///
    /// Returns an error when the config file exists but cannot be read or
    /// parsed, or when no path was given and the platform config directory
    /// cannot be determined.
    fn into_relay_config(self) -> anyhow::Result<(RelayConfig, bool)> {
        let path = match &self.config {
            Some(path) => path.clone(),
            None => config::config_file_path().context("resolving config file location")?,
        };
        let mut cfg =
            config::load_config(&path).with_context(|| format!("loading {}", path.display()))?;

        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(bind) = self.bind {
            cfg.bind_address = bind;
        }
        if let Some(bridge) = self.bridge {
            cfg.bridge_path = bridge;
        }
        Ok((cfg, self.pro))
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (cfg, pro) = Cli::parse().into_relay_config()?;

    // `RUST_LOG` wins; the config file's log_level is the fallback.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.clone())),
        )
        .init();

    info!(
        "PocketPad relay starting: bind={}:{}, bridge={}",
        cfg.bind_address, cfg.port, cfg.bridge_path
    );

    let token = config::generate_token();
    let authorizer = Arc::new(AlwaysAuthorized { pro });
    let bridge = Arc::new(ProcessBridge::new(cfg.bridge_path.clone()));

    let server = RelayServer::bind(&cfg, token.clone(), authorizer, bridge).await?;
    let bound = server.local_addr().context("reading bound address")?;

    // One line of JSON on stdout; the desktop shell turns it into a QR code.
    let payload = connection_info(&cfg, bound.port(), &token);
    println!(
        "{}",
        serde_json::to_string(&payload).context("serializing pairing payload")?
    );
    info!("pairing payload issued for {} address(es)", payload.candidates().len());

    // Ctrl+C clears the flag; the accept loop polls it every 200 ms.
    let running = Arc::new(AtomicBool::new(true));
    let running_signal = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_signal.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C: {e}");
            }
        }
    });

    server.run(running).await?;

    info!("PocketPad relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_leave_config_values_untouched() {
        let cli = Cli::parse_from(["pocketpad-relay"]);
        assert_eq!(cli.port, None);
        assert_eq!(cli.bind, None);
        assert_eq!(cli.bridge, None);
        assert!(!cli.pro);
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["pocketpad-relay", "--port", "9999"]);
        assert_eq!(cli.port, Some(9999));
    }

    #[test]
    fn test_cli_bind_override() {
        let cli = Cli::parse_from(["pocketpad-relay", "--bind", "127.0.0.1"]);
        assert_eq!(cli.bind.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_cli_bridge_override() {
        let cli = Cli::parse_from(["pocketpad-relay", "--bridge", "/opt/pp/bridge"]);
        assert_eq!(cli.bridge.as_deref(), Some("/opt/pp/bridge"));
    }

    #[test]
    fn test_cli_pro_flag() {
        let cli = Cli::parse_from(["pocketpad-relay", "--pro"]);
        assert!(cli.pro);
    }

    #[test]
    fn test_cli_overrides_apply_on_top_of_defaults() {
        let cli = Cli::parse_from([
            "pocketpad-relay",
            "--port",
            "8100",
            "--bind",
            "10.0.0.2",
            "--config",
            "/nonexistent/pocketpad-test/relay.toml",
        ]);
        let (cfg, pro) = cli.into_relay_config().unwrap();
        assert_eq!(cfg.port, 8100);
        assert_eq!(cfg.bind_address, "10.0.0.2");
        // Untouched fields keep their defaults.
        assert_eq!(cfg.sensitivity, 2.5);
        assert!(!pro);
    }
}
