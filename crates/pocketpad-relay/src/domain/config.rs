//! TOML-based configuration for the relay, plus the per-process token.
//!
//! The config file is optional: an absent file yields `RelayConfig::default()`
//! and absent fields fall back per-field via serde defaults, so the relay
//! works on first run and across schema additions.
//!
//! The shared token is deliberately NOT part of the file: it is minted once
//! per process lifetime and embedded in the pairing payload, so a restart
//! always invalidates previously paired clients.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema ─────────────────────────────────────────────────────────────

/// Relay settings stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    /// TCP port the relay listens on.  `0` asks the OS for an ephemeral port
    /// (used by tests).
    #[serde(default = "default_port")]
    pub port: u16,
    /// IP address to bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Multiplier applied to gesture move deltas before smoothing.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    /// Multiplier applied to scroll deltas.
    #[serde(default = "default_scroll_sensitivity")]
    pub scroll_sensitivity: f64,
    /// Gap between the two clicks of a double click, in milliseconds.
    #[serde(default = "default_double_click_delay_ms")]
    pub double_click_delay_ms: u64,
    /// Path to the native input bridge executable.  When relative (the
    /// default), it is resolved through `PATH`.
    #[serde(default = "default_bridge_path")]
    pub bridge_path: String,
    /// Addresses to advertise in the pairing payload instead of the
    /// auto-detected ones.  Useful when detection misses an interface.
    #[serde(default)]
    pub advertise_ips: Vec<String>,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_port() -> u16 {
    4724
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_sensitivity() -> f64 {
    2.5
}
fn default_scroll_sensitivity() -> f64 {
    7.5
}
fn default_double_click_delay_ms() -> u64 {
    100
}
fn default_bridge_path() -> String {
    "pocketpad-bridge".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            sensitivity: default_sensitivity(),
            scroll_sensitivity: default_scroll_sensitivity(),
            double_click_delay_ms: default_double_click_delay_ms(),
            bridge_path: default_bridge_path(),
            advertise_ips: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

/// Resolves the full path to the default config file.
///
/// - Windows:  `%APPDATA%\PocketPad\relay.toml`
/// - Linux:    `~/.config/pocketpad/relay.toml`
/// - macOS:    `~/Library/Application Support/PocketPad/relay.toml`
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .ok_or(ConfigError::NoPlatformConfigDir)
        .map(|dir| dir.join("relay.toml"))
}

/// Loads `RelayConfig` from `path`, returning `RelayConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: RelayConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(RelayConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("PocketPad"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("pocketpad"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("PocketPad")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Token generation ──────────────────────────────────────────────────────────

/// Mints the shared secret embedded in the pairing payload: 8 lowercase
/// alphanumeric characters, generated once per process and never persisted.
///
/// Simple determinism-free generation using system time + thread ID.
/// Production code should use the `rand` crate with OsRng.
pub fn generate_token() -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    use std::time::SystemTime;

    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

    let mut hasher = DefaultHasher::new();
    SystemTime::now().hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);
    std::process::id().hash(&mut hasher);

    let mut n = hasher.finish();
    let mut token = String::with_capacity(8);
    for _ in 0..8 {
        token.push(ALPHABET[(n % ALPHABET.len() as u64) as usize] as char);
        n /= ALPHABET.len() as u64;
    }
    token
}

// ── Tests ─────────────────────────────────────────────────────────────────────
