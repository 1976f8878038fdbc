use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// Unified config (figment-deserialized from defaults / relay.toml / env vars)
// =============================================================================
//
// Equivalent ways to configure:
//
//   relay.toml:      [server]
//                    port = 8080
//
//   env var:         RELAY_SERVER__PORT=8080   (double underscore = nesting)
//
//   hosting env:     PORT=8080                 (bare, above RELAY_* vars)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub relay: RelayFileConfig,
}

/// Listener settings (lives under `[server]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory with the browser chat UI, served for every non-API path.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

/// Relay tuning knobs (lives under `[relay]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayFileConfig {
    /// Outbound messages buffered per connection before new ones are dropped
    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,
    /// Seconds between server pings, 0 disables
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
}

impl Default for RelayFileConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: default_send_queue_capacity(),
            ping_interval_secs: default_ping_interval_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    10000
}
fn default_send_queue_capacity() -> usize {
    64
}
fn default_ping_interval_secs() -> u64 {
    30
}

/// Build a figment that layers: defaults → config file → `RELAY_*` env vars → `PORT`.
///
/// A bare `PORT` (set by hosting platforms) wins over `RELAY_SERVER__PORT`.
///
/// Env vars use double-underscore for nesting into sections:
///   `RELAY_SERVER__HOST=127.0.0.1`  →  `server.host = "127.0.0.1"`
///   `RELAY_RELAY__PING_INTERVAL_SECS=0`  →  `relay.ping_interval_secs = 0`
pub fn load_config(config_file: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let mut figment = Figment::from(Serialized::defaults(FileConfig::default()));
    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }

    figment
        .merge(Env::prefixed("RELAY_").split("__"))
        .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
}

// =============================================================================
// Runtime config structs (derived from FileConfig)
// =============================================================================

/// Listener configuration (runtime view).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_file(fc: &ServerFileConfig) -> Self {
        Self {
            host: fc.host.clone(),
            port: fc.port,
            static_dir: fc.static_dir.clone(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Per-connection relay behaviour (runtime view).
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Capacity of each connection's outbound queue, at least 1
    pub send_queue_capacity: usize,
    /// Keepalive ping period (None = disabled)
    pub ping_interval: Option<Duration>,
}

impl RelayConfig {
    pub fn from_file(fc: &RelayFileConfig) -> Self {
        Self {
            send_queue_capacity: fc.send_queue_capacity.max(1),
            ping_interval: if fc.ping_interval_secs == 0 {
                None
            } else {
                Some(Duration::from_secs(fc.ping_interval_secs))
            },
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::from_file(&RelayFileConfig::default())
    }
}
