use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Layered config (figment-deserialized from defaults / session_store.toml / env)
// =============================================================================
//
//   session_store.toml:   [client]
//                         application = "demo"
//
//   env var:              SESSION_STORE_CLIENT__APPLICATION=demo
//
//   (double underscore = nesting, single underscore stays within field names)

pub const ENV_PREFIX: &str = "SESSION_STORE_";
pub const DEFAULT_CONFIG_FILE: &str = "session_store.toml";

/// Decoder handed to the client for turning a raw token into claims.
pub type JwtDecoder = Arc<dyn Fn(&str) -> Value + Send + Sync>;

/// Options passed verbatim to the underlying client.
///
/// The store never interprets these fields.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Application name the client registers under
    #[serde(default)]
    pub application: String,
    /// HTTP(S) URL of the messaging server
    #[serde(default)]
    pub url: String,
    /// Explicit WebSocket URL, when it differs from `url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
    /// Ask the client to log its own traffic
    #[serde(default)]
    pub log: bool,
    /// Use JWT-based sessions
    #[serde(default)]
    pub jwt: bool,
    #[serde(skip)]
    pub jwt_decode: Option<JwtDecoder>,
}

impl ClientConfig {
    pub fn new(application: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = Some(ws_url.into());
        self
    }

    pub fn with_jwt_decode<F>(mut self, decode: F) -> Self
    where
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        self.jwt = true;
        self.jwt_decode = Some(Arc::new(decode));
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("application", &self.application)
            .field("url", &self.url)
            .field("ws_url", &self.ws_url)
            .field("log", &self.log)
            .field("jwt", &self.jwt)
            .field("jwt_decode", &self.jwt_decode.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub requests: RequestsFileConfig,
    #[serde(default)]
    pub events: EventsFileConfig,
}

/// Request tunables (lives under `[requests]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RequestsFileConfig {
    /// Seconds to wait for a response; 0 waits forever
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RequestsFileConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Observer buffer sizes (lives under `[events]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventsFileConfig {
    #[serde(default = "default_update_capacity")]
    pub update_capacity: usize,
    #[serde(default = "default_error_capacity")]
    pub error_capacity: usize,
}

impl Default for EventsFileConfig {
    fn default() -> Self {
        Self {
            update_capacity: default_update_capacity(),
            error_capacity: default_error_capacity(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_update_capacity() -> usize {
    observable::DEFAULT_UPDATE_CAPACITY
}
fn default_error_capacity() -> usize {
    32
}

/// Runtime settings of the store itself.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// `None` lets a request wait for its response forever
    pub request_timeout: Option<Duration>,
    /// Buffered per-update notifications per slot
    pub update_capacity: usize,
    /// Buffered lifecycle errors for slow subscribers
    pub error_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_file(&FileConfig::default())
    }
}

impl StoreConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        Self {
            request_timeout: match fc.requests.timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            update_capacity: fc.events.update_capacity,
            error_capacity: fc.events.error_capacity,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Build a figment that layers: defaults → config file → SESSION_STORE_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `SESSION_STORE_CLIENT__URL=http://h:8080`  →  `client.url`
///   `SESSION_STORE_REQUESTS__TIMEOUT_SECS=5`   →  `requests.timeout_secs`
pub fn load_config(config_file: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_file))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Extract and check the client and store settings from a figment.
pub fn resolve(figment: &figment::Figment) -> Result<(ClientConfig, StoreConfig)> {
    let fc: FileConfig = figment
        .extract()
        .context("failed to parse session store configuration")?;

    if fc.client.application.trim().is_empty() {
        bail!("client.application must be set");
    }
    if fc.client.url.trim().is_empty() {
        bail!("client.url must be set");
    }

    let store = StoreConfig::from_file(&fc);
    Ok((fc.client, store))
}
