//! TOML configuration.
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8787"
//!
//! [backend]
//! url = "http://127.0.0.1:8000/chat"
//! idle_timeout_secs = 60
//!
//! [transcoder]
//! boundary = "drop"
//!
//! [auth]
//! tokens = [{ user_id = "alice", token_sha256 = "…" }]
//! ```
//!
//! The backend URL can be overridden with `CODECOMPASS_BACKEND_URL`.

use anyhow::{Context, Result};
use codecompass_core::transcoder::DEFAULT_MAX_CARRY_BYTES;
use codecompass_core::{BoundaryPolicy, TranscoderOptions};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `[backend].url`.
pub const BACKEND_URL_ENV: &str = "CODECOMPASS_BACKEND_URL";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    #[serde(default = "default_cors")]
    pub cors: bool,
}

fn default_cors() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Honor `HTTP_PROXY`/`HTTPS_PROXY` for backend calls.
    #[serde(default = "default_system_proxy")]
    pub system_proxy: bool,
}

fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_idle_timeout_secs() -> u64 {
    60
}
fn default_system_proxy() -> bool {
    true
}

impl BackendConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscoderConfig {
    #[serde(default)]
    pub boundary: BoundaryPolicy,
    #[serde(default = "default_max_carry_bytes")]
    pub max_carry_bytes: usize,
}

fn default_max_carry_bytes() -> usize {
    DEFAULT_MAX_CARRY_BYTES
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            boundary: BoundaryPolicy::Drop,
            max_carry_bytes: DEFAULT_MAX_CARRY_BYTES,
        }
    }
}

impl TranscoderConfig {
    pub fn options(&self) -> TranscoderOptions {
        TranscoderOptions {
            policy: self.boundary,
            max_carry_bytes: self.max_carry_bytes,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

fn default_cookie_name() -> String {
    "cc_session".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            tokens: Vec::new(),
        }
    }
}

/// One accepted session token. Exactly one of `token` or `token_sha256`
/// (lowercase hex digest) must be set.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    pub user_id: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_sha256: Option<String>,
}

impl Config {
    /// Defaults for commands that can run without a config file.
    pub fn minimal() -> Self {
        Self {
            server: ServerConfig {
                bind: "127.0.0.1:8787".to_string(),
                cors: default_cors(),
            },
            backend: BackendConfig {
                url: "http://127.0.0.1:8000/chat".to_string(),
                connect_timeout_secs: default_connect_timeout_secs(),
                idle_timeout_secs: default_idle_timeout_secs(),
                system_proxy: default_system_proxy(),
            },
            transcoder: TranscoderConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

/// Reads, overrides from the environment, and validates a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;

    if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
        if !url.trim().is_empty() {
            config.backend.url = url.trim().to_string();
        }
    }

    validate(&config)?;
    Ok(config)
}

/// Parses config text without environment overrides or validation.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

pub fn validate(config: &Config) -> Result<()> {
    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    let url = config.backend.url.as_str();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("backend.url must be an http(s) URL, got '{}'", url);
    }
    if config.backend.connect_timeout_secs == 0 {
        anyhow::bail!("backend.connect_timeout_secs must be > 0");
    }
    if config.backend.idle_timeout_secs == 0 {
        anyhow::bail!("backend.idle_timeout_secs must be > 0");
    }

    if config.transcoder.max_carry_bytes == 0 {
        anyhow::bail!("transcoder.max_carry_bytes must be > 0");
    }

    if config.auth.cookie_name.trim().is_empty() {
        anyhow::bail!("auth.cookie_name must not be empty");
    }
    for (i, entry) in config.auth.tokens.iter().enumerate() {
        if entry.user_id.trim().is_empty() {
            anyhow::bail!("auth.tokens[{}].user_id must not be empty", i);
        }
        match (&entry.token, &entry.token_sha256) {
            (Some(token), None) if !token.is_empty() => {}
            (None, Some(digest)) => {
                let decoded = hex::decode(digest).with_context(|| {
                    format!("auth.tokens[{}].token_sha256 is not valid hex", i)
                })?;
                if decoded.len() != 32 {
                    anyhow::bail!("auth.tokens[{}].token_sha256 must be a SHA-256 digest", i);
                }
            }
            _ => anyhow::bail!(
                "auth.tokens[{}] must set exactly one of token or token_sha256",
                i
            ),
        }
    }

    Ok(())
}
