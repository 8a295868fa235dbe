use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Relays used when none are configured or connected explicitly.
pub const DEFAULT_RELAYS: [&str; 5] = [
    "wss://relay.damus.io",
    "wss://relay.nostr.band",
    "wss://nos.lol",
    "wss://relay.snort.social",
    "wss://nostr.wine",
];

const IDENTITY_ENV: &str = "RELAYNOTE_IDENTITY";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub relays: RelaysConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub signer: SignerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelaysConfig {
    #[serde(default = "default_relays")]
    pub urls: Vec<String>,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedConfig {
    #[serde(default = "default_feed_limit")]
    pub limit: usize,
    #[serde(default = "default_feed_limit")]
    pub profile_limit: usize,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SignerConfig {
    pub identity_file: Option<String>,
    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,
    #[serde(default = "default_probe_delay_ms")]
    pub probe_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for RelaysConfig {
    fn default() -> Self {
        Self {
            urls: default_relays(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            limit: default_feed_limit(),
            profile_limit: default_feed_limit(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            identity_file: None,
            probe_attempts: default_probe_attempts(),
            probe_delay_ms: default_probe_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_relays() -> Vec<String> {
    DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect()
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_feed_limit() -> usize {
    50
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_probe_attempts() -> u32 {
    5
}

fn default_probe_delay_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// `<config dir>/relaynote/relaynote.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "relaynote")
            .map(|dirs| dirs.config_dir().join("relaynote.toml"))
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(path);
        let content = fs::read_to_string(expanded_path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let mut config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env();
        Ok(config)
    }

    /// Load an explicit path, or the default path when it exists, or defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }
        match Self::default_path() {
            Some(default) if default.exists() => Self::load_from_file(&default.to_string_lossy()),
            _ => {
                let mut config = Self::default();
                config.apply_env();
                Ok(config)
            }
        }
    }

    fn apply_env(&mut self) {
        if self.signer.identity_file.is_none() {
            if let Ok(path) = std::env::var(IDENTITY_ENV) {
                self.signer.identity_file = Some(path);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        for url in &self.relays.urls {
            if !url.starts_with("wss://") && !url.starts_with("ws://") {
                anyhow::bail!("Relay URL must start with ws:// or wss://: {}", url);
            }
        }

        if self.relays.fetch_timeout_secs == 0 {
            anyhow::bail!("relays.fetch_timeout_secs must be greater than zero");
        }

        if self.feed.limit == 0 || self.feed.profile_limit == 0 {
            anyhow::bail!("Feed limits must be greater than zero");
        }

        if self.feed.refresh_interval_secs == 0 {
            anyhow::bail!("feed.refresh_interval_secs must be greater than zero");
        }

        Ok(())
    }

    pub fn expand_paths(&mut self) {
        if let Some(path) = &self.signer.identity_file {
            self.signer.identity_file = Some(shellexpand::tilde(path).to_string());
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.relays.fetch_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.feed.refresh_interval_secs)
    }

    pub fn probe_delay(&self) -> Duration {
        Duration::from_millis(self.signer.probe_delay_ms)
    }
}
