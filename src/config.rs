//! Configuration for keyscope
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration for a browsing session
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Server address (host:port)
    pub addr: String,

    /// Credential sent with AUTH right after connecting, if any
    pub auth: Option<String>,

    /// TCP connect timeout
    pub connect_timeout: Option<Duration>,

    /// Default read deadline for every call
    pub read_timeout: Option<Duration>,

    /// Default write deadline for every call
    pub write_timeout: Option<Duration>,

    // -------------------------------------------------------------------------
    // Scan Configuration
    // -------------------------------------------------------------------------
    /// COUNT hint passed to every SCAN round
    pub scan_batch_size: usize,

    // -------------------------------------------------------------------------
    // Tree Configuration
    // -------------------------------------------------------------------------
    /// Separator between namespace segments of a key
    pub delimiter: char,

    /// Fan-out above which child lookups switch to a hash index
    pub index_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6379".to_string(),
            auth: None,
            connect_timeout: Some(Duration::from_secs(5)),
            read_timeout: Some(Duration::from_secs(30)),
            write_timeout: Some(Duration::from_secs(30)),
            scan_batch_size: 10_000,
            delimiter: ':',
            index_threshold: 20,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server address (host:port)
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Set the AUTH credential; an empty string means none
    pub fn auth(mut self, auth: impl Into<String>) -> Self {
        let auth = auth.into();
        self.config.auth = if auth.is_empty() { None } else { Some(auth) };
        self
    }

    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    pub fn write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Set the SCAN COUNT hint
    pub fn scan_batch_size(mut self, count: usize) -> Self {
        self.config.scan_batch_size = count.max(1);
        self
    }

    /// Set the namespace delimiter
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    /// Set the fan-out threshold for indexed child lookup
    pub fn index_threshold(mut self, threshold: usize) -> Self {
        self.config.index_threshold = threshold;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// A saved connection as the UI layer persists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub auth: String,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            name: "127.0.0.1:6379".to_string(),
            host: "127.0.0.1".to_string(),
            port: 6379,
            auth: String::new(),
        }
    }
}

impl ConnectionProfile {
    /// host:port
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build a session config for this profile on top of `base` tunables.
    pub fn to_config(&self, base: &Config) -> Config {
        let mut config = base.clone();
        config.addr = self.address();
        config.auth = if self.auth.is_empty() {
            None
        } else {
            Some(self.auth.clone())
        };
        config
    }
}
