//! Configuration for the Setu daemon
//!
//! Loads configuration from a TOML file. Every section has defaults, so a
//! file only needs the values that differ.

use crate::error::{Error, Result};
use crate::source::SyntheticConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub source: SyntheticConfig,
    pub snapshot: SnapshotConfig,
    pub logging: LoggingConfig,
}

/// Which side opens the TCP connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Dial `host:port`
    #[default]
    Outbound,
    /// Listen on `host:port` and serve one peer
    Inbound,
}

/// Stream session configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub role: Role,
    /// Peer address (outbound) or bind interface (inbound)
    ///
    /// Examples:
    /// - `10.0.8.2` - Dial the peer at this address
    /// - `0.0.0.0` - Inbound: accept on all interfaces
    pub host: String,
    /// TCP port; 0 lets an inbound session pick an ephemeral port
    pub port: u16,
    /// Scheduler period between ticks
    pub tick_period_ms: u64,
    /// Close the connection after this long without a frame
    pub idle_timeout_ms: u64,
    /// Bound on a single outbound connect
    pub connect_timeout_ms: u64,
    /// Bound on waiting for an inbound peer per tick
    pub accept_timeout_ms: u64,
    /// Bound on a single frame write
    pub write_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            role: Role::Outbound,
            host: "127.0.0.1".to_string(),
            port: 5800,
            tick_period_ms: 20,
            idle_timeout_ms: 500,
            connect_timeout_ms: 500,
            accept_timeout_ms: 20,
            write_timeout_ms: 1000,
        }
    }
}

impl SessionConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn accept_timeout(&self) -> Duration {
        Duration::from_millis(self.accept_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.role == Role::Outbound {
            if self.host.trim().is_empty() {
                return invalid("session.host must be set for outbound sessions");
            }
            if self.port == 0 {
                return invalid("session.port must be non-zero for outbound sessions");
            }
        }
        let timings = [
            ("tick_period_ms", self.tick_period_ms),
            ("idle_timeout_ms", self.idle_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("accept_timeout_ms", self.accept_timeout_ms),
            ("write_timeout_ms", self.write_timeout_ms),
        ];
        for (name, value) in timings {
            if value == 0 {
                return invalid(&format!("session.{} must be non-zero", name));
            }
        }
        if self.idle_timeout_ms < self.tick_period_ms {
            return invalid("session.idle_timeout_ms must be at least one tick period");
        }
        Ok(())
    }
}

/// Local snapshot persistence
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub enabled: bool,
    /// JSON document overwritten on every write
    pub path: PathBuf,
    pub period_ms: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("setu-status.json"),
            period_ms: 1000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn invalid(message: &str) -> Result<()> {
    Err(Error::InvalidParameter(message.to_string()))
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use setu::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("setu.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.session.validate()?;
        let p = self.source.dropout_probability;
        if !(0.0..=1.0).contains(&p) {
            return invalid("source.dropout_probability must be within [0, 1]");
        }
        if self.snapshot.enabled && self.snapshot.period_ms == 0 {
            return invalid("snapshot.period_ms must be non-zero");
        }
        Ok(())
    }
}
