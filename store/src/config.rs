//! Configuration management for the store.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default key prefix for every storage entry.
pub const DEFAULT_PREFIX: &str = "schooldb";
/// Default simulated latency of each Document API call.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(300);
/// Default subscription poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Where Document API writes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Write straight into the base collection
    #[default]
    WriteThrough,
    /// Append to the offline queue; reads merge it in
    Queued,
}

impl FromStr for WriteMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "write_through" | "write-through" => Ok(WriteMode::WriteThrough),
            "queued" | "offline" => Ok(WriteMode::Queued),
            _ => Err(ConfigError::InvalidWriteMode(s.to_string())),
        }
    }
}

/// What to do when stored content cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Fail the operation and leave the stored value untouched
    #[default]
    Reject,
    /// Treat the value as absent (collections reseed, the queue empties)
    Reseed,
}

impl FromStr for MalformedPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(MalformedPolicy::Reject),
            "reseed" => Ok(MalformedPolicy::Reseed),
            _ => Err(ConfigError::InvalidMalformedPolicy(s.to_string())),
        }
    }
}

/// Store configuration, loadable from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Prefix of every storage key (`"<prefix>_<collection>"`)
    pub prefix: String,
    /// Artificial delay before each Document API call completes
    pub latency: Duration,
    /// How often subscriptions re-read their collection
    pub poll_interval: Duration,
    /// Where writes go
    pub write_mode: WriteMode,
    /// Handling of unparseable stored content
    pub on_malformed: MalformedPolicy,
    /// Directory for the file backend; in-memory when unset
    pub data_dir: Option<PathBuf>,
    /// Byte quota for the in-memory backend
    pub quota_bytes: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            latency: DEFAULT_LATENCY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            write_mode: WriteMode::default(),
            on_malformed: MalformedPolicy::default(),
            data_dir: None,
            quota_bytes: None,
        }
    }
}

impl StoreConfig {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv().ok()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(prefix) = lookup("SCHOOLDB_PREFIX") {
            if prefix.trim().is_empty() {
                return Err(ConfigError::EmptyPrefix);
            }
            config.prefix = prefix;
        }

        if let Some(ms) = lookup("SCHOOLDB_LATENCY_MS") {
            config.latency = parse_millis("SCHOOLDB_LATENCY_MS", &ms)?;
        }

        if let Some(ms) = lookup("SCHOOLDB_POLL_INTERVAL_MS") {
            let interval = parse_millis("SCHOOLDB_POLL_INTERVAL_MS", &ms)?;
            if interval.is_zero() {
                return Err(ConfigError::InvalidNumber {
                    name: "SCHOOLDB_POLL_INTERVAL_MS",
                    value: ms,
                });
            }
            config.poll_interval = interval;
        }

        if let Some(mode) = lookup("SCHOOLDB_WRITE_MODE") {
            config.write_mode = mode.parse()?;
        }

        if let Some(policy) = lookup("SCHOOLDB_ON_MALFORMED") {
            config.on_malformed = policy.parse()?;
        }

        config.data_dir = lookup("SCHOOLDB_DATA_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        if let Some(bytes) = lookup("SCHOOLDB_QUOTA_BYTES") {
            config.quota_bytes =
                Some(bytes.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                    name: "SCHOOLDB_QUOTA_BYTES",
                    value: bytes.clone(),
                })?);
        }

        Ok(config)
    }

    /// Check invariants the `with_*` builders do not enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefix.trim().is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_quota_bytes(mut self, bytes: usize) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }
}

fn parse_millis(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidNumber {
            name,
            value: value.to_string(),
        })
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("SCHOOLDB_PREFIX must not be empty")]
    EmptyPrefix,

    #[error("Invalid {name} value: {value}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("Invalid SCHOOLDB_WRITE_MODE value: {0}")]
    InvalidWriteMode(String),

    #[error("Invalid SCHOOLDB_ON_MALFORMED value: {0}")]
    InvalidMalformedPolicy(String),
}
