use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration loaded from icebox.toml.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub pressure: PressureConfig,
    pub retention: RetentionConfig,
    pub archive: ArchiveConfig,
}

/// The emergency reclaimer: watches free space and compacts one file at a
/// time while the storage filesystem stays below the free-ratio floor.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PressureConfig {
    /// Reclaim kicks in when free space falls below this fraction of the
    /// filesystem. 0.0 disables the reclaimer.
    pub free_ratio: f64,
    pub poll_interval_secs: u64,
    /// Which file counts as "oldest" when reclaiming.
    pub order: EmergencyOrder,
}

/// The daily retention sweep: compacts media files past the age threshold.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub threshold_days: u32,
    pub sweep_interval_secs: u64,
    /// File extensions (without the dot) the sweep considers. Exact match;
    /// an empty list makes the sweep a no-op.
    pub extensions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// What to do when a container already exists at the destination.
    pub on_collision: CollisionPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyOrder {
    /// Smallest terminal filename, compared lexicographically.
    Name,
    /// Earliest date partition, filename as tie-break.
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Replace the existing container and log that it happened.
    Overwrite,
    /// Leave both the container and the hot file alone.
    Skip,
    /// Treat the collision as an error for the caller to report.
    Fail,
}

impl std::fmt::Display for EmergencyOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmergencyOrder::Name => f.write_str("name"),
            EmergencyOrder::Date => f.write_str("date"),
        }
    }
}

impl std::fmt::Display for CollisionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollisionPolicy::Overwrite => f.write_str("overwrite"),
            CollisionPolicy::Skip => f.write_str("skip"),
            CollisionPolicy::Fail => f.write_str("fail"),
        }
    }
}

impl Config {
    /// Load configuration from `path`. A missing file yields the defaults;
    /// an unreadable or invalid one is an error, so a typo cannot silently
    /// run the daemon with settings the operator did not write.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        let config: Config = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ratio = self.pressure.free_ratio;
        if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
            return Err(ConfigError::Invalid(format!(
                "pressure.free_ratio must be within 0.0..=1.0, got {ratio}"
            )));
        }
        if self.pressure.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "pressure.poll_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.retention.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "retention.sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl PressureConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl RetentionConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: std::path::PathBuf,
        source: toml::de::Error,
    },
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read {}: {source}", path.display())
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse {}: {source}", path.display())
            }
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

// --- Default implementations ---

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            free_ratio: 0.1,
            poll_interval_secs: 10,
            order: EmergencyOrder::Name,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            threshold_days: 90,
            sweep_interval_secs: 86_400,
            extensions: vec!["wav".to_string(), "mp3".to_string()],
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            on_collision: CollisionPolicy::Overwrite,
        }
    }
}
