//! Config loading and persistence.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub channel: ChannelConfig,
    pub notifications: NotificationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

/// Push channel recovery knobs.
///
/// The defaults are the documented protocol constants: 1s exponential base,
/// 60s cap, 30s liveness probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub heartbeat_interval_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 1_000,
            backoff_max_ms: 60_000,
            heartbeat_interval_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Where the unread-count summary survives page reloads.
    pub summary_path: PathBuf,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            summary_path: PathBuf::from("notification_state.json"),
        }
    }
}

pub fn load(path: &Path) -> crate::Result<Config> {
    let contents = fs::read_to_string(path)
        .map_err(|e| config_error(format!("failed to read {}: {e}", path.display())))?;
    toml::from_str(&contents)
        .map_err(|e| config_error(format!("failed to parse {}: {e}", path.display())))
}

pub fn load_or_default(path: &Path) -> Config {
    if path.exists() {
        match load(path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                tracing::warn!("config load failed, using defaults: {e}");
                return Config::default();
            }
        }
    }
    Config::default()
}

pub fn write_config(path: &Path, cfg: &Config) -> crate::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .map_err(|e| config_error(format!("failed to create {}: {e}", dir.display())))?;
    }
    let contents = toml::to_string_pretty(cfg)
        .map_err(|e| config_error(format!("failed to render config: {e}")))?;
    atomic_write(path, contents.as_bytes())
}

pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> crate::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let temp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| {
        config_error(format!(
            "failed to create temp file in {}: {e}",
            dir.display()
        ))
    })?;
    fs::write(temp.path(), data)
        .map_err(|e| config_error(format!("failed to write temp file: {e}")))?;
    temp.persist(path)
        .map_err(|e| config_error(format!("failed to persist {}: {e}", path.display())))?;
    Ok(())
}

fn config_error(reason: String) -> crate::Error {
    crate::Error::Store(crate::reconcile::StoreError::Io { reason })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.channel.backoff_base_ms, 1_000);
        assert_eq!(cfg.channel.backoff_max_ms, 60_000);
        assert_eq!(cfg.channel.heartbeat_interval_ms, 30_000);
    }

    #[test]
    fn config_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shopfloor.toml");
        let cfg = Config {
            channel: ChannelConfig {
                backoff_base_ms: 250,
                backoff_max_ms: 5_000,
                heartbeat_interval_ms: 10_000,
            },
            notifications: NotificationConfig {
                summary_path: dir.path().join("summary.json"),
            },
        };
        write_config(&path, &cfg).expect("write config");
        let loaded = load(&path).expect("load config");
        assert_eq!(loaded.channel.backoff_base_ms, 250);
        assert_eq!(loaded.channel.backoff_max_ms, 5_000);
        assert_eq!(loaded.channel.heartbeat_interval_ms, 10_000);
        assert_eq!(loaded.notifications.summary_path, cfg.notifications.summary_path);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(cfg.channel.backoff_base_ms, 1_000);
    }
}
