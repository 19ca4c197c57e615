use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use tracing::warn;

/// Emulator options, loadable from a YAML file named by `GLIDE3X_CONFIG`.
/// `GLIDE3X_THREADS` overrides the worker count from the environment
/// (0 disables threading, 1..=8 picks an explicit pool size).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RvConfig {
    /// rasterizer worker threads; None = one per spare core, capped at 8
    pub threads: Option<usize>,
    /// window scale factor for the demo frontend
    pub scale: usize,
    /// default log filter
    pub log: String,
}

impl Default for RvConfig {
    fn default() -> Self {
        Self {
            threads: None,
            scale: 1,
            log: "info".to_string(),
        }
    }
}

impl RvConfig {
    pub fn load() -> Self {
        match env::var("GLIDE3X_CONFIG") {
            Ok(path) => match fs::read_to_string(&path) {
                Ok(text) => match serde_yaml::from_str(&text) {
                    Ok(config) => config,
                    Err(e) => {
                        warn!("bad config file {path}: {e}");
                        Self::default()
                    }
                },
                Err(e) => {
                    warn!("cannot read config file {path}: {e}");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Resolved worker thread count: environment first, then the config
    /// file, then one per spare core.
    pub fn worker_threads(&self) -> usize {
        if let Ok(value) = env::var("GLIDE3X_THREADS") {
            match value.parse::<usize>() {
                Ok(n) => return n.min(8),
                Err(_) => warn!("ignoring non-numeric GLIDE3X_THREADS={value}"),
            }
        }
        if let Some(n) = self.threads {
            return n.min(8);
        }
        std::thread::available_parallelism()
            .map(|n| n.get().saturating_sub(1))
            .unwrap_or(0)
            .min(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_yaml() {
        let text = serde_yaml::to_string(&RvConfig::default()).unwrap();
        let back: RvConfig = serde_yaml::from_str(&text).unwrap();
        assert_eq!(back.scale, 1);
        assert_eq!(back.log, "info");
        assert!(back.threads.is_none());
    }

    #[test]
    fn partial_yaml_uses_defaults() {
        let back: RvConfig = serde_yaml::from_str("threads: 4\n").unwrap();
        assert_eq!(back.threads, Some(4));
        assert_eq!(back.scale, 1);
    }
}
