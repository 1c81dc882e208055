//! Pool sizing configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CHUNK_SIZE, LARGE_ALLOC_DIVISOR, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use crate::error::ConfigError;

/// Sizing policy shared by every pool of a [`PoolTree`](crate::tree::PoolTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Capacity (in bytes) of a shared chunk (0 = default).
    pub chunk_size: usize,
    /// Requests larger than this get their own chunk (0 = derive from
    /// `chunk_size` in [`normalize`](Self::normalize)).
    pub large_alloc_threshold: usize,
}

impl Default for PoolConfig {
    /// Default chunk size with the threshold left unset, so it follows
    /// whatever chunk size is finally chosen.
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            large_alloc_threshold: 0,
        }
    }
}

impl PoolConfig {
    /// Normalize the configuration, applying defaults where values are zero
    /// and clamping the rest into a usable range.
    #[must_use]
    pub fn normalize(mut self) -> Self {
        if self.chunk_size == 0 {
            self.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        self.chunk_size = self.chunk_size.clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE);
        if self.large_alloc_threshold == 0 {
            self.large_alloc_threshold = self.chunk_size / LARGE_ALLOC_DIVISOR;
        }
        self.large_alloc_threshold = self.large_alloc_threshold.min(self.chunk_size);
        self
    }

    /// Whether a request of `n` bytes should get a dedicated chunk.
    #[must_use]
    pub fn wants_dedicated_chunk(&self, n: usize) -> bool {
        n > self.large_alloc_threshold
    }
}

/// Load a normalized configuration from a JSON file. Missing fields take
/// their defaults.
pub fn load_config(path: &Path) -> Result<PoolConfig, ConfigError> {
    Ok(read_config(path)?.normalize())
}

/// Read a configuration from a JSON file without normalizing it, so callers
/// can layer overrides on top before unset fields are derived.
pub fn read_config(path: &Path) -> Result<PoolConfig, ConfigError> {
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: PoolConfig =
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    tracing::debug!(path = %path.display(), ?config, "Loaded pool configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn normalize_fills_zeroes() {
        let cfg = PoolConfig {
            chunk_size: 0,
            large_alloc_threshold: 0,
        }
        .normalize();
        assert_eq!(cfg.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(cfg.large_alloc_threshold, DEFAULT_CHUNK_SIZE / LARGE_ALLOC_DIVISOR);
        assert_eq!(cfg, PoolConfig::default().normalize());
    }

    #[test]
    fn default_threshold_follows_chunk_size() {
        let cfg = PoolConfig {
            chunk_size: 65536,
            ..PoolConfig::default()
        }
        .normalize();
        assert_eq!(cfg.large_alloc_threshold, 16384);
    }

    #[test]
    fn normalize_clamps_tiny_chunks() {
        let cfg = PoolConfig {
            chunk_size: 8,
            large_alloc_threshold: 1000,
        }
        .normalize();
        assert_eq!(cfg.chunk_size, MIN_CHUNK_SIZE);
        assert_eq!(cfg.large_alloc_threshold, MIN_CHUNK_SIZE);
    }

    #[test]
    fn threshold_derives_from_chunk_size() {
        let cfg = PoolConfig {
            chunk_size: 4096,
            large_alloc_threshold: 0,
        }
        .normalize();
        assert_eq!(cfg.large_alloc_threshold, 1024);
        assert!(cfg.wants_dedicated_chunk(1025));
        assert!(!cfg.wants_dedicated_chunk(1024));
    }

    #[test]
    fn load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "chunk_size": 65536 }}"#).unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.chunk_size, 65536);
        assert_eq!(cfg.large_alloc_threshold, 16384);

        let raw = read_config(file.path()).unwrap();
        assert_eq!(raw.large_alloc_threshold, 0);
    }

    #[test]
    fn explicit_threshold_is_kept() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "chunk_size": 65536, "large_alloc_threshold": 512 }}"#).unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.large_alloc_threshold, 512);
    }

    #[test]
    fn load_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            load_config(&missing),
            Err(ConfigError::Read { .. })
        ));
    }
}
