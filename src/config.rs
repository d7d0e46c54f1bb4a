//! Viewer configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::layout::LayoutStrategy;

const DEFAULT_TILE_SIZE: u32 = 256;
const DEFAULT_MAX_CACHE_BYTES: usize = 64 * 1024 * 1024;
const DEFAULT_MAX_CONCURRENT_RENDERS: usize = 2;
const DEFAULT_SPACING: f32 = 8.0;
const DEFAULT_RENDER_TIMEOUT_MS: u64 = 500;
const DEFAULT_ERROR_TTL_MS: u64 = 2000;

/// Configuration errors, all surfaced at configuration time
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "max_cache_bytes {max_cache_bytes} cannot hold a single {tile_size}px tile ({needed} bytes)"
    )]
    CacheCapacityExceeded {
        tile_size: u32,
        needed: usize,
        max_cache_bytes: usize,
    },

    #[error("invalid {field}: {detail}")]
    InvalidValue {
        field: &'static str,
        detail: String,
    },

    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Runtime-settable viewer configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Tile edge length in pixels
    pub tile_size: u32,
    /// Cache budget over total pixel-buffer bytes
    pub max_cache_bytes: usize,
    /// In-flight render bound; the pool keeps one spare thread so a
    /// render past the soft timeout does not pin it
    pub max_concurrent_renders: usize,
    pub layout_strategy: LayoutStrategy,
    /// Gap between pages in document units
    pub spacing: f32,
    /// Soft timeout after which a slow render stops blocking the
    /// dispatch window
    pub render_timeout_ms: u64,
    /// How long a failed render is cached before a retry may dispatch
    pub error_ttl_ms: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            max_cache_bytes: DEFAULT_MAX_CACHE_BYTES,
            max_concurrent_renders: DEFAULT_MAX_CONCURRENT_RENDERS,
            layout_strategy: LayoutStrategy::default(),
            spacing: DEFAULT_SPACING,
            render_timeout_ms: DEFAULT_RENDER_TIMEOUT_MS,
            error_ttl_ms: DEFAULT_ERROR_TTL_MS,
        }
    }
}

impl ViewerConfig {
    /// Worst-case bytes for one RGB tile
    #[must_use]
    pub fn tile_bytes(&self) -> usize {
        self.tile_size as usize * self.tile_size as usize * 3
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tile_size",
                detail: "must be positive".into(),
            });
        }
        if self.max_concurrent_renders == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_concurrent_renders",
                detail: "must be at least 1".into(),
            });
        }
        if !self.spacing.is_finite() || self.spacing < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "spacing",
                detail: format!("{} is not a finite non-negative value", self.spacing),
            });
        }
        if self.tile_bytes() > self.max_cache_bytes {
            return Err(ConfigError::CacheCapacityExceeded {
                tile_size: self.tile_size,
                needed: self.tile_bytes(),
                max_cache_bytes: self.max_cache_bytes,
            });
        }
        Ok(())
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        assert!(ViewerConfig::default().validate().is_ok());
    }

    #[test]
    fn undersized_cache_is_a_config_error() {
        let config = ViewerConfig {
            tile_size: 256,
            max_cache_bytes: 1024,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CacheCapacityExceeded { needed, .. }) if needed == 256 * 256 * 3
        ));
    }

    #[test]
    fn zero_workers_rejected() {
        let config = ViewerConfig {
            max_concurrent_renders: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "max_concurrent_renders", .. })
        ));
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config = ViewerConfig::from_toml_str(
            r#"
            tile_size = 512
            spacing = 12.5

            [layout_strategy.facing_pages]
            cover_offset = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.tile_size, 512);
        assert_eq!(config.spacing, 12.5);
        assert_eq!(
            config.layout_strategy,
            crate::layout::LayoutStrategy::FacingPages { cover_offset: 1 }
        );
        assert_eq!(config.max_cache_bytes, DEFAULT_MAX_CACHE_BYTES);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_cache_bytes = 10000000").unwrap();

        let config = ViewerConfig::load(file.path()).unwrap();
        assert_eq!(config.max_cache_bytes, 10_000_000);
    }

    #[test]
    fn unit_strategies_parse_from_strings() {
        let config = ViewerConfig::from_toml_str(r#"layout_strategy = "single_page""#).unwrap();
        assert_eq!(
            config.layout_strategy,
            crate::layout::LayoutStrategy::SinglePage
        );
    }
}
