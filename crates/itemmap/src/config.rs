//! Bitmap and check configuration.
//!
//! Both structs deserialize from JSON with every field optional; missing
//! fields take the defaults for 8 KiB pages.

use std::path::Path;

use itemmap_error::{ItemMapError, Result};
use serde::{Deserialize, Serialize};

use crate::diagnostics::BitmapFormat;
use crate::growth::{DEFAULT_GROWTH_CHUNK_BYTES, DEFAULT_MAX_ITEMS_PER_PAGE};

/// Item bound and growth step of an [`ItemBitmap`](crate::ItemBitmap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitmapConfig {
    /// Largest item count a single page may register.
    pub max_items_per_page: u32,
    /// Capacity growth step in bytes.
    pub growth_chunk_bytes: usize,
}

impl Default for BitmapConfig {
    fn default() -> Self {
        Self {
            max_items_per_page: DEFAULT_MAX_ITEMS_PER_PAGE,
            growth_chunk_bytes: DEFAULT_GROWTH_CHUNK_BYTES,
        }
    }
}

impl BitmapConfig {
    /// Reject settings under which a single page could outgrow one chunk.
    pub fn validate(&self) -> Result<()> {
        if self.growth_chunk_bytes == 0 {
            return Err(ItemMapError::config("growth_chunk_bytes must be positive"));
        }
        if self.max_items_per_page as usize > self.growth_chunk_bytes * 8 {
            return Err(ItemMapError::config(format!(
                "growth_chunk_bytes {} cannot hold {} items of one page",
                self.growth_chunk_bytes, self.max_items_per_page
            )));
        }
        Ok(())
    }
}

/// Settings of a heap/index check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// How bitmaps are dumped to the diagnostic sink.
    pub format: BitmapFormat,
    pub bitmap: BitmapConfig,
}

impl CheckConfig {
    /// Load and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|error| match error.kind() {
            std::io::ErrorKind::NotFound => ItemMapError::CannotOpen {
                path: path.to_path_buf(),
            },
            _ => ItemMapError::Io(error),
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|error| ItemMapError::InvalidJson {
                path: path.to_path_buf(),
                detail: error.to_string(),
            })?;
        config.bitmap.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_8k_pages() {
        let config = BitmapConfig::default();
        assert_eq!(config.max_items_per_page, 291);
        assert_eq!(config.growth_chunk_bytes, 1024);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn validate_rejects_tiny_chunks() {
        let config = BitmapConfig {
            max_items_per_page: 291,
            growth_chunk_bytes: 16,
        };
        assert!(matches!(
            config.validate(),
            Err(ItemMapError::InvalidConfig { .. })
        ));
        let zero = BitmapConfig {
            max_items_per_page: 0,
            growth_chunk_bytes: 0,
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: CheckConfig =
            serde_json::from_str(r#"{"format":"hex","bitmap":{"max_items_per_page":1169}}"#)
                .expect("config parses");
        assert_eq!(config.format, BitmapFormat::Hex);
        assert_eq!(config.bitmap.max_items_per_page, 1169);
        assert_eq!(config.bitmap.growth_chunk_bytes, 1024);

        let empty: CheckConfig = serde_json::from_str("{}").expect("empty config parses");
        assert_eq!(empty, CheckConfig::default());
    }

    #[test]
    fn from_json_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("check.json");
        std::fs::write(&path, r#"{"format":"base64"}"#).expect("write config");
        let config = CheckConfig::from_json_file(&path).expect("config loads");
        assert_eq!(config.format, BitmapFormat::Base64);

        let missing = CheckConfig::from_json_file(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ItemMapError::CannotOpen { .. })));

        std::fs::write(&path, "{not json").expect("write config");
        let bad = CheckConfig::from_json_file(&path);
        assert!(matches!(bad, Err(ItemMapError::InvalidJson { .. })));
    }
}
