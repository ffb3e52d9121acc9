use std::path::PathBuf;

use thiserror::Error;

/// Error type for recoverable itemmap failures.
///
/// Bit-level bounds violations are not represented here: they are reported
/// through diagnostic sinks and surface as `false` / error counts. This type
/// covers the paths that touch files or decode external bytes.
#[derive(Error, Debug)]
pub enum ItemMapError {
    // === I/O Errors ===
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cannot open an input file.
    #[error("unable to open file: '{path}'")]
    CannotOpen { path: PathBuf },

    /// Short read (fewer bytes than expected).
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    // === Format Errors ===
    /// A persisted bitmap violates its own invariants.
    #[error("bitmap image is malformed: {detail}")]
    CorruptBitmap { detail: String },

    /// A JSON document (config or page fixture) failed to parse.
    #[error("invalid JSON in '{path}': {detail}")]
    InvalidJson { path: PathBuf, detail: String },

    /// A page fixture does not fit the configured bounds.
    #[error("invalid fixture: {detail}")]
    InvalidFixture { detail: String },

    /// Invalid configuration value.
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },
}

impl ItemMapError {
    /// Create a corrupt-bitmap error.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::CorruptBitmap {
            detail: detail.into(),
        }
    }

    /// Create an invalid-fixture error.
    pub fn fixture(detail: impl Into<String>) -> Self {
        Self::InvalidFixture {
            detail: detail.into(),
        }
    }

    /// Create an invalid-configuration error.
    pub fn config(detail: impl Into<String>) -> Self {
        Self::InvalidConfig {
            detail: detail.into(),
        }
    }

    /// Whether the error stems from malformed input rather than the
    /// environment.
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::ShortRead { .. }
                | Self::CorruptBitmap { .. }
                | Self::InvalidJson { .. }
                | Self::InvalidFixture { .. }
                | Self::InvalidConfig { .. }
        )
    }
}

/// Result type alias using `ItemMapError`.
pub type Result<T> = std::result::Result<T, ItemMapError>;
