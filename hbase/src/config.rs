//! Configuration options for HBase client operations.
//!
//! This module defines [`ClientConfig`], the serializable client settings, and
//! [`ScanOptions`], the per-scan options accepted by
//! [`Client::scan_with_options`](crate::Client::scan_with_options).

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default number of rows fetched per scan batch.
pub const DEFAULT_SCAN_CACHE_SIZE: u32 = 100;

/// Client configuration.
///
/// Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Rows requested per scan batch when [`ScanOptions::cache_size`] is unset.
    ///
    /// Larger values trade memory for fewer round trips. Must be positive.
    pub scan_cache_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            scan_cache_size: DEFAULT_SCAN_CACHE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Checks that every setting is usable.
    pub fn validate(&self) -> Result<()> {
        validate_cache_size(self.scan_cache_size)
    }
}

/// Options for scan operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Rows requested per batch. Falls back to
    /// [`ClientConfig::scan_cache_size`] when `None`.
    pub cache_size: Option<u32>,

    /// First row of the scan, inclusive. Scans from the table start when `None`.
    pub start_row: Option<Bytes>,

    /// Row at which the scan stops, exclusive. Scans to the table end when `None`.
    pub stop_row: Option<Bytes>,
}

impl ScanOptions {
    pub fn with_cache_size(mut self, cache_size: u32) -> Self {
        self.cache_size = Some(cache_size);
        self
    }

    pub fn with_start_row(mut self, row: impl AsRef<[u8]>) -> Self {
        self.start_row = Some(Bytes::copy_from_slice(row.as_ref()));
        self
    }

    pub fn with_stop_row(mut self, row: impl AsRef<[u8]>) -> Self {
        self.stop_row = Some(Bytes::copy_from_slice(row.as_ref()));
        self
    }
}

pub(crate) fn validate_cache_size(cache_size: u32) -> Result<()> {
    if cache_size == 0 {
        return Err(Error::InvalidInput(
            "scan cache size must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_fill_missing_fields_with_defaults() {
        // given
        let json = "{}";

        // when
        let config: ClientConfig = serde_json::from_str(json).unwrap();

        // then
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.scan_cache_size, DEFAULT_SCAN_CACHE_SIZE);
    }

    #[test]
    fn should_deserialize_scan_cache_size() {
        let config: ClientConfig = serde_json::from_str(r#"{"scan_cache_size": 500}"#).unwrap();

        assert_eq!(config.scan_cache_size, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_reject_zero_cache_size() {
        let config = ClientConfig { scan_cache_size: 0 };

        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn should_build_scan_options() {
        let options = ScanOptions::default()
            .with_cache_size(10)
            .with_start_row("a")
            .with_stop_row("m");

        assert_eq!(options.cache_size, Some(10));
        assert_eq!(options.start_row, Some(Bytes::from("a")));
        assert_eq!(options.stop_row, Some(Bytes::from("m")));
    }
}
