//! Extractor configuration

use crate::error::{Error, Result};
use crate::pdf::TableSettings;
use std::path::Path;
use std::time::Duration;

/// Default vision-capable model
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default rendering resolution in DPI
pub const DEFAULT_RESOLUTION: u32 = 400;

/// Default chat completions endpoint base
pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Default JPEG quality for rendered pages sent to the model
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// File extensions accepted by the extractor (compared case-insensitively)
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf"];

/// Check whether a path has a supported extension
pub fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Construction-time configuration for the table extractor.
///
/// Read-only once an extractor has been built from it.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// API credential; falls back to `OPENAI_API_KEY` when unset
    pub api_key: Option<String>,
    /// Rendering resolution in DPI for table pages
    pub resolution: u32,
    /// Model identifier sent with every request
    pub model: String,
    /// Base URL of the chat completions API
    pub api_base_url: String,
    /// Timeout for a single model request
    pub request_timeout: Duration,
    /// JPEG quality (1-100) used when encoding rendered pages
    pub jpeg_quality: u8,
    /// Structural table detection settings
    pub table_settings: TableSettings,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            resolution: DEFAULT_RESOLUTION,
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(120),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            table_settings: TableSettings::default(),
        }
    }
}

impl ExtractorConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_table_settings(mut self, settings: TableSettings) -> Self {
        self.table_settings = settings;
        self
    }

    /// Build a config from environment variables, keeping defaults for unset ones.
    ///
    /// Reads `OPENAI_API_KEY`, `DEEP_PDF_MODEL`, `DEEP_PDF_RESOLUTION` and
    /// `DEEP_PDF_API_BASE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            config.api_key = Some(key);
        }
        if let Some(model) = lookup("DEEP_PDF_MODEL").filter(|m| !m.is_empty()) {
            config.model = model;
        }
        if let Some(resolution) = lookup("DEEP_PDF_RESOLUTION") {
            config.resolution = resolution.trim().parse().map_err(|_| Error::Config {
                reason: format!("DEEP_PDF_RESOLUTION must be an integer, got {:?}", resolution),
            })?;
        }
        if let Some(base) = lookup("DEEP_PDF_API_BASE").filter(|b| !b.is_empty()) {
            config.api_base_url = base;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the renderer or encoder cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 || self.resolution > 1200 {
            return Err(Error::Config {
                reason: format!(
                    "resolution must be between 1 and 1200 DPI, got {}",
                    self.resolution
                ),
            });
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(Error::Config {
                reason: format!(
                    "jpeg_quality must be between 1 and 100, got {}",
                    self.jpeg_quality
                ),
            });
        }
        if self.model.trim().is_empty() {
            return Err(Error::Config {
                reason: "model must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
