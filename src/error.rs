//! Error types for Deep PDF

use thiserror::Error;

/// Result type alias for Deep PDF
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Deep PDF
#[derive(Error, Debug)]
pub enum Error {
    /// Input file type is not in the supported allow-list
    #[error("Unsupported input file: {path}")]
    InvalidInput { path: String },

    /// File could not be opened or parsed as a PDF
    #[error("Failed to open PDF: {reason}")]
    DocumentOpen { reason: String },

    /// The vision model request failed or returned an unusable response
    #[error("Model request failed: {reason}")]
    ModelRequest { reason: String },

    /// PDFium error (library binding, page access, rendering)
    #[error("PDFium error: {reason}")]
    Pdfium { reason: String },

    /// Invalid configuration value
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// Page out of bounds
    #[error("Page {page} out of bounds (total: {total})")]
    PageOutOfBounds { page: u32, total: u32 },

    /// Cache key not found
    #[error("Cache key not found: {key}")]
    CacheKeyNotFound { key: String },

    /// Cached document has no extraction report yet
    #[error("No extraction report cached for key: {key}")]
    NoCachedReport { key: String },

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// Base64 decode error
    #[error("Invalid base64 data: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, library errors, response bodies) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::InvalidInput { .. } => "Unsupported file type (expected .pdf)".to_string(),
            Error::DocumentOpen { .. } => "Could not open PDF file".to_string(),
            Error::ModelRequest { .. } => "Table extraction model request failed".to_string(),
            Error::Pdfium { .. } => "PDF processing error".to_string(),
            Error::Config { reason } => format!("Invalid configuration: {}", reason),
            Error::PageOutOfBounds { page, total } => {
                format!("Page {} out of bounds (total: {})", page, total)
            }
            Error::CacheKeyNotFound { .. } => "Cache key not found".to_string(),
            Error::NoCachedReport { .. } => {
                "No extraction report for this cache key; run extract_tables first".to_string()
            }
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::Base64Decode(_) => "Invalid base64 data".to_string(),
            Error::Io(_) => "I/O error".to_string(),
            Error::Serialization(_) => "Serialization error".to_string(),
        }
    }

    /// Whether retrying the same call could succeed.
    ///
    /// Only model request failures are transient; the core itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ModelRequest { .. })
    }
}
