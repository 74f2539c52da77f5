//! Source resolution: turn a tool source into a PDF path on disk

use crate::error::{Error, Result};
use crate::source::CacheManager;
use base64::Engine;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A PDF ready for extraction.
///
/// Uploaded bytes are materialized to a temporary file that is deleted when
/// this value is dropped.
pub struct ResolvedPdf {
    pub path: PathBuf,
    pub source_name: String,
    _upload: Option<NamedTempFile>,
}

/// Resolve a file path. Existence and format checks are left to the extractor.
pub fn resolve_path<P: AsRef<Path>>(path: P) -> ResolvedPdf {
    let path = path.as_ref();
    ResolvedPdf {
        path: path.to_path_buf(),
        source_name: path.display().to_string(),
        _upload: None,
    }
}

/// Write uploaded bytes to a temporary `.pdf` file
pub fn materialize_upload(data: &[u8], source_name: String) -> Result<ResolvedPdf> {
    let mut file = tempfile::Builder::new()
        .prefix("deep-pdf-upload-")
        .suffix(".pdf")
        .tempfile()?;
    file.write_all(data)?;
    file.flush()?;

    Ok(ResolvedPdf {
        path: file.path().to_path_buf(),
        source_name,
        _upload: Some(file),
    })
}

/// Resolve base64 encoded upload data
pub fn resolve_base64(base64_data: &str) -> Result<ResolvedPdf> {
    let engine = base64::engine::general_purpose::STANDARD;
    let data = engine.decode(base64_data.trim())?;
    materialize_upload(&data, "<base64>".to_string())
}

/// Resolve a cache key to a previously uploaded document
pub fn resolve_cache(cache_key: &str, cache: &CacheManager) -> Result<ResolvedPdf> {
    let entry = cache.get(cache_key).ok_or_else(|| Error::CacheKeyNotFound {
        key: cache_key.to_string(),
    })?;

    materialize_upload(&entry.pdf, format!("<cache:{}>", cache_key))
}
