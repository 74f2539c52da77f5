//! MCP server exposing table-aware extraction as tools

use crate::config::{is_supported_extension, ExtractorConfig};
use crate::error::Error;
use crate::extractor::{DocumentExtractor, ExtractionRecord, ExtractionReport, TableExtractor};
use crate::pdf::{read_pdf_bytes, render_page_preview};
use crate::source::{
    resolve_base64, resolve_cache, resolve_path, CacheManager, CachedDocument, ResolvedPdf,
};
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Where a tool reads its PDF from
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the PDF file
        path: String,
    },
    /// Uploaded PDF, base64 encoded
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
    },
    /// Reference to a cached upload
    CacheRef {
        /// Cache key from a previous extract_tables call
        cache_key: String,
    },
}

const SOURCE_KEYS: [&str; 3] = ["path", "base64", "cache_key"];

impl<'de> serde::Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let Some(obj) = value.as_object() else {
            return Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\", \"base64\", or \"cache_key\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )));
        };

        for key in SOURCE_KEYS {
            let Some(v) = obj.get(key) else {
                continue;
            };
            let Some(s) = v.as_str() else {
                return Err(serde::de::Error::custom(format!(
                    "\"{}\" must be a string",
                    key
                )));
            };
            let s = s.to_string();
            return Ok(match key {
                "path" => PdfSource::Path { path: s },
                "base64" => PdfSource::Base64 { base64: s },
                _ => PdfSource::CacheRef { cache_key: s },
            });
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(serde::de::Error::custom(format!(
            "Invalid source: expected an object with one of \"path\", \"base64\", or \"cache_key\", but got keys: {:?}",
            keys
        )))
    }
}

/// Server configuration: extraction settings plus resource limits
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Settings passed to every extraction
    pub extractor: ExtractorConfig,
    /// Directories file paths must stay inside; empty allows any path
    pub resource_dirs: Vec<String>,
    /// Maximum total PDF bytes in cache (default: 512MB)
    pub cache_max_bytes: usize,
    /// Maximum number of cache entries (default: 100)
    pub cache_max_entries: usize,
    /// Upper bound for preview width in pixels (default: 4096)
    pub max_preview_width: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            extractor: ExtractorConfig::default(),
            resource_dirs: Vec::new(),
            cache_max_bytes: 512 * 1024 * 1024, // 512MB
            cache_max_entries: 100,
            max_preview_width: 4096,
        }
    }
}

impl ServerConfig {
    /// Read extractor settings and `DEEP_PDF_RESOURCE_DIRS` (a path list) from the environment
    pub fn from_env() -> crate::error::Result<Self> {
        let resource_dirs = std::env::var_os("DEEP_PDF_RESOURCE_DIRS")
            .map(|dirs| {
                std::env::split_paths(&dirs)
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            extractor: ExtractorConfig::from_env()?,
            resource_dirs,
            ..Self::default()
        })
    }
}

/// Deep PDF MCP server
#[derive(Clone)]
pub struct DeepPdfServer {
    cache: Arc<CacheManager>,
    tool_router: ToolRouter<Self>,
    config: Arc<ServerConfig>,
}

// ============================================================================
// Request/Response types for extract_tables
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractTablesParams {
    /// PDF to extract: {"path"}, {"base64"} or {"cache_key"}
    pub source: PdfSource,
    /// Also write the report JSON to this file
    #[serde(default)]
    pub output_path: Option<String>,
    /// Keep the document and its report in the cache for paging and preview
    #[serde(default)]
    pub cache: bool,
}

#[derive(Debug, Serialize)]
pub struct ExtractTablesResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ExtractionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for get_extraction_page
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetExtractionPageParams {
    /// Cache key returned by extract_tables
    pub cache_key: String,
    /// Page number (1-indexed)
    pub page: u32,
}

#[derive(Debug, Serialize)]
pub struct GetExtractionPageResult {
    pub cache_key: String,
    pub total_pages: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ExtractionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for render_page_preview
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RenderPagePreviewParams {
    /// Cache key returned by extract_tables
    pub cache_key: String,
    /// Page number (1-indexed)
    pub page: u32,
    /// Image width in pixels (default: 1200)
    #[serde(default = "default_preview_width")]
    pub width: u32,
}

fn default_preview_width() -> u32 {
    1200
}

#[derive(Debug, Serialize)]
pub struct RenderPagePreviewResult {
    pub cache_key: String,
    pub page: u32,
    pub width: u32,
    pub height: u32,
    pub data_base64: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RenderPagePreviewResult {
    fn failed(cache_key: String, page: u32, error: &Error) -> Self {
        Self {
            cache_key,
            page,
            width: 0,
            height: 0,
            data_base64: String::new(),
            mime_type: String::new(),
            error: Some(error.client_message()),
        }
    }
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl DeepPdfServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let cache = CacheManager::new(config.cache_max_entries, config.cache_max_bytes);
        Self {
            cache: Arc::new(cache),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Extract every page of a PDF, sending table pages to the vision model
    #[tool(
        description = "Extract a PDF page by page. Pages with ruled tables are rendered and transcribed to JSON by a vision model; other pages return their text. Returns a report with one record per page.

Source format: one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}. Set cache=true to page through the result or preview pages afterwards."
    )]
    async fn extract_tables(&self, Parameters(params): Parameters<ExtractTablesParams>) -> String {
        let result = self.process_extract_tables(&params).await;
        serde_json::to_string_pretty(&result).unwrap_or_default()
    }

    /// Return one record of a cached extraction report
    #[tool(
        description = "Get the extraction record of one page from a cached extract_tables report, together with the total page count."
    )]
    async fn get_extraction_page(
        &self,
        Parameters(params): Parameters<GetExtractionPageParams>,
    ) -> String {
        let result = self
            .process_get_extraction_page(&params)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "get_extraction_page failed");
                GetExtractionPageResult {
                    cache_key: params.cache_key.clone(),
                    total_pages: 0,
                    record: None,
                    error: Some(e.client_message()),
                }
            });
        serde_json::to_string_pretty(&result).unwrap_or_default()
    }

    /// Render a page of a cached document for preview
    #[tool(
        description = "Render one page of a cached PDF as a base64 PNG image, for viewing next to its extraction record. Width defaults to 1200 pixels."
    )]
    async fn render_page_preview(
        &self,
        Parameters(params): Parameters<RenderPagePreviewParams>,
    ) -> String {
        let result = self
            .process_render_page_preview(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "render_page_preview failed");
                RenderPagePreviewResult::failed(params.cache_key.clone(), params.page, &e)
            });
        serde_json::to_string_pretty(&result).unwrap_or_default()
    }

    fn source_name(source: &PdfSource) -> String {
        match source {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Base64 { .. } => "<base64>".to_string(),
            PdfSource::CacheRef { cache_key } => format!("<cache:{}>", cache_key),
        }
    }

    fn resolve_source(&self, source: &PdfSource) -> crate::error::Result<ResolvedPdf> {
        match source {
            PdfSource::Path { path } => {
                let path = self.validate_path_access(path)?;
                Ok(resolve_path(path))
            }
            PdfSource::Base64 { base64 } => resolve_base64(base64),
            PdfSource::CacheRef { cache_key } => resolve_cache(cache_key, &self.cache),
        }
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| Error::PathAccessDenied {
            path: path.to_string(),
        })?;

        if self.within_resource_dirs(&canonical) {
            Ok(canonical)
        } else {
            Err(Error::PathAccessDenied {
                path: path.to_string(),
            })
        }
    }

    /// Validate an output path. The parent directory is canonicalized since
    /// the file itself may not exist yet.
    fn validate_output_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let path_obj = Path::new(path);
        let parent = path_obj
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let canonical_parent =
            std::fs::canonicalize(parent).map_err(|_| Error::PathAccessDenied {
                path: path.to_string(),
            })?;
        let canonical_target =
            canonical_parent.join(path_obj.file_name().unwrap_or(std::ffi::OsStr::new("")));

        if self.within_resource_dirs(&canonical_target) {
            Ok(canonical_target)
        } else {
            Err(Error::PathAccessDenied {
                path: path.to_string(),
            })
        }
    }

    fn within_resource_dirs(&self, canonical: &Path) -> bool {
        self.config.resource_dirs.iter().any(|dir| {
            std::fs::canonicalize(dir)
                .map(|canonical_dir| canonical.starts_with(canonical_dir))
                .unwrap_or(false)
        })
    }

    /// Write the report artifact, with sandbox validation
    fn write_output(&self, path_str: &str, data: &[u8]) -> crate::error::Result<String> {
        let path = self.validate_output_path_access(path_str)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(&path, data)?;
        Ok(path_str.to_string())
    }

    /// Store the document bytes before extraction so a failed run can be
    /// retried by cache key without re-uploading.
    ///
    /// Returns `None` when the document exceeds the cache budget.
    fn cache_document(
        &self,
        source: &PdfSource,
        resolved: &ResolvedPdf,
    ) -> crate::error::Result<Option<String>> {
        if let PdfSource::CacheRef { cache_key } = source {
            return Ok(Some(cache_key.clone()));
        }

        if !is_supported_extension(&resolved.path) {
            return Err(Error::InvalidInput {
                path: resolved.source_name.clone(),
            });
        }

        let data = read_pdf_bytes(&resolved.path)?;
        let bytes = data.len();
        let key = self.cache.generate_unique_key();
        if !self.cache.put(key.clone(), CachedDocument::new(data, None)) {
            tracing::warn!(source = %resolved.source_name, bytes, "Document exceeds cache budget, not cached");
            return Ok(None);
        }
        Ok(Some(key))
    }

    async fn process_extract_tables(&self, params: &ExtractTablesParams) -> ExtractTablesResult {
        let mut result = ExtractTablesResult {
            source: Self::source_name(&params.source),
            cache_key: None,
            output_path: None,
            report: None,
            error: None,
        };

        let outcome = async {
            let resolved = self.resolve_source(&params.source)?;
            if params.cache {
                result.cache_key = self.cache_document(&params.source, &resolved)?;
            }

            let report = self.run_extraction(resolved).await?;

            if let Some(key) = &result.cache_key {
                if let Some(entry) = self.cache.get(key) {
                    self.cache.put(
                        key.clone(),
                        CachedDocument::new(entry.pdf.clone(), Some(report.clone())),
                    );
                }
            }

            if let Some(output_path) = &params.output_path {
                let json = serde_json::to_vec_pretty(&report)?;
                result.output_path = Some(self.write_output(output_path, &json)?);
            }

            Ok::<_, Error>(report)
        }
        .await;

        match outcome {
            Ok(report) => {
                tracing::info!(
                    source = %result.source,
                    pages = report.total_pages,
                    table_pages = report.table_page_count(),
                    seconds = report.metadata.extraction_time,
                    "Extraction finished"
                );
                result.report = Some(report);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    source = %result.source,
                    retryable = e.is_retryable(),
                    "extract_tables failed"
                );
                result.error = Some(e.client_message());
            }
        }

        result
    }

    /// Run the extractor on a blocking thread; an upload's temporary file is
    /// removed when the task finishes
    async fn run_extraction(&self, resolved: ResolvedPdf) -> crate::error::Result<ExtractionReport> {
        let config = self.config.extractor.clone();

        tokio::task::spawn_blocking(move || {
            let extractor = TableExtractor::new(config)?;
            let started = Instant::now();
            let extraction = extractor.extract(&resolved.path)?;
            Ok::<_, Error>(ExtractionReport::new(extraction, started.elapsed()))
        })
        .await
        .map_err(|e| Error::Pdfium {
            reason: format!("Task join error: {}", e),
        })?
    }

    fn process_get_extraction_page(
        &self,
        params: &GetExtractionPageParams,
    ) -> crate::error::Result<GetExtractionPageResult> {
        let entry = self
            .cache
            .get(&params.cache_key)
            .ok_or_else(|| Error::CacheKeyNotFound {
                key: params.cache_key.clone(),
            })?;
        let report = entry.report.as_ref().ok_or_else(|| Error::NoCachedReport {
            key: params.cache_key.clone(),
        })?;

        let record = params
            .page
            .checked_sub(1)
            .and_then(|index| report.pages.get(index as usize))
            .ok_or(Error::PageOutOfBounds {
                page: params.page,
                total: report.total_pages,
            })?;

        Ok(GetExtractionPageResult {
            cache_key: params.cache_key.clone(),
            total_pages: report.total_pages,
            record: Some(record.clone()),
            error: None,
        })
    }

    async fn process_render_page_preview(
        &self,
        params: &RenderPagePreviewParams,
    ) -> crate::error::Result<RenderPagePreviewResult> {
        let entry = self
            .cache
            .get(&params.cache_key)
            .ok_or_else(|| Error::CacheKeyNotFound {
                key: params.cache_key.clone(),
            })?;

        let width = params
            .width
            .clamp(1, self.config.max_preview_width)
            .min(u16::MAX as u32) as u16;
        let page = params.page;

        let rendered =
            tokio::task::spawn_blocking(move || render_page_preview(&entry.pdf, page, width))
                .await
                .map_err(|e| Error::Pdfium {
                    reason: format!("Task join error: {}", e),
                })??;

        Ok(RenderPagePreviewResult {
            cache_key: params.cache_key.clone(),
            page: rendered.page,
            width: rendered.width,
            height: rendered.height,
            data_base64: rendered.data_base64,
            mime_type: rendered.mime_type,
            error: None,
        })
    }
}

impl Default for DeepPdfServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for DeepPdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Deep PDF extracts PDFs page by page. Pages containing ruled tables are \
                 transcribed to JSON by a vision model, other pages return their text. \
                 Use extract_tables with cache=true, then get_extraction_page and \
                 render_page_preview to review results page by page."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with configuration read from the environment
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::from_env()?).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    tracing::info!(
        model = %config.extractor.model,
        resolution = config.extractor.resolution,
        resource_dirs = config.resource_dirs.len(),
        "Deep PDF server ready, waiting for connections..."
    );

    let server = DeepPdfServer::with_config(config);
    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{ExtractionResult, PageExtraction};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn test_server() -> DeepPdfServer {
        DeepPdfServer::with_config(ServerConfig {
            extractor: ExtractorConfig::default().with_api_key("sk-test"),
            ..ServerConfig::default()
        })
    }

    fn sample_report() -> ExtractionReport {
        let result: ExtractionResult = serde_json::from_value(json!([
            {"page_number": 1, "extraction_type": "table", "content": "{\"rows\": [[\"a\", \"1\"]]}"},
            {"page_number": 2, "extraction_type": "text", "content": "Summary"}
        ]))
        .unwrap();
        ExtractionReport::new(result, Duration::from_millis(1500))
    }

    #[test]
    fn test_source_name() {
        assert_eq!(
            DeepPdfServer::source_name(&PdfSource::Path {
                path: "/test.pdf".to_string()
            }),
            "/test.pdf"
        );
        assert_eq!(
            DeepPdfServer::source_name(&PdfSource::Base64 {
                base64: "...".to_string()
            }),
            "<base64>"
        );
        assert_eq!(
            DeepPdfServer::source_name(&PdfSource::CacheRef {
                cache_key: "abc123".to_string()
            }),
            "<cache:abc123>"
        );
    }

    #[test]
    fn test_pdf_source_deserialization() {
        let source: PdfSource = serde_json::from_str(r#"{"path": "/test.pdf"}"#).unwrap();
        assert!(matches!(source, PdfSource::Path { .. }));

        let source: PdfSource = serde_json::from_str(r#"{"base64": "JVBERi0xLjQ="}"#).unwrap();
        assert!(matches!(source, PdfSource::Base64 { .. }));

        let source: PdfSource = serde_json::from_str(r#"{"cache_key": "abc123"}"#).unwrap();
        assert!(matches!(source, PdfSource::CacheRef { .. }));
    }

    #[test]
    fn test_pdf_source_deserialization_errors() {
        let err = serde_json::from_str::<PdfSource>(r#"{"url": "https://x/y.pdf"}"#).unwrap_err();
        assert!(err.to_string().contains("got keys"));

        let err = serde_json::from_str::<PdfSource>(r#"{"path": 42}"#).unwrap_err();
        assert!(err.to_string().contains("\"path\" must be a string"));

        let err = serde_json::from_str::<PdfSource>(r#""/test.pdf""#).unwrap_err();
        assert!(err.to_string().contains("a string"));
    }

    #[test]
    fn test_params_defaults() {
        let params: ExtractTablesParams =
            serde_json::from_str(r#"{"source": {"path": "/test.pdf"}}"#).unwrap();
        assert!(!params.cache);
        assert!(params.output_path.is_none());

        let params: RenderPagePreviewParams =
            serde_json::from_str(r#"{"cache_key": "k", "page": 2}"#).unwrap();
        assert_eq!(params.width, 1200);
    }

    #[tokio::test]
    async fn test_extract_tables_rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.docx");
        std::fs::write(&path, b"PK\x03\x04").unwrap();

        let params = ExtractTablesParams {
            source: PdfSource::Path {
                path: path.to_string_lossy().to_string(),
            },
            output_path: None,
            cache: false,
        };
        let result = test_server().process_extract_tables(&params).await;

        assert!(result.report.is_none());
        assert_eq!(
            result.error.as_deref(),
            Some("Unsupported file type (expected .pdf)")
        );
    }

    #[tokio::test]
    async fn test_extract_tables_corrupted_upload() {
        // "not a pdf"
        let params = ExtractTablesParams {
            source: PdfSource::Base64 {
                base64: "bm90IGEgcGRm".to_string(),
            },
            output_path: None,
            cache: false,
        };
        let result = test_server().process_extract_tables(&params).await;

        assert_eq!(result.source, "<base64>");
        assert_eq!(result.error.as_deref(), Some("Could not open PDF file"));
    }

    fn truncated_upload() -> ExtractTablesParams {
        // "%PDF-1.7\n1 0 obj\n<< /Type /Catalog"
        ExtractTablesParams {
            source: PdfSource::Base64 {
                base64: "JVBERi0xLjcKMSAwIG9iago8PCAvVHlwZSAvQ2F0YWxvZw==".to_string(),
            },
            output_path: None,
            cache: true,
        }
    }

    #[tokio::test]
    async fn test_extract_tables_caches_before_extraction() {
        let server = test_server();
        let result = server.process_extract_tables(&truncated_upload()).await;

        assert_eq!(result.error.as_deref(), Some("Could not open PDF file"));
        let key = result.cache_key.unwrap();
        assert!(server.cache.contains(&key));
    }

    #[tokio::test]
    async fn test_extract_tables_no_cache_key_when_over_budget() {
        let server = DeepPdfServer::with_config(ServerConfig {
            extractor: ExtractorConfig::default().with_api_key("sk-test"),
            cache_max_bytes: 8,
            ..ServerConfig::default()
        });
        let result = server.process_extract_tables(&truncated_upload()).await;

        assert!(result.cache_key.is_none());
        assert!(server.cache.is_empty());
        assert_eq!(result.error.as_deref(), Some("Could not open PDF file"));
    }

    #[tokio::test]
    async fn test_extract_tables_unknown_cache_key() {
        let params = ExtractTablesParams {
            source: PdfSource::CacheRef {
                cache_key: "missing".to_string(),
            },
            output_path: None,
            cache: true,
        };
        let result = test_server().process_extract_tables(&params).await;

        assert!(result.cache_key.is_none());
        assert_eq!(result.error.as_deref(), Some("Cache key not found"));
    }

    #[tokio::test]
    async fn test_extract_tables_path_outside_resource_dirs() {
        let allowed = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let path = other.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();

        let server = DeepPdfServer::with_config(ServerConfig {
            resource_dirs: vec![allowed.path().to_string_lossy().to_string()],
            ..ServerConfig::default()
        });
        let params = ExtractTablesParams {
            source: PdfSource::Path {
                path: path.to_string_lossy().to_string(),
            },
            output_path: None,
            cache: false,
        };
        let result = server.process_extract_tables(&params).await;

        assert_eq!(result.error.as_deref(), Some("Access denied"));
    }

    #[test]
    fn test_get_extraction_page() {
        let server = test_server();
        server.cache.put(
            "k1".to_string(),
            CachedDocument::new(b"%PDF-1.7".to_vec(), Some(sample_report())),
        );

        let result = server
            .process_get_extraction_page(&GetExtractionPageParams {
                cache_key: "k1".to_string(),
                page: 2,
            })
            .unwrap();

        assert_eq!(result.total_pages, 2);
        let record = result.record.unwrap();
        assert_eq!(record.page_number, 2);
        assert_eq!(record.extraction, PageExtraction::Text("Summary".to_string()));
    }

    #[test]
    fn test_get_extraction_page_errors() {
        let server = test_server();
        server.cache.put(
            "with_report".to_string(),
            CachedDocument::new(b"%PDF-1.7".to_vec(), Some(sample_report())),
        );
        server.cache.put(
            "pending".to_string(),
            CachedDocument::new(b"%PDF-1.7".to_vec(), None),
        );

        let lookup = |key: &str, page: u32| {
            server.process_get_extraction_page(&GetExtractionPageParams {
                cache_key: key.to_string(),
                page,
            })
        };

        assert!(matches!(
            lookup("with_report", 0),
            Err(Error::PageOutOfBounds { page: 0, total: 2 })
        ));
        assert!(matches!(
            lookup("with_report", 3),
            Err(Error::PageOutOfBounds { page: 3, total: 2 })
        ));
        assert!(matches!(
            lookup("pending", 1),
            Err(Error::NoCachedReport { .. })
        ));
        assert!(matches!(
            lookup("missing", 1),
            Err(Error::CacheKeyNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_render_page_preview_rejects_non_pdf() {
        let server = test_server();
        server.cache.put(
            "junk".to_string(),
            CachedDocument::new(b"not a pdf".to_vec(), None),
        );

        let result = server
            .process_render_page_preview(&RenderPagePreviewParams {
                cache_key: "junk".to_string(),
                page: 1,
                width: 800,
            })
            .await;
        assert!(matches!(result, Err(Error::DocumentOpen { .. })));
    }

    #[test]
    fn test_write_output_outside_resource_dirs() {
        let allowed = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let server = DeepPdfServer::with_config(ServerConfig {
            resource_dirs: vec![allowed.path().to_string_lossy().to_string()],
            ..ServerConfig::default()
        });

        let inside = allowed.path().join("report.json");
        let written = server
            .write_output(&inside.to_string_lossy(), b"{}")
            .unwrap();
        assert_eq!(written, inside.to_string_lossy());
        assert_eq!(std::fs::read(&inside).unwrap(), b"{}");

        let outside = other.path().join("report.json");
        assert!(matches!(
            server.write_output(&outside.to_string_lossy(), b"{}"),
            Err(Error::PathAccessDenied { .. })
        ));
        assert!(!outside.exists());
    }

    #[test]
    fn test_extract_tables_result_omits_empty_fields() {
        let result = ExtractTablesResult {
            source: "<base64>".to_string(),
            cache_key: None,
            output_path: None,
            report: None,
            error: Some("Could not open PDF file".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"source": "<base64>", "error": "Could not open PDF file"})
        );
    }
}
