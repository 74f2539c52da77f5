//! Table-aware page extraction
//!
//! Every page is classified by structural table detection. Table pages are
//! rendered and sent to the vision model; all other pages are read as text.

use crate::config::{is_supported_extension, ExtractorConfig};
use crate::error::{Error, Result};
use crate::model::{OpenAiClient, StructuredImageExtractor};
use crate::pdf::{read_pdf_bytes, Document, PageSource};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How a page was extracted, together with its content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "extraction_type", content = "content", rename_all = "lowercase")]
pub enum PageExtraction {
    /// Content reported by the vision model for a page with detected tables
    Table(serde_json::Value),
    /// Trimmed page text; empty for pages without text
    Text(String),
}

/// Kind of extraction performed on a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionType {
    Table,
    Text,
}

impl PageExtraction {
    pub fn extraction_type(&self) -> ExtractionType {
        match self {
            PageExtraction::Table(_) => ExtractionType::Table,
            PageExtraction::Text(_) => ExtractionType::Text,
        }
    }
}

/// Extraction outcome for one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// 1-based physical page number
    pub page_number: u32,
    #[serde(flatten)]
    pub extraction: PageExtraction,
}

/// Ordered per-page records of one document, one per page starting at page 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult(Vec<ExtractionRecord>);

impl ExtractionResult {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExtractionRecord> {
        self.0.iter()
    }

    pub fn records(&self) -> &[ExtractionRecord] {
        &self.0
    }

    /// Record for a 1-based page number
    pub fn page(&self, page_number: u32) -> Option<&ExtractionRecord> {
        page_number
            .checked_sub(1)
            .and_then(|index| self.0.get(index as usize))
    }

    pub fn into_records(self) -> Vec<ExtractionRecord> {
        self.0
    }
}

impl IntoIterator for ExtractionResult {
    type Item = ExtractionRecord;
    type IntoIter = std::vec::IntoIter<ExtractionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Timing information attached to a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Wall time of the extraction in seconds
    pub extraction_time: f64,
    /// Local time the report was produced
    pub timestamp: String,
}

/// Downloadable extraction artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub total_pages: u32,
    pub pages: Vec<ExtractionRecord>,
    pub metadata: ReportMetadata,
}

impl ExtractionReport {
    pub fn new(result: ExtractionResult, elapsed: Duration) -> Self {
        Self {
            total_pages: result.len() as u32,
            pages: result.into_records(),
            metadata: ReportMetadata {
                extraction_time: elapsed.as_secs_f64(),
                timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            },
        }
    }

    /// Number of pages that went through the vision model
    pub fn table_page_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|r| r.extraction.extraction_type() == ExtractionType::Table)
            .count()
    }
}

/// Shared contract of document extractors.
///
/// Resources acquired by `extract` are released before it returns, on every path.
pub trait DocumentExtractor {
    /// Whether the path names a supported input file type
    fn validate_input(&self, input_path: &Path) -> bool;

    /// Extract every page of the document at `input_path`
    fn extract(&self, input_path: &Path) -> Result<ExtractionResult>;
}

/// Extracts text pages directly and table pages through a vision model
pub struct TableExtractor<C = OpenAiClient> {
    config: ExtractorConfig,
    client: C,
}

impl TableExtractor<OpenAiClient> {
    /// Build an extractor backed by the OpenAI chat completions API
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        config.validate()?;
        let client = OpenAiClient::new(&config)?;
        Ok(Self { config, client })
    }
}

impl<C: StructuredImageExtractor> TableExtractor<C> {
    /// Build an extractor around any model client
    pub fn with_client(config: ExtractorConfig, client: C) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, client })
    }

    /// Run the per-page classification loop over an open document.
    ///
    /// Pages are visited once each, in order. The first error aborts the run
    /// and no partial result is returned.
    pub fn extract_pages<S: PageSource>(&self, source: &S) -> Result<ExtractionResult> {
        let page_count = source.page_count();
        let mut records = Vec::with_capacity(page_count as usize);

        for page_number in 1..=page_count {
            let extraction = self.extract_page(source, page_number)?;
            records.push(ExtractionRecord {
                page_number,
                extraction,
            });
        }

        Ok(ExtractionResult(records))
    }

    fn extract_page<S: PageSource>(&self, source: &S, page_number: u32) -> Result<PageExtraction> {
        // Detected tables only gate the model call; their cells are not used
        let tables = source.detect_tables(page_number)?;

        if tables.is_empty() {
            let text = source.page_text(page_number)?;
            tracing::debug!(page = page_number, chars = text.len(), "Text page");
            return Ok(PageExtraction::Text(text.trim().to_string()));
        }

        tracing::debug!(page = page_number, tables = tables.len(), "Table page");
        let image = source.render_page(page_number, self.config.resolution)?;
        let content = self
            .client
            .extract_table_from_image(&image, &self.config.model)?;

        Ok(PageExtraction::Table(content))
    }
}

impl<C: StructuredImageExtractor> DocumentExtractor for TableExtractor<C> {
    fn validate_input(&self, input_path: &Path) -> bool {
        is_supported_extension(input_path)
    }

    fn extract(&self, input_path: &Path) -> Result<ExtractionResult> {
        if !self.validate_input(input_path) {
            return Err(Error::InvalidInput {
                path: input_path.display().to_string(),
            });
        }

        let data = read_pdf_bytes(input_path)?;
        let document = Document::load(&data, self.config.table_settings.clone())?;

        self.extract_pages(&document)
    }
}
