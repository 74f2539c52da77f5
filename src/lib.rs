//! Deep PDF Library
//!
//! Table-aware PDF extraction. Each page is checked for ruled tables; table
//! pages are rendered and transcribed by a vision model, all other pages are
//! read as plain text.
//!
//! The crate also provides an MCP server with these tools:
//! - `extract_tables`: Extract every page of a PDF into a report
//! - `get_extraction_page`: Page through a cached report
//! - `render_page_preview`: Render a cached page as a PNG for review

pub mod config;
pub mod error;
pub mod extractor;
pub mod model;
pub mod pdf;
pub mod server;
pub mod source;

pub use config::ExtractorConfig;
pub use error::{Error, Result};
pub use extractor::{
    DocumentExtractor, ExtractionRecord, ExtractionReport, ExtractionResult, ExtractionType,
    PageExtraction, TableExtractor,
};
pub use model::{OpenAiClient, StructuredImageExtractor};
pub use server::{run_server, run_server_with_config, DeepPdfServer, PdfSource, ServerConfig};
