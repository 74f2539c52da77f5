//! PDF processing layer
//!
//! pdfplumber drives table detection and text extraction; PDFium renders
//! pages to images.

mod document;

pub use document::{
    create_pdfium, read_pdf_bytes, render_page_preview, Document, PageSource, RenderedPage,
};
pub use pdfplumber::{BBox, Table as DetectedTable, TableSettings};
