//! Document access: pdfplumber for page analysis, PDFium for rasterizing

use crate::error::{Error, Result};
use base64::Engine;
use image::DynamicImage;
use pdfium_render::prelude::*;
use pdfplumber::{Pdf, PdfError, PdfErrorKind, Table, TableSettings, TextOptions};
use std::cell::OnceCell;
use std::path::Path;

/// Page-level operations the extractor needs from a document.
///
/// Page numbers are 1-based.
pub trait PageSource {
    /// Number of pages in the document
    fn page_count(&self) -> u32;

    /// Structural table detection; never calls out to a model
    fn detect_tables(&self, page_number: u32) -> Result<Vec<Table>>;

    /// Rasterize the full page at the given resolution (DPI)
    fn render_page(&self, page_number: u32, resolution: u32) -> Result<DynamicImage>;

    /// Page text in reading order, trimmed; empty when the page has no text
    fn page_text(&self, page_number: u32) -> Result<String>;
}

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
pub fn create_pdfium() -> Result<Pdfium> {
    // Try to bind to system library or use static linking
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Read a file and check it carries a PDF header
pub fn read_pdf_bytes(path: &Path) -> Result<Vec<u8>> {
    let data = std::fs::read(path).map_err(|e| Error::DocumentOpen {
        reason: format!("{}: {}", path.display(), e),
    })?;
    check_pdf_header(&data)?;
    Ok(data)
}

fn check_pdf_header(data: &[u8]) -> Result<()> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::DocumentOpen {
            reason: "Not a valid PDF file".to_string(),
        });
    }
    Ok(())
}

/// Every open failure is a `DocumentOpen`; encryption gets a fixed message
fn open_error(e: PdfError) -> Error {
    match e.kind() {
        PdfErrorKind::PasswordRequired | PdfErrorKind::InvalidPassword => Error::DocumentOpen {
            reason: "PDF is password protected".to_string(),
        },
        _ => Error::DocumentOpen {
            reason: e.to_string(),
        },
    }
}

fn load_pdfium_document<'p>(pdfium: &'p Pdfium, data: &'p [u8]) -> Result<PdfDocument<'p>> {
    pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(|e| match e {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                Error::DocumentOpen {
                    reason: "PDF is password protected".to_string(),
                }
            }
            _ => Error::DocumentOpen {
                reason: format!("{}", e),
            },
        })
}

/// An open document.
///
/// Tables and text come from pdfplumber, which interprets the content
/// stream with the full graphics state. PDFium is bound on the first render
/// only, so text-only documents never need the native library.
pub struct Document<'a> {
    data: &'a [u8],
    pdf: Pdf,
    table_settings: TableSettings,
    pdfium: OnceCell<Pdfium>,
}

impl<'a> Document<'a> {
    /// Parse PDF bytes; any parse failure (including encryption) is a `DocumentOpen`
    pub fn load(data: &'a [u8], table_settings: TableSettings) -> Result<Self> {
        check_pdf_header(data)?;
        let pdf = Pdf::open(data, None).map_err(open_error)?;

        Ok(Self {
            data,
            pdf,
            table_settings,
            pdfium: OnceCell::new(),
        })
    }

    fn page(&self, page_number: u32) -> Result<pdfplumber::Page> {
        let total = self.page_count();
        if page_number < 1 || page_number > total {
            return Err(Error::PageOutOfBounds {
                page: page_number,
                total,
            });
        }

        self.pdf
            .page((page_number - 1) as usize)
            .map_err(|e| Error::DocumentOpen {
                reason: format!("Failed to load page {}: {}", page_number, e),
            })
    }

    fn pdfium(&self) -> Result<&Pdfium> {
        if let Some(pdfium) = self.pdfium.get() {
            return Ok(pdfium);
        }
        let pdfium = create_pdfium()?;
        Ok(self.pdfium.get_or_init(|| pdfium))
    }

    fn render_with(&self, page_number: u32, config: PdfRenderConfig) -> Result<DynamicImage> {
        let total = self.page_count();
        if page_number < 1 || page_number > total {
            return Err(Error::PageOutOfBounds {
                page: page_number,
                total,
            });
        }

        let document = load_pdfium_document(self.pdfium()?, self.data)?;
        let page = document
            .pages()
            .get((page_number - 1) as u16)
            .map_err(|e| Error::Pdfium {
                reason: format!("Failed to get page {}: {}", page_number, e),
            })?;

        let config = config.render_form_data(true).render_annotations(true);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| Error::Pdfium {
                reason: format!("Failed to render page {}: {}", page_number, e),
            })?;

        Ok(bitmap.as_image())
    }

    /// Render a page scaled to the given pixel width, for previews
    pub fn render_page_to_width(&self, page_number: u32, width: u16) -> Result<DynamicImage> {
        let config = PdfRenderConfig::new().set_target_width(width as i32);
        self.render_with(page_number, config)
    }
}

impl PageSource for Document<'_> {
    fn page_count(&self) -> u32 {
        self.pdf.page_count() as u32
    }

    fn detect_tables(&self, page_number: u32) -> Result<Vec<Table>> {
        Ok(self.page(page_number)?.find_tables(&self.table_settings))
    }

    fn render_page(&self, page_number: u32, resolution: u32) -> Result<DynamicImage> {
        let config = PdfRenderConfig::new().scale_page_by_factor(resolution as f32 / 72.0);
        self.render_with(page_number, config)
    }

    fn page_text(&self, page_number: u32) -> Result<String> {
        let text = self
            .page(page_number)?
            .extract_text(&TextOptions::default());
        Ok(text.trim().to_string())
    }
}

/// Rendered page preview
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Page number (1-indexed)
    pub page: u32,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Base64-encoded PNG image data
    pub data_base64: String,
    /// MIME type (always "image/png")
    pub mime_type: String,
}

/// Render one page of in-memory PDF bytes as a base64 PNG preview
pub fn render_page_preview(data: &[u8], page_number: u32, width: u16) -> Result<RenderedPage> {
    let document = Document::load(data, TableSettings::default())?;
    let image = document.render_page_to_width(page_number, width)?;

    let mut png_bytes = Vec::new();
    image
        .write_to(
            &mut std::io::Cursor::new(&mut png_bytes),
            image::ImageFormat::Png,
        )
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to encode page {} as PNG: {}", page_number, e),
        })?;

    Ok(RenderedPage {
        page: page_number,
        width: image.width(),
        height: image.height(),
        data_base64: base64::engine::general_purpose::STANDARD.encode(&png_bytes),
        mime_type: "image/png".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_invalid_pdf_header() {
        assert!(matches!(
            check_pdf_header(b"not a pdf"),
            Err(Error::DocumentOpen { .. })
        ));
        assert!(matches!(check_pdf_header(b"%P"), Err(Error::DocumentOpen { .. })));
        assert!(check_pdf_header(b"%PDF-1.7\n").is_ok());
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_pdf_bytes(Path::new("/nonexistent/path/file.pdf"));
        assert!(matches!(result, Err(Error::DocumentOpen { .. })));
    }

    #[test]
    fn test_read_corrupted_file() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        file.write_all(b"PK\x03\x04 this is a zip").unwrap();

        let result = read_pdf_bytes(file.path());
        assert!(matches!(result, Err(Error::DocumentOpen { .. })));
    }

    #[test]
    fn test_truncated_pdf_fails_to_load() {
        let result = Document::load(b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog", TableSettings::default());
        assert!(matches!(result, Err(Error::DocumentOpen { .. })));
    }

    #[test]
    fn test_password_errors_map_to_fixed_message() {
        for e in [PdfError::password_required(), PdfError::invalid_password()] {
            match open_error(e) {
                Error::DocumentOpen { reason } => assert_eq!(reason, "PDF is password protected"),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_parse_errors_are_document_open() {
        assert!(matches!(
            open_error(PdfError::parse("bad xref")),
            Error::DocumentOpen { .. }
        ));
    }

    #[test]
    fn test_preview_rejects_non_pdf_before_binding_pdfium() {
        let result = render_page_preview(b"garbage", 1, 800);
        assert!(matches!(result, Err(Error::DocumentOpen { .. })));
    }
}
