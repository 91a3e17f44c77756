//! pdfx: convert PDF content colors to a print profile and check PDF/X
//! conformance.
//!
//! This is the public API facade crate for pdfx-rs. It re-exports the color
//! model from pdfx-core and the interpreter from pdfx-parse, and adds the
//! document-level operations that walk a `lopdf` document page by page.
//!
//! # Architecture
//!
//! - **pdfx-core**: color model, conversion engine, conformance vocabulary
//! - **pdfx-parse**: content stream interpreter, rewriter and checker
//! - **pdfx** (this crate): whole-document conversion and checking
//!
//! # Example
//!
//! ```ignore
//! let mut doc = pdfx::load_document(&bytes)?;
//! let converter = pdfx::ColorSpaceConverter::device_cmyk();
//! pdfx::convert_document_colors(&mut doc, &converter)?;
//! let options = pdfx::PdfxOptions::with_level(pdfx::ConformanceLevel::PdfX1a2001);
//! pdfx::check_document(&doc, &options)?;
//! ```

mod check;
mod convert;
mod metadata;

pub use check::check_document;
#[cfg(feature = "parallel")]
pub use check::check_document_parallel;
pub use convert::{ConversionSummary, convert_document_colors};
pub use metadata::complete_conformance_metadata;

pub use pdfx_core::{
    CalibrationProfile, Color, ColorKind, ColorSpace, ColorSpaceConverter, ConformanceKey,
    ConformanceLevel, DeviceCmykProfile, OutputProfile, PdfError, PdfxOptions, PolicyViolation,
};
pub use pdfx_parse::{ContentChecker, ContentRewriter, FontSubject, Subject, check};

pub use lopdf;
pub use pdfx_core;
pub use pdfx_parse;

/// Parse a PDF file held in memory.
///
/// # Errors
///
/// Returns [`PdfError::ParseError`] if `bytes` is not a readable PDF.
pub fn load_document(bytes: &[u8]) -> Result<lopdf::Document, PdfError> {
    lopdf::Document::load_mem(bytes).map_err(|e| PdfError::ParseError(format!("failed to parse PDF: {e}")))
}

/// Serialize a document back to bytes.
///
/// # Errors
///
/// Returns [`PdfError::Other`] if writing fails.
pub fn save_document(doc: &mut lopdf::Document) -> Result<Vec<u8>, PdfError> {
    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| PdfError::Other(format!("failed to write PDF: {e}")))?;
    Ok(out)
}
