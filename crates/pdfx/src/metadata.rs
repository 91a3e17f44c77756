//! Document-level entries a PDF/X file must carry.

use lopdf::{Dictionary, Document, Object, dictionary};
use pdfx_core::{ConformanceLevel, PdfError};

/// Fill in the `/Info` keys and the output intent required by PDF/X.
///
/// Existing entries are left alone. Only the PDF/X levels are affected;
/// for `None` and the PDF/A levels the document is unchanged.
///
/// # Errors
///
/// Returns [`PdfError::ParseError`] if the catalog or an existing `/Info`
/// dictionary cannot be read.
pub fn complete_conformance_metadata(doc: &mut Document, level: ConformanceLevel) -> Result<(), PdfError> {
    let Some(version) = level.pdfx_version() else {
        return Ok(());
    };

    let info = info_dictionary(doc)?;
    if !info.has(b"GTS_PDFXVersion") {
        info.set("GTS_PDFXVersion", Object::string_literal(version));
        if level == ConformanceLevel::PdfX1a2001 {
            info.set("GTS_PDFXConformance", Object::string_literal("PDF/X-1a:2001"));
        }
    }
    set_default(info, "Title", Object::string_literal("Pdf document"));
    set_default(info, "Creator", Object::string_literal("Unknown"));
    set_default(info, "Trapped", Object::Name(b"False".to_vec()));

    let catalog = doc
        .catalog_mut()
        .map_err(|e| PdfError::ParseError(format!("failed to get catalog: {e}")))?;
    if !catalog.has(b"OutputIntents") {
        let intent = dictionary! {
            "Type" => "OutputIntent",
            "S" => "GTS_PDFX",
            "OutputCondition" => Object::string_literal("SWOP CGATS TR 001-1995"),
            "OutputConditionIdentifier" => Object::string_literal("CGATS TR 001"),
            "RegistryName" => Object::string_literal("http://www.color.org"),
            "Info" => Object::string_literal(""),
        };
        catalog.set("OutputIntents", Object::Array(vec![Object::Dictionary(intent)]));
    }
    Ok(())
}

fn set_default(dict: &mut Dictionary, key: &str, value: Object) {
    if !dict.has(key.as_bytes()) {
        dict.set(key, value);
    }
}

/// The document's `/Info` dictionary, created if missing.
fn info_dictionary(doc: &mut Document) -> Result<&mut Dictionary, PdfError> {
    let id = match doc.trailer.get(b"Info").and_then(|o| o.as_reference()) {
        Ok(id) => id,
        Err(_) => {
            let id = doc.add_object(Dictionary::new());
            doc.trailer.set("Info", id);
            id
        }
    };
    doc.get_object_mut(id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| PdfError::ParseError(format!("failed to get /Info dictionary: {e}")))
}
