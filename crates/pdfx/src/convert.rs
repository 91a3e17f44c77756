//! Whole-document color conversion.

use std::collections::BTreeSet;

use lopdf::{Document, Object, ObjectId};
use pdfx_core::{ColorSpaceConverter, PdfError};
use pdfx_parse::ContentRewriter;
use pdfx_parse::lopdf_backend::{
    decode_content_stream, empty_dictionary, get_dict, get_resolved, name_of, page_content_ids,
    page_resources,
};

/// What [`convert_document_colors`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    /// Pages visited.
    pub pages: usize,
    /// Content streams rewritten (page contents and Form XObjects).
    pub streams: usize,
    /// Decoded size of the rewritten streams before conversion.
    pub bytes_in: usize,
    /// Size of the rewritten streams after conversion.
    pub bytes_out: usize,
}

/// Where a stream's resources come from.
#[derive(Debug, Clone, Copy)]
enum Owner {
    Page(ObjectId),
    Form,
}

/// Rewrite every page content stream, and every Form XObject reachable from
/// page resources, with device colors converted by `converter`.
///
/// Streams shared between pages are rewritten once. Rewritten streams are
/// stored uncompressed.
///
/// # Errors
///
/// Stops at the first stream that fails to decode or interpret; streams
/// already rewritten keep their new content.
pub fn convert_document_colors(
    doc: &mut Document,
    converter: &ColorSpaceConverter,
) -> Result<ConversionSummary, PdfError> {
    let rewriter = ContentRewriter::new(converter.clone())?;
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();

    let mut seen = BTreeSet::new();
    let mut targets = Vec::new();
    for &page_id in &pages {
        let page = doc
            .get_object(page_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| PdfError::ParseError(format!("failed to get page dictionary: {e}")))?;
        for id in page_content_ids(page)? {
            if seen.insert(id) {
                targets.push((id, Owner::Page(page_id)));
            }
        }
        let resources = page_resources(doc, page_id)?;
        collect_forms(doc, resources, &mut seen, &mut targets);
    }

    let mut summary = ConversionSummary {
        pages: pages.len(),
        ..ConversionSummary::default()
    };
    for (id, owner) in targets {
        let (content, rewritten) = {
            let view: &Document = doc;
            let stream = view
                .get_object(id)
                .and_then(|o| o.as_stream())
                .map_err(|e| PdfError::ParseError(format!("failed to resolve content stream: {e}")))?;
            let resources = match owner {
                Owner::Page(page_id) => page_resources(view, page_id)?,
                Owner::Form => get_dict(Some(view), &stream.dict, b"Resources").unwrap_or(empty_dictionary()),
            };
            let content = decode_content_stream(stream)?;
            let rewritten = rewriter.rewrite(&content, resources)?;
            (content, rewritten)
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(object = id.0, before = content.len(), after = rewritten.len(), "stream converted");

        summary.streams += 1;
        summary.bytes_in += content.len();
        summary.bytes_out += rewritten.len();
        doc.get_object_mut(id)
            .and_then(|o| o.as_stream_mut())
            .map_err(|e| PdfError::ParseError(format!("failed to update content stream: {e}")))?
            .set_plain_content(rewritten);
    }
    Ok(summary)
}

/// Queue Form XObjects under `resources`, descending into their own
/// resources. Only indirect forms are collected; `seen` breaks cycles.
fn collect_forms(
    doc: &Document,
    resources: &lopdf::Dictionary,
    seen: &mut BTreeSet<ObjectId>,
    targets: &mut Vec<(ObjectId, Owner)>,
) {
    let Some(xobjects) = get_dict(Some(doc), resources, b"XObject") else {
        return;
    };
    for (_, value) in xobjects.iter() {
        let Ok(id) = value.as_reference() else {
            continue;
        };
        let Ok(stream) = doc.get_object(id).and_then(|o| o.as_stream()) else {
            continue;
        };
        let is_form = get_resolved(Some(doc), &stream.dict, b"Subtype")
            .and_then(name_of)
            .is_some_and(|s| s == "Form");
        if !is_form || !seen.insert(id) {
            continue;
        }
        targets.push((id, Owner::Form));
        if let Some(inner) = get_dict(Some(doc), &stream.dict, b"Resources") {
            collect_forms(doc, inner, seen, targets);
        }
    }
}
