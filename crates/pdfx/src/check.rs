//! Whole-document conformance checking.
//!
//! A document is checked in this order: optional content in the catalog,
//! then page by page the content stream followed by the page resources
//! (fonts, graphics states, shadings, image and Form XObjects). Form
//! XObjects are checked as nested content, with their own resources, at
//! most once per walk.

use std::collections::BTreeSet;

use lopdf::{Dictionary, Document, Object, ObjectId};
use pdfx_core::{Color, PdfError, PdfxOptions};
use pdfx_parse::lopdf_backend::{
    decode_content_stream, get_dict, get_resolved, name_of, page_content_bytes, page_resources, resolve,
};
use pdfx_parse::{ContentChecker, FontSubject, Subject, check, resolve_color_space_object};

/// Check `doc` against `options.level`.
///
/// Does nothing when the level is `None`.
///
/// # Errors
///
/// Returns [`PdfError::Conformance`] with the first violation found, or
/// the error that stopped interpretation.
pub fn check_document(doc: &Document, options: &PdfxOptions) -> Result<(), PdfError> {
    if !options.level.is_pdfx() {
        return Ok(());
    }
    check_catalog(doc, options)?;

    let checker = ContentChecker::new()?;
    let mut walk = Walk::new(doc, &checker, options);
    for (number, page_id) in doc.get_pages() {
        #[cfg(feature = "tracing")]
        tracing::debug!(page = number, "checking page");
        #[cfg(not(feature = "tracing"))]
        let _ = number;
        walk.page(page_id)?;
    }
    Ok(())
}

/// Like [`check_document`], with pages checked in parallel.
///
/// The violation reported is the one on the lowest-numbered failing page.
#[cfg(feature = "parallel")]
pub fn check_document_parallel(doc: &Document, options: &PdfxOptions) -> Result<(), PdfError> {
    use rayon::prelude::*;

    if !options.level.is_pdfx() {
        return Ok(());
    }
    check_catalog(doc, options)?;

    let checker = ContentChecker::new()?;
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let results: Vec<Result<(), PdfError>> = pages
        .par_iter()
        .map(|&page_id| Walk::new(doc, &checker, options).page(page_id))
        .collect();
    results.into_iter().collect()
}

fn check_catalog(doc: &Document, options: &PdfxOptions) -> Result<(), PdfError> {
    let catalog = doc
        .catalog()
        .map_err(|e| PdfError::ParseError(format!("failed to get catalog: {e}")))?;
    if catalog.has(b"OCProperties") {
        check(&Subject::Layer, options.level, options)?;
    }
    Ok(())
}

/// State of one walk over pages: the shared checker and the forms
/// already visited.
struct Walk<'a> {
    doc: &'a Document,
    checker: &'a ContentChecker,
    options: &'a PdfxOptions,
    visited: BTreeSet<ObjectId>,
}

impl<'a> Walk<'a> {
    fn new(doc: &'a Document, checker: &'a ContentChecker, options: &'a PdfxOptions) -> Self {
        Self {
            doc,
            checker,
            options,
            visited: BTreeSet::new(),
        }
    }

    fn page(&mut self, page_id: ObjectId) -> Result<(), PdfError> {
        let page = self
            .doc
            .get_object(page_id)
            .and_then(|o| o.as_dict())
            .map_err(|e| PdfError::ParseError(format!("failed to get page dictionary: {e}")))?;
        let resources = page_resources(self.doc, page_id)?;
        let content = page_content_bytes(self.doc, page)?;
        self.checker
            .check_content(&content, resources, Some(self.doc), self.options)?;
        self.resources(resources, 0)
    }

    fn resources(&mut self, resources: &'a Dictionary, depth: usize) -> Result<(), PdfError> {
        let doc = Some(self.doc);
        let level = self.options.level;

        for font in entries(self.doc, resources, b"Font") {
            if let Some(font) = as_dict(font) {
                let subject = FontSubject::from_dictionary(doc, font);
                check(&Subject::Font(&subject), level, self.options)?;
            }
        }
        for state in entries(self.doc, resources, b"ExtGState") {
            if let Some(state) = as_dict(state) {
                check(
                    &Subject::GraphicsState {
                        dict: state,
                        document: doc,
                    },
                    level,
                    self.options,
                )?;
            }
        }
        for shading in entries(self.doc, resources, b"Shading") {
            let Some(cs) = as_dict(shading).and_then(|d| get_resolved(doc, d, b"ColorSpace")) else {
                continue;
            };
            if let Some(space) = resolve_color_space_object(cs, doc, self.options.max_color_depth)? {
                check(&Subject::Color(&Color::shading(space)), level, self.options)?;
            }
        }

        let Some(xobjects) = get_dict(doc, resources, b"XObject") else {
            return Ok(());
        };
        for (_, value) in xobjects.iter() {
            if let Ok(id) = value.as_reference() {
                if !self.visited.insert(id) {
                    continue;
                }
            }
            let Object::Stream(stream) = resolve(doc, value) else {
                continue;
            };
            match get_resolved(doc, &stream.dict, b"Subtype").and_then(name_of).as_deref() {
                Some("Image") => check(
                    &Subject::Image {
                        dict: &stream.dict,
                        document: doc,
                    },
                    level,
                    self.options,
                )?,
                Some("Form") => {
                    let content = decode_content_stream(stream)?;
                    let form_resources = get_dict(doc, &stream.dict, b"Resources").unwrap_or(resources);
                    self.checker
                        .check_at(&content, form_resources, doc, self.options, depth + 1)?;
                    self.resources(form_resources, depth + 1)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Values of the subdictionary `key` of `resources`, resolved.
fn entries<'a>(doc: &'a Document, resources: &'a Dictionary, key: &[u8]) -> Vec<&'a Object> {
    get_dict(Some(doc), resources, key)
        .map(|d| d.iter().map(|(_, v)| resolve(Some(doc), v)).collect())
        .unwrap_or_default()
}

fn as_dict(obj: &Object) -> Option<&Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}
