//! lopdf access helpers.
//!
//! Small lookups over the lopdf object model shared by color space
//! resolution, the checker and the document walkers: reference
//! resolution, inherited page attributes and content stream decoding.

use std::sync::LazyLock;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::BackendError;

static EMPTY_DICT: LazyLock<Dictionary> = LazyLock::new(Dictionary::new);

/// An empty dictionary, for pages and forms without `/Resources`.
pub fn empty_dictionary() -> &'static Dictionary {
    &EMPTY_DICT
}

/// Follow an indirect reference through `doc`.
///
/// Returns `obj` unchanged when it is not a reference, when no document
/// is available, or when the target is missing.
pub fn resolve<'a>(doc: Option<&'a Document>, obj: &'a Object) -> &'a Object {
    match (obj, doc) {
        (Object::Reference(id), Some(doc)) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look up `key` in `dict`, resolving an indirect value.
pub fn get_resolved<'a>(doc: Option<&'a Document>, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve(doc, obj))
}

/// Look up a dictionary-valued entry, resolving an indirect value.
pub fn get_dict<'a>(doc: Option<&'a Document>, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    get_resolved(doc, dict, key).and_then(|obj| match obj {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    })
}

/// Name value of an object as text.
pub fn name_of(obj: &Object) -> Option<String> {
    obj.as_name().ok().map(|n| String::from_utf8_lossy(n).into_owned())
}

/// Numeric value of an `Integer` or `Real` object.
pub fn number_of(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

/// Look up a key in the page dictionary, walking up the page tree
/// through `/Parent` when the page itself does not carry it.
pub fn resolve_inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, BackendError> {
    let mut current = page_id;
    // bounded so that a /Parent cycle cannot loop forever
    for _ in 0..64 {
        let dict = doc
            .get_object(current)
            .and_then(|o| o.as_dict())
            .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;
        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent") {
            Ok(parent) => {
                current = parent
                    .as_reference()
                    .map_err(|e| BackendError::Parse(format!("invalid /Parent reference: {e}")))?;
            }
            Err(_) => return Ok(None),
        }
    }
    Err(BackendError::Parse("page tree /Parent chain too deep".to_string()))
}

/// The resource dictionary of a page, following inheritance.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Result<&Dictionary, BackendError> {
    match resolve_inherited(doc, page_id, b"Resources")? {
        Some(obj) => resolve(Some(doc), obj)
            .as_dict()
            .map_err(|_| BackendError::Parse("/Resources is not a dictionary".to_string())),
        None => Ok(empty_dictionary()),
    }
}

/// Decode a content stream, decompressing if it declares a filter.
pub fn decode_content_stream(stream: &Stream) -> Result<Vec<u8>, BackendError> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .map_err(|e| BackendError::Parse(format!("failed to decompress content stream: {e}")))
    } else {
        Ok(stream.content.clone())
    }
}

/// Object ids of the streams making up a page's `/Contents`.
pub fn page_content_ids(page: &Dictionary) -> Result<Vec<ObjectId>, BackendError> {
    match page.get(b"Contents") {
        Err(_) => Ok(Vec::new()),
        Ok(Object::Reference(id)) => Ok(vec![*id]),
        Ok(Object::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_reference().map_err(|e| {
                    BackendError::Parse(format!("/Contents array item is not a reference: {e}"))
                })
            })
            .collect(),
        Ok(_) => Err(BackendError::Parse(
            "/Contents is not a reference or array".to_string(),
        )),
    }
}

/// The decoded bytes of a page's content, with multiple streams joined
/// by a single space.
pub fn page_content_bytes(doc: &Document, page: &Dictionary) -> Result<Vec<u8>, BackendError> {
    let mut content = Vec::new();
    for id in page_content_ids(page)? {
        let stream = doc
            .get_object(id)
            .and_then(|o| o.as_stream())
            .map_err(|e| BackendError::Parse(format!("failed to resolve /Contents stream: {e}")))?;
        let bytes = decode_content_stream(stream)?;
        if !content.is_empty() {
            content.push(b' ');
        }
        content.extend_from_slice(&bytes);
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn doc_with_inherited_resources() -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_a = doc.add_object(Stream::new(dictionary! {}, b"0 g".to_vec()));
        let content_b = doc.add_object(Stream::new(dictionary! {}, b"1 0 0 rg".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => vec![content_a.into(), content_b.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => Object::Integer(1),
                "Resources" => dictionary! {
                    "ColorSpace" => dictionary! { "CS0" => "DeviceCMYK" },
                },
            }),
        );
        (doc, page_id)
    }

    #[test]
    fn resources_are_inherited() {
        let (doc, page_id) = doc_with_inherited_resources();
        let resources = page_resources(&doc, page_id).unwrap();
        assert!(get_dict(Some(&doc), resources, b"ColorSpace").is_some());
    }

    #[test]
    fn missing_resources_are_empty() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.add_object(dictionary! { "Type" => "Page" });
        assert!(page_resources(&doc, page_id).unwrap().is_empty());
    }

    #[test]
    fn content_arrays_are_joined() {
        let (doc, page_id) = doc_with_inherited_resources();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        assert_eq!(page_content_ids(page).unwrap().len(), 2);
        assert_eq!(page_content_bytes(&doc, page).unwrap(), b"0 g 1 0 0 rg");
    }

    #[test]
    fn references_resolve_only_with_document() {
        let mut doc = Document::with_version("1.5");
        let id = doc.add_object(Object::Integer(7));
        let reference = Object::Reference(id);
        assert_eq!(number_of(resolve(Some(&doc), &reference)), Some(7.0));
        assert!(matches!(resolve(None, &reference), Object::Reference(_)));
    }

    #[test]
    fn scalar_helpers() {
        assert_eq!(name_of(&Object::Name(b"DeviceRGB".to_vec())), Some("DeviceRGB".to_string()));
        assert_eq!(name_of(&Object::Integer(1)), None);
        assert_eq!(number_of(&Object::Real(0.5)), Some(0.5));
        assert_eq!(number_of(&Object::Null), None);
    }
}
