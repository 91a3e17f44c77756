//! Color space resolution from PDF resource dictionaries.
//!
//! Resolves names given to `CS`/`cs` and color space objects found in
//! shadings, images and patterns into [`ColorSpace`] descriptors. Nested
//! definitions (an ICCBased alternate, an Indexed base, a Separation
//! alternate) are followed down to `max_depth` levels; a deeper definition
//! is an error rather than a guess.

use lopdf::{Document, Object};
use pdfx_core::{ColorSpace, PdfError};

use crate::error::BackendError;
use crate::lopdf_backend::{get_dict, get_resolved, name_of, resolve};

/// Resolve a color space name.
///
/// Device family names (including the inline-image abbreviations) and
/// `Pattern` resolve directly; anything else is looked up in the
/// `/ColorSpace` subdictionary of `resources`. `Ok(None)` means the name
/// or its definition is not understood.
///
/// # Errors
///
/// Returns [`PdfError::ResourceLimitExceeded`] (`max_color_depth`) when the
/// definition nests deeper than `max_depth`.
pub fn resolve_color_space_name(
    name: &str,
    doc: Option<&Document>,
    resources: &lopdf::Dictionary,
    max_depth: usize,
) -> Result<Option<ColorSpace>, BackendError> {
    if let Some(space) = family_from_name(name) {
        return Ok(Some(space));
    }
    let Some(obj) = get_dict(doc, resources, b"ColorSpace").and_then(|spaces| spaces.get(name.as_bytes()).ok())
    else {
        return Ok(None);
    };
    Resolver { doc, max_depth }.at(obj, 0)
}

/// Resolve a color space object (name, array or reference to either).
///
/// # Errors
///
/// As for [`resolve_color_space_name`].
pub fn resolve_color_space_object(
    obj: &Object,
    doc: Option<&Document>,
    max_depth: usize,
) -> Result<Option<ColorSpace>, BackendError> {
    Resolver { doc, max_depth }.at(obj, 0)
}

fn family_from_name(name: &str) -> Option<ColorSpace> {
    match name {
        "DeviceGray" | "G" => Some(ColorSpace::DeviceGray),
        "DeviceRGB" | "RGB" => Some(ColorSpace::DeviceRgb),
        "DeviceCMYK" | "CMYK" => Some(ColorSpace::DeviceCmyk),
        "Pattern" => Some(ColorSpace::Pattern { underlying: None }),
        _ => None,
    }
}

struct Resolver<'a> {
    doc: Option<&'a Document>,
    max_depth: usize,
}

impl Resolver<'_> {
    fn at(&self, obj: &Object, depth: usize) -> Result<Option<ColorSpace>, BackendError> {
        if depth > self.max_depth {
            return Err(PdfError::ResourceLimitExceeded {
                limit_name: "max_color_depth".to_string(),
                limit_value: self.max_depth,
                actual_value: depth,
            }
            .into());
        }
        match resolve(self.doc, obj) {
            Object::Name(name) => Ok(family_from_name(&String::from_utf8_lossy(name))),
            Object::Array(items) => self.array(items, depth),
            _ => Ok(None),
        }
    }

    /// Resolve `items[index]`, `Ok(None)` when absent or not understood.
    fn nested(&self, items: &[Object], index: usize, depth: usize) -> Result<Option<ColorSpace>, BackendError> {
        match items.get(index) {
            Some(obj) => self.at(obj, depth + 1),
            None => Ok(None),
        }
    }

    fn array(&self, items: &[Object], depth: usize) -> Result<Option<ColorSpace>, BackendError> {
        let doc = self.doc;
        let Some(family) = items.first().and_then(name_of) else {
            return Ok(None);
        };
        let space = match family.as_str() {
            "CalGray" => ColorSpace::CalGray,
            "CalRGB" => ColorSpace::CalRgb,
            "Lab" => ColorSpace::Lab,
            "ICCBased" => {
                let Some(stream) = items.get(1).and_then(|o| resolve(doc, o).as_stream().ok()) else {
                    return Ok(None);
                };
                let num_components = get_resolved(doc, &stream.dict, b"N")
                    .and_then(|o| o.as_i64().ok())
                    .map(|n| n as u32)
                    .unwrap_or(3);
                let alternate = match get_resolved(doc, &stream.dict, b"Alternate") {
                    Some(obj) => self.at(obj, depth + 1)?,
                    None => None,
                };
                ColorSpace::IccBased {
                    num_components,
                    alternate: Box::new(alternate.unwrap_or_else(|| alternate_for_components(num_components))),
                }
            }
            "Indexed" | "I" => {
                let Some(base) = self.nested(items, 1, depth)? else {
                    return Ok(None);
                };
                let Some(hival) = items.get(2).and_then(|o| resolve(doc, o).as_i64().ok()) else {
                    return Ok(None);
                };
                let lookup = match items.get(3).map(|o| resolve(doc, o)) {
                    Some(Object::String(bytes, _)) => bytes.clone(),
                    Some(Object::Stream(s)) => s.decompressed_content().unwrap_or_else(|_| s.content.clone()),
                    _ => return Ok(None),
                };
                ColorSpace::Indexed {
                    base: Box::new(base),
                    hival: hival.clamp(0, 255) as u32,
                    lookup,
                }
            }
            "Separation" => {
                let Some(name) = items.get(1).and_then(name_of) else {
                    return Ok(None);
                };
                let Some(alternate) = self.nested(items, 2, depth)? else {
                    return Ok(None);
                };
                ColorSpace::Separation {
                    name,
                    alternate: Box::new(alternate),
                }
            }
            "DeviceN" => {
                let Some(names) = items.get(1).and_then(|o| resolve(doc, o).as_array().ok()) else {
                    return Ok(None);
                };
                let names = names.iter().filter_map(name_of).collect();
                let Some(alternate) = self.nested(items, 2, depth)? else {
                    return Ok(None);
                };
                ColorSpace::DeviceN {
                    names,
                    alternate: Box::new(alternate),
                }
            }
            "Pattern" => ColorSpace::Pattern {
                underlying: self.nested(items, 1, depth)?.map(Box::new),
            },
            other => return Ok(family_from_name(other)),
        };
        Ok(Some(space))
    }
}

fn alternate_for_components(n: u32) -> ColorSpace {
    match n {
        1 => ColorSpace::DeviceGray,
        4 => ColorSpace::DeviceCmyk,
        _ => ColorSpace::DeviceRgb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, Stream, StringFormat, dictionary};
    use pdfx_core::Color;

    const DEPTH: usize = 16;

    fn object(obj: &Object, doc: Option<&Document>) -> Option<ColorSpace> {
        resolve_color_space_object(obj, doc, DEPTH).unwrap()
    }

    fn named(name: &str, doc: Option<&Document>, resources: &Dictionary) -> Option<ColorSpace> {
        resolve_color_space_name(name, doc, resources, DEPTH).unwrap()
    }

    fn name(s: &str) -> Object {
        Object::Name(s.as_bytes().to_vec())
    }

    #[test]
    fn device_names_resolve_without_resources() {
        let resources = Dictionary::new();
        assert_eq!(
            named("DeviceRGB", None, &resources),
            Some(ColorSpace::DeviceRgb)
        );
        assert_eq!(
            named("CMYK", None, &resources),
            Some(ColorSpace::DeviceCmyk)
        );
        assert_eq!(
            named("Pattern", None, &resources),
            Some(ColorSpace::Pattern { underlying: None })
        );
        assert_eq!(named("CS9", None, &resources), None);
    }

    #[test]
    fn icc_based_with_and_without_alternate() {
        let mut doc = Document::with_version("1.5");
        let plain = doc.add_object(Stream::new(dictionary! { "N" => Object::Integer(4) }, vec![0; 10]));
        let with_alt = doc.add_object(Stream::new(
            dictionary! { "N" => Object::Integer(3), "Alternate" => "DeviceRGB" },
            vec![0; 10],
        ));

        let cs = object(&Object::Array(vec![name("ICCBased"), plain.into()]), Some(&doc))
            .unwrap();
        assert_eq!(
            cs,
            ColorSpace::IccBased {
                num_components: 4,
                alternate: Box::new(ColorSpace::DeviceCmyk)
            }
        );

        let cs = object(&Object::Array(vec![name("ICCBased"), with_alt.into()]), Some(&doc))
            .unwrap();
        assert_eq!(cs.color_from(&[0.1, 0.2, 0.3]), Some(Color::rgb(0.1, 0.2, 0.3)));
    }

    #[test]
    fn indexed_palette() {
        let arr = Object::Array(vec![
            name("Indexed"),
            name("DeviceRGB"),
            Object::Integer(1),
            Object::String(vec![255, 0, 0, 0, 255, 0], StringFormat::Hexadecimal),
        ]);
        let cs = object(&arr, None).unwrap();
        assert_eq!(cs.color_from(&[1.0]), Some(Color::rgb(0.0, 1.0, 0.0)));
    }

    #[test]
    fn separation_and_device_n() {
        let sep = Object::Array(vec![
            name("Separation"),
            name("Gold"),
            name("DeviceCMYK"),
            Object::Null,
        ]);
        assert_eq!(
            object(&sep, None),
            Some(ColorSpace::Separation {
                name: "Gold".to_string(),
                alternate: Box::new(ColorSpace::DeviceCmyk)
            })
        );

        let devn = Object::Array(vec![
            name("DeviceN"),
            Object::Array(vec![name("Cyan"), name("Spot")]),
            name("DeviceRGB"),
            Object::Null,
        ]);
        let cs = object(&devn, None).unwrap();
        assert_eq!(cs.num_components(), 2);
    }

    #[test]
    fn calibrated_and_pattern_arrays() {
        let cal = Object::Array(vec![name("CalRGB"), Object::Dictionary(Dictionary::new())]);
        assert_eq!(object(&cal, None), Some(ColorSpace::CalRgb));

        let pattern = Object::Array(vec![name("Pattern"), name("DeviceRGB")]);
        assert_eq!(
            object(&pattern, None),
            Some(ColorSpace::Pattern {
                underlying: Some(Box::new(ColorSpace::DeviceRgb))
            })
        );
    }

    #[test]
    fn named_space_from_resources_through_reference() {
        let mut doc = Document::with_version("1.5");
        let sep_id = doc.add_object(vec![name("Separation"), name("Spot"), name("DeviceRGB"), Object::Null]);
        let spaces_id = doc.add_object(dictionary! { "CS1" => sep_id });
        let resources = dictionary! { "ColorSpace" => spaces_id };
        let cs = named("CS1", Some(&doc), &resources).unwrap();
        assert_eq!(cs.color_from(&[0.5]), Some(Color::separation("Spot", 0.5, Color::rgb(0.0, 0.0, 0.0))));
    }

    #[test]
    fn self_referencing_definition_hits_the_depth_limit() {
        let mut doc = Document::with_version("1.5");
        let id = doc.new_object_id();
        doc.objects
            .insert(id, Object::Array(vec![name("Pattern"), Object::Reference(id)]));
        let err = resolve_color_space_object(&Object::Reference(id), Some(&doc), DEPTH).unwrap_err();
        assert!(matches!(
            err,
            BackendError::Core(PdfError::ResourceLimitExceeded { ref limit_name, .. }) if limit_name == "max_color_depth"
        ));
    }

    #[test]
    fn deep_separation_chain_is_an_error_not_a_default() {
        let mut space = name("DeviceRGB");
        for i in 0..9 {
            space = Object::Array(vec![name("Separation"), name(&format!("Ink{i}")), space, Object::Null]);
        }
        let resources = dictionary! { "ColorSpace" => dictionary! { "CS0" => space.clone() } };
        assert!(resolve_color_space_name("CS0", None, &resources, 8).is_err());
        let resolved = resolve_color_space_name("CS0", None, &resources, DEPTH).unwrap().unwrap();
        assert_eq!(resolved.color_from(&[1.0]).map(|c| c.kind()), Some(pdfx_core::ColorKind::Separation));
    }

    #[test]
    fn missing_alternate_leaves_space_unresolved() {
        let sep = Object::Array(vec![name("Separation"), name("Gold"), name("NoSuchSpace"), Object::Null]);
        assert_eq!(object(&sep, None), None);
        let indexed = Object::Array(vec![name("Indexed"), Object::Integer(7), Object::Integer(0), Object::Null]);
        assert_eq!(object(&indexed, None), None);
    }
}
