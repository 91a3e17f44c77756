//! Conformance policy checks.
//!
//! [`check`] evaluates one [`Subject`] against a [`ConformanceLevel`]. Every
//! check is a no-op when the level is [`ConformanceLevel::None`]. Color rules
//! apply only under the strict PDF/X-1a level; font, image, graphics state
//! and layer rules apply to every requested level.

use lopdf::{Dictionary, Document, Object, Stream};
use pdfx_core::{
    Color, ColorSpace, ConformanceKey, ConformanceLevel, PdfError, PdfxOptions, PolicyViolation,
};

use crate::checker::ContentChecker;
use crate::color_space::resolve_color_space_object;
use crate::error::BackendError;
use crate::lopdf_backend::{decode_content_stream, empty_dictionary, get_dict, get_resolved, name_of, number_of, resolve};

/// Something that can be checked for conformance.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    /// A color selected by a content stream.
    Color(&'a Color),
    /// Use of the DeviceCMYK space.
    Cmyk,
    /// Use of an RGB space.
    Rgb,
    /// A font used by the document.
    Font(&'a FontSubject),
    /// An image XObject dictionary.
    Image {
        dict: &'a Dictionary,
        document: Option<&'a Document>,
    },
    /// An `/ExtGState` parameter dictionary. Indirect values are
    /// resolved through `document`.
    GraphicsState {
        dict: &'a Dictionary,
        document: Option<&'a Document>,
    },
    /// Optional content (layers).
    Layer,
    /// A nested content stream, such as a Form XObject.
    Content {
        document: Option<&'a Document>,
        stream: &'a Stream,
    },
}

impl Subject<'_> {
    pub fn key(&self) -> ConformanceKey {
        match self {
            Subject::Color(_) => ConformanceKey::Color,
            Subject::Cmyk => ConformanceKey::Cmyk,
            Subject::Rgb => ConformanceKey::Rgb,
            Subject::Font(_) => ConformanceKey::Font,
            Subject::Image { .. } => ConformanceKey::Image,
            Subject::GraphicsState { .. } => ConformanceKey::GraphicsState,
            Subject::Layer => ConformanceKey::Layer,
            Subject::Content { .. } => ConformanceKey::Content,
        }
    }
}

/// Font facts relevant to conformance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSubject {
    /// The `/BaseFont` name.
    pub name: String,
    /// Whether the font program is embedded.
    pub embedded: bool,
}

impl FontSubject {
    pub fn new(name: impl Into<String>, embedded: bool) -> Self {
        Self {
            name: name.into(),
            embedded,
        }
    }

    /// Inspect a font dictionary.
    ///
    /// Type3 fonts are always embedded. Type0 fonts are judged by their
    /// first descendant; simple fonts by `/FontFile`, `/FontFile2` or
    /// `/FontFile3` in the font descriptor.
    pub fn from_dictionary(doc: Option<&Document>, font: &Dictionary) -> Self {
        let name = get_resolved(doc, font, b"BaseFont")
            .and_then(name_of)
            .unwrap_or_else(|| "unknown".to_string());
        let subtype = get_resolved(doc, font, b"Subtype").and_then(name_of);

        let embedded = match subtype.as_deref() {
            Some("Type3") => true,
            Some("Type0") => descendant_font(doc, font).is_some_and(|d| has_font_file(doc, d)),
            _ => has_font_file(doc, font),
        };
        Self { name, embedded }
    }
}

fn descendant_font<'a>(doc: Option<&'a Document>, font: &'a Dictionary) -> Option<&'a Dictionary> {
    let descendants = get_resolved(doc, font, b"DescendantFonts")?.as_array().ok()?;
    resolve(doc, descendants.first()?).as_dict().ok()
}

fn has_font_file(doc: Option<&Document>, font: &Dictionary) -> bool {
    get_dict(doc, font, b"FontDescriptor").is_some_and(|descriptor| {
        [&b"FontFile"[..], b"FontFile2", b"FontFile3"]
            .iter()
            .any(|key| descriptor.has(key))
    })
}

/// Check `subject` against `level`.
///
/// # Errors
///
/// Returns [`BackendError::Violation`] for a disallowed construct, and
/// [`PdfError::ResourceLimitExceeded`] (wrapped) when a color nests deeper
/// than `options.max_color_depth` or a content stream is too large.
pub fn check(subject: &Subject<'_>, level: ConformanceLevel, options: &PdfxOptions) -> Result<(), BackendError> {
    if !level.is_pdfx() {
        return Ok(());
    }
    match *subject {
        Subject::Color(color) => {
            if level.is_strict() {
                check_color(color, options, 0)?;
            }
            Ok(())
        }
        Subject::Cmyk => Ok(()),
        Subject::Rgb => {
            if level.is_strict() {
                return Err(PolicyViolation::rgb_not_allowed(ConformanceKey::Rgb).into());
            }
            Ok(())
        }
        Subject::Font(font) => check_font(font),
        Subject::Image { dict, document } => check_image(dict, document, level, options),
        Subject::GraphicsState { dict, document } => check_graphics_state(dict, document),
        Subject::Layer => Err(PolicyViolation::new(ConformanceKey::Layer, "Layers are not allowed.").into()),
        Subject::Content { document, stream } => {
            let content = decode_content_stream(stream)?;
            let resources = get_dict(document, &stream.dict, b"Resources").unwrap_or(empty_dictionary());
            let options = PdfxOptions {
                level,
                ..options.clone()
            };
            ContentChecker::new()?.check_content(&content, resources, document, &options)
        }
    }
}

fn depth_exceeded(options: &PdfxOptions, depth: usize) -> BackendError {
    PdfError::ResourceLimitExceeded {
        limit_name: "max_color_depth".to_string(),
        limit_value: options.max_color_depth,
        actual_value: depth,
    }
    .into()
}

fn check_color(color: &Color, options: &PdfxOptions, depth: usize) -> Result<(), BackendError> {
    if depth > options.max_color_depth {
        return Err(depth_exceeded(options, depth));
    }
    match color {
        Color::Gray(_) | Color::Cmyk(..) => Ok(()),
        Color::Rgb(..) => Err(PolicyViolation::rgb_not_allowed(ConformanceKey::Color).into()),
        Color::Separation { alternate, .. } => check_color(alternate, options, depth + 1),
        Color::Shading(space) => check_space(space, options, depth + 1),
        Color::Pattern(default_color) => check_color(default_color, options, depth + 1),
    }
}

fn check_space(space: &ColorSpace, options: &PdfxOptions, depth: usize) -> Result<(), BackendError> {
    if depth > options.max_color_depth {
        return Err(depth_exceeded(options, depth));
    }
    match space {
        ColorSpace::DeviceGray | ColorSpace::DeviceCmyk | ColorSpace::CalGray | ColorSpace::Lab => Ok(()),
        ColorSpace::DeviceRgb => Err(PolicyViolation::rgb_not_allowed(ConformanceKey::Color).into()),
        ColorSpace::CalRgb => Err(calrgb_not_allowed(ConformanceKey::Color).into()),
        ColorSpace::IccBased { alternate, .. }
        | ColorSpace::Separation { alternate, .. }
        | ColorSpace::DeviceN { alternate, .. } => check_space(alternate, options, depth + 1),
        ColorSpace::Indexed { base, .. } => check_space(base, options, depth + 1),
        ColorSpace::Pattern { underlying } => match underlying {
            Some(space) => check_space(space, options, depth + 1),
            None => Ok(()),
        },
    }
}

fn calrgb_not_allowed(key: ConformanceKey) -> PolicyViolation {
    PolicyViolation::new(key, "Colorspace CalRGB is not allowed.")
}

fn check_font(font: &FontSubject) -> Result<(), BackendError> {
    if font.embedded {
        return Ok(());
    }
    Err(PolicyViolation::new(
        ConformanceKey::Font,
        format!("All the fonts must be embedded. This one isn't: {}", font.name),
    )
    .into())
}

fn check_image(
    dict: &Dictionary,
    doc: Option<&Document>,
    level: ConformanceLevel,
    options: &PdfxOptions,
) -> Result<(), BackendError> {
    if dict.has(b"SMask") {
        return Err(PolicyViolation::new(ConformanceKey::Image, "Soft masks are not allowed.").into());
    }
    if !level.is_strict() {
        return Ok(());
    }
    let Some(space) = get_resolved(doc, dict, b"ColorSpace") else {
        return Ok(());
    };
    match space {
        Object::Name(name) if name.as_slice() == b"DeviceRGB" => {
            Err(PolicyViolation::rgb_not_allowed(ConformanceKey::Image).into())
        }
        Object::Array(_) => match resolve_color_space_object(space, doc, options.max_color_depth)? {
            Some(ColorSpace::CalRgb) => Err(calrgb_not_allowed(ConformanceKey::Image).into()),
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}

fn check_graphics_state(dict: &Dictionary, doc: Option<&Document>) -> Result<(), BackendError> {
    if let Some(bm) = get_resolved(doc, dict, b"BM") {
        let mode = match bm {
            Object::Array(modes) => modes.first().map(|m| resolve(doc, m)).and_then(name_of),
            other => name_of(other),
        };
        match mode.as_deref() {
            None | Some("Normal") | Some("Compatible") => {}
            Some(mode) => {
                return Err(PolicyViolation::new(
                    ConformanceKey::GraphicsState,
                    format!("Blend mode {mode} not allowed."),
                )
                .into());
            }
        }
    }
    for key in ["CA", "ca"] {
        let alpha = get_resolved(doc, dict, key.as_bytes()).and_then(number_of);
        match alpha {
            Some(alpha) if alpha != 1.0 => {
                // lopdf stores reals as f32; report the value as written
                let alpha = alpha as f32;
                return Err(PolicyViolation::new(
                    ConformanceKey::GraphicsState,
                    format!("Transparency is not allowed: /{key} = {alpha}"),
                )
                .into());
            }
            _ => {}
        }
    }
    Ok(())
}
