//! Content checker: walks a content stream and checks every selected
//! color against the conformance level.
//!
//! `CS`/`cs` record the current color space name. `SC`/`SCN`/`sc`/`scn`
//! build a color from that space and their operands; `g G rg RG k K` build
//! device colors directly. Pattern colors are resolved through the
//! `/Pattern` resources: a shading pattern yields its shading color space,
//! an uncolored tiling pattern the color in its underlying space, and a
//! colored tiling pattern has its own content checked with a fresh checker.

use lopdf::{Dictionary, Document, Object};
use pdfx_core::{Color, ColorSpace, PdfError, PdfxOptions};

use crate::color_space::{resolve_color_space_name, resolve_color_space_object};
use crate::conformance::{Subject, check};
use crate::error::BackendError;
use crate::interpreter::{ContentState, Interpreter, numbers, numeric_operands};
use crate::interpreter_state::PaintTarget;
use crate::lopdf_backend::{decode_content_stream, empty_dictionary, get_dict, get_resolved, resolve};
use crate::registry::{OperatorContext, OperatorHandler, OperatorRegistry};
use crate::tokenizer::Operand;

/// Per-run state: the options in force and the nesting depth.
struct CheckRun {
    options: PdfxOptions,
    depth: usize,
}

impl ContentState for CheckRun {}

impl CheckRun {
    fn check_color(&self, color: &Color) -> Result<(), BackendError> {
        check(&Subject::Color(color), self.options.level, &self.options)
    }
}

fn set_color_space(_run: &mut CheckRun, ctx: OperatorContext<'_>) -> Result<(), BackendError> {
    let op = ctx.operator;
    let name = match op.operands.as_slice() {
        [operand] => operand
            .as_name()
            .ok_or_else(|| BackendError::malformed(&op.name, "expected a color space name"))?,
        _ => {
            return Err(BackendError::malformed(
                &op.name,
                format!("expected 1 operand, found {}", op.operands.len()),
            ));
        }
    };
    ctx.color_spaces.set(PaintTarget::of_operator(&op.name), name);
    Ok(())
}

fn set_color(run: &mut CheckRun, ctx: OperatorContext<'_>) -> Result<(), BackendError> {
    let op = ctx.operator;
    let target = PaintTarget::of_operator(&op.name);
    // initial space is DeviceGray, which every level allows
    let Some(space_name) = ctx.color_spaces.current(target) else {
        return Ok(());
    };
    let max_depth = run.options.max_color_depth;
    let Some(space) = resolve_color_space_name(space_name, ctx.document, ctx.resources, max_depth)? else {
        #[cfg(feature = "tracing")]
        tracing::warn!(name = space_name, operator = %op.name, "unresolved color space, skipping");
        return Ok(());
    };

    if let ColorSpace::Pattern { underlying } = &space {
        let (components, pattern) = match op.operands.split_last() {
            Some((Operand::Name(pattern), rest)) => (numbers(op, rest)?, pattern),
            _ => return Err(BackendError::malformed(&op.name, "expected a pattern name")),
        };
        return check_pattern(run, &ctx, pattern, underlying.as_deref(), &components);
    }

    let components = numbers(op, &op.operands)?;
    if components.len() != space.num_components() as usize {
        return Err(BackendError::malformed(
            &op.name,
            format!(
                "expected {} operands, found {}",
                space.num_components(),
                components.len()
            ),
        ));
    }
    match space.color_from(&components) {
        Some(color) => run.check_color(&color),
        None => Ok(()),
    }
}

fn check_pattern(
    run: &CheckRun,
    ctx: &OperatorContext<'_>,
    name: &str,
    underlying: Option<&ColorSpace>,
    components: &[f32],
) -> Result<(), BackendError> {
    let doc = ctx.document;
    let Some(pattern) = get_dict(doc, ctx.resources, b"Pattern")
        .and_then(|patterns| patterns.get(name.as_bytes()).ok())
        .map(|obj| resolve(doc, obj))
    else {
        #[cfg(feature = "tracing")]
        tracing::warn!(name, "unresolved pattern, skipping");
        return Ok(());
    };

    let dict = match pattern {
        Object::Dictionary(d) => d,
        Object::Stream(s) => &s.dict,
        _ => return Ok(()),
    };
    let pattern_type = get_resolved(doc, dict, b"PatternType").and_then(|o| o.as_i64().ok());
    match pattern_type {
        Some(2) => {
            let space = match get_dict(doc, dict, b"Shading").and_then(|shading| get_resolved(doc, shading, b"ColorSpace")) {
                Some(cs) => resolve_color_space_object(cs, doc, run.options.max_color_depth)?,
                None => None,
            };
            match space {
                Some(space) => run.check_color(&Color::shading(space)),
                None => Ok(()),
            }
        }
        Some(1) => {
            let paint_type = get_resolved(doc, dict, b"PaintType").and_then(|o| o.as_i64().ok());
            if paint_type == Some(2) {
                let color = underlying.and_then(|space| space.color_from(components));
                return match color {
                    Some(color) => run.check_color(&Color::pattern(color)),
                    None => Ok(()),
                };
            }
            let Object::Stream(stream) = pattern else {
                return Ok(());
            };
            let content = decode_content_stream(stream)?;
            let resources = get_dict(doc, &stream.dict, b"Resources").unwrap_or(empty_dictionary());
            ContentChecker::new()?.check_at(&content, resources, doc, &run.options, run.depth + 1)
        }
        _ => Ok(()),
    }
}

fn gray(run: &mut CheckRun, ctx: OperatorContext<'_>) -> Result<(), BackendError> {
    let v = numeric_operands(ctx.operator, 1)?;
    run.check_color(&Color::gray(v[0]))
}

fn rgb(run: &mut CheckRun, ctx: OperatorContext<'_>) -> Result<(), BackendError> {
    let v = numeric_operands(ctx.operator, 3)?;
    run.check_color(&Color::rgb(v[0], v[1], v[2]))
}

fn cmyk(run: &mut CheckRun, ctx: OperatorContext<'_>) -> Result<(), BackendError> {
    let v = numeric_operands(ctx.operator, 4)?;
    run.check_color(&Color::cmyk(v[0], v[1], v[2], v[3]))
}

/// Checks the colors a content stream selects.
#[derive(Debug)]
pub struct ContentChecker {
    registry: OperatorRegistry<CheckRun>,
}

impl ContentChecker {
    pub fn new() -> Result<Self, BackendError> {
        let entries: [(&'static str, OperatorHandler<CheckRun>); 12] = [
            ("CS", set_color_space),
            ("cs", set_color_space),
            ("SC", set_color),
            ("SCN", set_color),
            ("sc", set_color),
            ("scn", set_color),
            ("g", gray),
            ("G", gray),
            ("rg", rgb),
            ("RG", rgb),
            ("k", cmyk),
            ("K", cmyk),
        ];
        Ok(Self {
            registry: OperatorRegistry::from_entries(&entries)?,
        })
    }

    /// Check `content` under `options.level`.
    ///
    /// Named color spaces and patterns resolve through `resources`, and
    /// through `document` for indirect objects.
    ///
    /// # Errors
    ///
    /// The first violation ends the check. Malformed operands and limits
    /// from `options` are errors too.
    pub fn check_content(
        &self,
        content: &[u8],
        resources: &Dictionary,
        document: Option<&Document>,
        options: &PdfxOptions,
    ) -> Result<(), BackendError> {
        self.check_at(content, resources, document, options, 0)
    }

    /// Check a stream nested `depth` levels below a page.
    pub fn check_at(
        &self,
        content: &[u8],
        resources: &Dictionary,
        document: Option<&Document>,
        options: &PdfxOptions,
        depth: usize,
    ) -> Result<(), BackendError> {
        if !options.level.is_pdfx() {
            return Ok(());
        }
        if depth > options.max_recursion_depth {
            return Err(PdfError::ResourceLimitExceeded {
                limit_name: "max_recursion_depth".to_string(),
                limit_value: options.max_recursion_depth,
                actual_value: depth,
            }
            .into());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(level = %options.level, depth, bytes = content.len(), "check start");

        let mut run = CheckRun {
            options: options.clone(),
            depth,
        };
        let count = Interpreter::new(&self.registry)
            .with_max_stream_bytes(options.max_stream_bytes)
            .run(content, resources, document, &mut run)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(operators = count, depth, "check done");
        #[cfg(not(feature = "tracing"))]
        let _ = count;

        Ok(())
    }
}
