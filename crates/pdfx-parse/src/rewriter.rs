//! Content rewriter: re-emits a content stream with device colors converted
//! to the output profile.
//!
//! The six device color operators (`g G rg RG k K`) are replaced by the
//! operator matching the converted color's kind. Every other operator is
//! serialized back unchanged, one operator per line.

use lopdf::Dictionary;
use pdfx_core::{Color, ColorKind, ColorSpaceConverter, PdfxOptions};

use crate::error::BackendError;
use crate::interpreter::{ContentState, Interpreter, numeric_operands};
use crate::interpreter_state::PaintTarget;
use crate::registry::{OperatorContext, OperatorHandler, OperatorRegistry};
use crate::serialize::{write_color_operator, write_operator};
use crate::tokenizer::Operator;

/// Output buffer and converter for one rewrite.
struct RewriteRun {
    converter: ColorSpaceConverter,
    out: Vec<u8>,
}

impl ContentState for RewriteRun {
    fn unhandled(&mut self, operator: &Operator) -> Result<(), BackendError> {
        write_operator(&mut self.out, operator);
        self.out.push(b'\n');
        Ok(())
    }
}

impl RewriteRun {
    fn emit(&mut self, color: &Color, target: PaintTarget) {
        let converted = self.converter.convert(color);
        // convert only ever yields device colors for device input
        let Some(components) = converted.components() else {
            return;
        };
        let operator = device_operator(converted.kind(), target);
        write_color_operator(&mut self.out, &components, operator);
    }
}

fn device_operator(kind: ColorKind, target: PaintTarget) -> &'static str {
    match (kind, target) {
        (ColorKind::Gray, PaintTarget::Stroke) => "G",
        (ColorKind::Gray, PaintTarget::Fill) => "g",
        (ColorKind::Rgb, PaintTarget::Stroke) => "RG",
        (ColorKind::Rgb, PaintTarget::Fill) => "rg",
        (_, PaintTarget::Stroke) => "K",
        (_, PaintTarget::Fill) => "k",
    }
}

fn gray(run: &mut RewriteRun, ctx: OperatorContext<'_>) -> Result<(), BackendError> {
    let v = numeric_operands(ctx.operator, 1)?;
    run.emit(&Color::gray(v[0]), PaintTarget::of_operator(&ctx.operator.name));
    Ok(())
}

fn rgb(run: &mut RewriteRun, ctx: OperatorContext<'_>) -> Result<(), BackendError> {
    let v = numeric_operands(ctx.operator, 3)?;
    run.emit(&Color::rgb(v[0], v[1], v[2]), PaintTarget::of_operator(&ctx.operator.name));
    Ok(())
}

fn cmyk(run: &mut RewriteRun, ctx: OperatorContext<'_>) -> Result<(), BackendError> {
    let v = numeric_operands(ctx.operator, 4)?;
    run.emit(
        &Color::cmyk(v[0], v[1], v[2], v[3]),
        PaintTarget::of_operator(&ctx.operator.name),
    );
    Ok(())
}

/// Rewrites content streams through a [`ColorSpaceConverter`].
///
/// Immutable after construction; one instance can serve any number of
/// streams, from any number of threads.
#[derive(Debug)]
pub struct ContentRewriter {
    registry: OperatorRegistry<RewriteRun>,
    converter: ColorSpaceConverter,
    max_stream_bytes: usize,
}

impl ContentRewriter {
    /// Build a rewriter converting to `converter`'s output profile.
    pub fn new(converter: ColorSpaceConverter) -> Result<Self, BackendError> {
        let entries: [(&'static str, OperatorHandler<RewriteRun>); 6] = [
            ("g", gray),
            ("G", gray),
            ("rg", rgb),
            ("RG", rgb),
            ("k", cmyk),
            ("K", cmyk),
        ];
        let registry = OperatorRegistry::from_entries(&entries)?;
        Ok(Self {
            registry,
            converter,
            max_stream_bytes: PdfxOptions::default().max_stream_bytes,
        })
    }

    /// Apply the stream size limit from `options`.
    pub fn with_options(mut self, options: &PdfxOptions) -> Self {
        self.max_stream_bytes = options.max_stream_bytes;
        self
    }

    pub fn converter(&self) -> &ColorSpaceConverter {
        &self.converter
    }

    /// Rewrite `content`, returning the new stream bytes.
    ///
    /// # Errors
    ///
    /// Fails on malformed syntax, wrong operand counts for a color
    /// operator, or a stream over the size limit. No partial output is
    /// returned.
    pub fn rewrite(&self, content: &[u8], resources: &Dictionary) -> Result<Vec<u8>, BackendError> {
        #[cfg(feature = "tracing")]
        tracing::debug!(bytes = content.len(), "rewrite start");

        let mut run = RewriteRun {
            converter: self.converter.clone(),
            out: Vec::with_capacity(content.len()),
        };
        let count = Interpreter::new(&self.registry)
            .with_max_stream_bytes(self.max_stream_bytes)
            .run(content, resources, None, &mut run)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(operators = count, bytes = run.out.len(), "rewrite done");
        #[cfg(not(feature = "tracing"))]
        let _ = count;

        Ok(run.out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfx_core::PdfError;

    fn rewrite(content: &str) -> Result<String, BackendError> {
        let rewriter = ContentRewriter::new(ColorSpaceConverter::device_cmyk())?;
        let out = rewriter.rewrite(content.as_bytes(), &Dictionary::new())?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn converts_rgb_fill_and_passes_path_operators() {
        assert_eq!(
            rewrite("1 0 0 rg 0 0 100 100 re f").unwrap(),
            "0 1 1 0 k\n0 0 100 100 re\nf\n"
        );
    }

    #[test]
    fn stroke_operators_stay_stroke() {
        assert_eq!(rewrite("0 0 1 RG").unwrap(), "1 1 0 0 K\n");
        assert_eq!(rewrite("0 G").unwrap(), "0 0 0 1 K\n");
        assert_eq!(rewrite("1 g").unwrap(), "0 0 0 0 k\n");
    }

    #[test]
    fn cmyk_is_reemitted_unchanged() {
        assert_eq!(rewrite("0.1 0.2 0.3 0.4 k").unwrap(), "0.1 0.2 0.3 0.4 k\n");
        assert_eq!(rewrite("0 0 0 1 K").unwrap(), "0 0 0 1 K\n");
    }

    #[test]
    fn out_of_range_operands_are_clamped() {
        assert_eq!(rewrite("2 -1 0 0.5 k").unwrap(), "1 0 0 0.5 k\n");
    }

    #[test]
    fn other_operators_round_trip_textually() {
        let out = rewrite("q /GS0 gs BT /F1 12 Tf (Hi) Tj ET Q").unwrap();
        assert_eq!(out, "q\n/GS0 gs\nBT\n/F1 12 Tf\n(Hi) Tj\nET\nQ\n");
    }

    #[test]
    fn rewritten_cmyk_reverses_to_the_source_rgb() {
        let converter = ColorSpaceConverter::device_cmyk();
        for (r, g, b) in [(0.2, 0.4, 0.6), (0.9, 0.1, 0.5), (0.0, 0.0, 0.0), (1.0, 1.0, 1.0)] {
            let out = rewrite(&format!("{r} {g} {b} rg")).unwrap();
            let ops = crate::tokenizer::tokenize(out.as_bytes()).unwrap();
            assert_eq!(ops.len(), 1);
            assert_eq!(ops[0].name, "k");
            let cmyk: Vec<f32> = ops[0].operands.iter().map(|o| o.as_number().unwrap() as f32).collect();
            let Color::Rgb(r2, g2, b2) = converter.reverse(cmyk[0], cmyk[1], cmyk[2], cmyk[3]) else {
                panic!("reverse must produce RGB");
            };
            for (got, want) in [(r2, r), (g2, g), (b2, b)] {
                assert!((got - want).abs() < 0.01, "{got} vs {want} for {out}");
            }
        }
    }

    #[test]
    fn type3_glyph_metrics_pass_through() {
        assert_eq!(
            rewrite("750 0 d0 0 0 750 750 re f").unwrap(),
            "750 0 d0\n0 0 750 750 re\nf\n"
        );
        assert_eq!(
            rewrite("500 0 0 0 400 700 d1 1 0 0 rg").unwrap(),
            "500 0 0 0 400 700 d1\n0 1 1 0 k\n"
        );
    }

    #[test]
    fn wrong_operand_count_fails() {
        let err = rewrite("1 0 rg").unwrap_err();
        assert!(matches!(err, BackendError::MalformedOperands { ref operator, .. } if operator == "rg"));
        assert!(rewrite("/Name g").is_err());
    }

    #[test]
    fn stream_limit_applies() {
        let options = PdfxOptions {
            max_stream_bytes: 8,
            ..PdfxOptions::default()
        };
        let rewriter = ContentRewriter::new(ColorSpaceConverter::device_cmyk())
            .unwrap()
            .with_options(&options);
        let err = rewriter
            .rewrite(b"0 0 100 100 re f", &Dictionary::new())
            .unwrap_err();
        assert!(matches!(err, BackendError::Core(PdfError::ResourceLimitExceeded { .. })));
    }

    #[test]
    fn rewriter_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ContentRewriter>();
    }
}
