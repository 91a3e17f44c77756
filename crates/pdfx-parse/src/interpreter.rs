//! Content stream interpreter.
//!
//! Replays a content stream operand group by operand group and dispatches
//! each operator through an [`OperatorRegistry`]. Registered operators run
//! their handler; everything else goes to [`ContentState::unhandled`].
//! The first error stops the run.

use lopdf::{Dictionary, Document};
use pdfx_core::PdfError;

use crate::error::BackendError;
use crate::interpreter_state::ColorSpaceState;
use crate::registry::{OperatorContext, OperatorRegistry};
use crate::tokenizer::{ContentParser, Operand, Operator};

/// Per-run state of an interpreter owner.
pub trait ContentState {
    /// Called for operators without a registered handler.
    fn unhandled(&mut self, _operator: &Operator) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Drives a registry over content streams.
pub struct Interpreter<'r, S> {
    registry: &'r OperatorRegistry<S>,
    max_stream_bytes: usize,
}

impl<'r, S: ContentState> Interpreter<'r, S> {
    pub fn new(registry: &'r OperatorRegistry<S>) -> Self {
        Self {
            registry,
            max_stream_bytes: usize::MAX,
        }
    }

    /// Reject content streams longer than `limit` bytes.
    pub fn with_max_stream_bytes(mut self, limit: usize) -> Self {
        self.max_stream_bytes = limit;
        self
    }

    /// Interpret `content` with a fresh color space state.
    ///
    /// Returns the number of operators processed.
    ///
    /// # Errors
    ///
    /// Malformed syntax, handler failures and an oversized stream
    /// ([`PdfError::ResourceLimitExceeded`]) end the run.
    pub fn run(
        &self,
        content: &[u8],
        resources: &Dictionary,
        document: Option<&Document>,
        state: &mut S,
    ) -> Result<usize, BackendError> {
        if content.len() > self.max_stream_bytes {
            return Err(PdfError::ResourceLimitExceeded {
                limit_name: "max_stream_bytes".to_string(),
                limit_value: self.max_stream_bytes,
                actual_value: content.len(),
            }
            .into());
        }

        let mut color_spaces = ColorSpaceState::new();
        let mut count = 0;
        for op in ContentParser::new(content) {
            let op = op?;
            count += 1;
            match self.registry.lookup(&op.name) {
                Some(handler) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(operator = %op.name, operands = op.operands.len(), "dispatch");
                    handler(
                        state,
                        OperatorContext {
                            operator: &op,
                            resources,
                            document,
                            color_spaces: &mut color_spaces,
                        },
                    )?;
                }
                None => state.unhandled(&op)?,
            }
        }
        Ok(count)
    }
}

/// Interpret `content` through `registry` without a backing document.
///
/// Indirect references in `resources` cannot be resolved in this mode.
pub fn interpret<S: ContentState>(
    content: &[u8],
    resources: &Dictionary,
    registry: &OperatorRegistry<S>,
    state: &mut S,
) -> Result<usize, BackendError> {
    Interpreter::new(registry).run(content, resources, None, state)
}

/// Read `count` numeric operands, exactly.
pub(crate) fn numeric_operands(op: &Operator, count: usize) -> Result<Vec<f32>, BackendError> {
    if op.operands.len() != count {
        return Err(BackendError::malformed(
            &op.name,
            format!("expected {count} operands, found {}", op.operands.len()),
        ));
    }
    numbers(op, &op.operands)
}

/// Read every operand in `operands` as a number.
pub(crate) fn numbers(op: &Operator, operands: &[Operand]) -> Result<Vec<f32>, BackendError> {
    operands
        .iter()
        .map(|o| {
            o.as_number()
                .map(|n| n as f32)
                .ok_or_else(|| BackendError::malformed(&op.name, format!("expected a number, found {o:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter_state::PaintTarget;

    #[derive(Default)]
    struct Recorder {
        handled: Vec<String>,
        passed: Vec<String>,
        fill_spaces: Vec<Option<String>>,
    }

    impl ContentState for Recorder {
        fn unhandled(&mut self, operator: &Operator) -> Result<(), BackendError> {
            self.passed.push(operator.name.clone());
            Ok(())
        }
    }

    fn record(state: &mut Recorder, ctx: OperatorContext<'_>) -> Result<(), BackendError> {
        state.handled.push(ctx.operator.name.clone());
        Ok(())
    }

    fn set_space(state: &mut Recorder, ctx: OperatorContext<'_>) -> Result<(), BackendError> {
        let name = ctx.operator.operands[0].as_name().unwrap_or_default().to_string();
        ctx.color_spaces.set(PaintTarget::of_operator(&ctx.operator.name), name);
        state.fill_spaces.push(ctx.color_spaces.fill.clone());
        Ok(())
    }

    fn gray(_state: &mut Recorder, ctx: OperatorContext<'_>) -> Result<(), BackendError> {
        numeric_operands(ctx.operator, 1).map(|_| ())
    }

    fn registry() -> OperatorRegistry<Recorder> {
        OperatorRegistry::<Recorder>::from_entries(&[("rg", record), ("cs", set_space), ("g", gray)]).unwrap()
    }

    #[test]
    fn dispatches_registered_and_passes_others() {
        let registry = registry();
        let mut state = Recorder::default();
        let count = interpret(
            b"1 0 0 rg 0 0 100 100 re f",
            &Dictionary::new(),
            &registry,
            &mut state,
        )
        .unwrap();
        assert_eq!(count, 3);
        assert_eq!(state.handled, vec!["rg"]);
        assert_eq!(state.passed, vec!["re", "f"]);
    }

    #[test]
    fn color_space_state_is_fresh_per_run() {
        let registry = registry();
        let mut state = Recorder::default();
        let resources = Dictionary::new();
        interpret(b"/Pattern cs", &resources, &registry, &mut state).unwrap();
        interpret(b"/DeviceGray cs", &resources, &registry, &mut state).unwrap();
        assert_eq!(
            state.fill_spaces,
            vec![Some("Pattern".to_string()), Some("DeviceGray".to_string())]
        );
    }

    #[test]
    fn handler_error_stops_run() {
        let registry = registry();
        let mut state = Recorder::default();
        let err = interpret(b"0.5 0.5 g 1 0 0 rg", &Dictionary::new(), &registry, &mut state)
            .unwrap_err();
        assert!(matches!(err, BackendError::MalformedOperands { ref operator, .. } if operator == "g"));
        assert!(state.handled.is_empty());
    }

    #[test]
    fn syntax_error_stops_run() {
        let registry = registry();
        let mut state = Recorder::default();
        let err = interpret(b"q (oops", &Dictionary::new(), &registry, &mut state).unwrap_err();
        assert!(matches!(err, BackendError::Interpreter(_)));
        assert_eq!(state.passed, vec!["q"]);
    }

    #[test]
    fn oversized_stream_is_rejected() {
        let registry = registry();
        let mut state = Recorder::default();
        let err = Interpreter::new(&registry)
            .with_max_stream_bytes(4)
            .run(b"0 0 100 100 re f", &Dictionary::new(), None, &mut state)
            .unwrap_err();
        assert!(matches!(
            err,
            BackendError::Core(PdfError::ResourceLimitExceeded { actual_value: 16, .. })
        ));
    }

    #[test]
    fn numeric_operand_checks() {
        let op = Operator::new("k", vec![Operand::Integer(1)]);
        assert!(numeric_operands(&op, 4).is_err());
        let op = Operator::new("g", vec![Operand::Name("x".to_string())]);
        assert!(numeric_operands(&op, 1).is_err());
        let op = Operator::new("g", vec![Operand::Real(0.5)]);
        assert_eq!(numeric_operands(&op, 1).unwrap(), vec![0.5]);
    }
}
