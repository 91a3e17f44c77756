//! Error types for the interpreter, rewriter and checker.
//!
//! Uses [`thiserror`] for derivation. [`BackendError`] converts into the
//! core [`PdfError`] so callers of the facade see a single error type.

use pdfx_core::{PdfError, PolicyViolation};
use thiserror::Error;

/// Error type for content stream interpretation and policy checks.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Error reading the PDF object structure.
    #[error("PDF parse error: {0}")]
    Parse(String),

    /// Malformed content stream syntax.
    #[error("interpreter error: {0}")]
    Interpreter(String),

    /// A recognized operator received operands of the wrong number or type.
    #[error("malformed operands for '{operator}': {message}")]
    MalformedOperands { operator: String, message: String },

    /// The same operator name was registered twice.
    #[error("operator '{0}' already registered")]
    DuplicateOperator(String),

    /// A construct is not allowed under the active conformance level.
    #[error(transparent)]
    Violation(#[from] PolicyViolation),

    /// Error reading data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A core library error.
    #[error(transparent)]
    Core(#[from] PdfError),
}

impl BackendError {
    pub(crate) fn malformed(operator: &str, message: impl Into<String>) -> Self {
        BackendError::MalformedOperands {
            operator: operator.to_string(),
            message: message.into(),
        }
    }

    /// Returns the violation if this error is a conformance failure.
    pub fn violation(&self) -> Option<&PolicyViolation> {
        match self {
            BackendError::Violation(v) => Some(v),
            BackendError::Core(e) => e.violation(),
            _ => None,
        }
    }
}

impl From<lopdf::Error> for BackendError {
    fn from(err: lopdf::Error) -> Self {
        BackendError::Parse(err.to_string())
    }
}

impl From<BackendError> for PdfError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Parse(msg) => PdfError::ParseError(msg),
            BackendError::Interpreter(msg) => PdfError::InterpreterError(msg),
            e @ (BackendError::MalformedOperands { .. } | BackendError::DuplicateOperator(_)) => {
                PdfError::InterpreterError(e.to_string())
            }
            BackendError::Violation(v) => PdfError::Conformance(v),
            BackendError::Io(e) => PdfError::Other(format!("I/O error: {e}")),
            BackendError::Core(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfx_core::ConformanceKey;

    #[test]
    fn malformed_operands_message() {
        let err = BackendError::malformed("rg", "expected 3 operands, found 2");
        assert_eq!(
            err.to_string(),
            "malformed operands for 'rg': expected 3 operands, found 2"
        );
    }

    #[test]
    fn duplicate_operator_message() {
        let err = BackendError::DuplicateOperator("k".to_string());
        assert_eq!(err.to_string(), "operator 'k' already registered");
    }

    #[test]
    fn violation_is_transparent() {
        let err: BackendError = PolicyViolation::rgb_not_allowed(ConformanceKey::Color).into();
        assert_eq!(
            err.to_string(),
            "PDF/X conformance violation [COLOR]: Colorspace RGB is not allowed."
        );
        assert_eq!(err.violation().map(|v| v.key), Some(ConformanceKey::Color));
    }

    #[test]
    fn to_pdf_error() {
        let pdf_err: PdfError = BackendError::Parse("bad xref".to_string()).into();
        assert_eq!(pdf_err, PdfError::ParseError("bad xref".to_string()));

        let pdf_err: PdfError = BackendError::Interpreter("unterminated array".to_string()).into();
        assert_eq!(
            pdf_err,
            PdfError::InterpreterError("unterminated array".to_string())
        );

        let pdf_err: PdfError = BackendError::malformed("g", "expected a number").into();
        assert!(matches!(pdf_err, PdfError::InterpreterError(ref m) if m.contains("'g'")));

        let v = PolicyViolation::new(ConformanceKey::Layer, "Layers are not allowed.");
        let pdf_err: PdfError = BackendError::Violation(v.clone()).into();
        assert_eq!(pdf_err, PdfError::Conformance(v));
    }

    #[test]
    fn core_passthrough() {
        let original = PdfError::ResourceLimitExceeded {
            limit_name: "max_color_depth".to_string(),
            limit_value: 16,
            actual_value: 17,
        };
        let pdf_err: PdfError = BackendError::Core(original.clone()).into();
        assert_eq!(pdf_err, original);
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: BackendError = io_err.into();
        assert!(matches!(err, BackendError::Io(_)));
        let pdf_err: PdfError = err.into();
        assert!(pdf_err.to_string().contains("file missing"));
    }
}
