//! Error types for pdfx-rs.
//!
//! [`PdfError`] covers every fatal condition: malformed content, unusable
//! calibration profiles, exceeded resource limits and conformance
//! violations. There is no warning channel; the first failure ends the
//! current operation.

use std::fmt;

use crate::conformance::PolicyViolation;

/// Fatal error types for content conversion and conformance checking.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfError {
    /// Error parsing PDF structure or syntax.
    ParseError(String),
    /// Error during content stream interpretation.
    InterpreterError(String),
    /// The calibration profile could not be used.
    ProfileError(String),
    /// A construct is not allowed under the active conformance level.
    Conformance(PolicyViolation),
    /// A configured resource limit was exceeded.
    ResourceLimitExceeded {
        /// Name of the limit that was exceeded (e.g., "max_color_depth").
        limit_name: String,
        /// The configured limit value.
        limit_value: usize,
        /// The actual value that exceeded the limit.
        actual_value: usize,
    },
    /// Any other error not covered by specific variants.
    Other(String),
}

impl PdfError {
    /// Returns the violation if this error is a conformance failure.
    pub fn violation(&self) -> Option<&PolicyViolation> {
        match self {
            PdfError::Conformance(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for PdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfError::ParseError(msg) => write!(f, "parse error: {msg}"),
            PdfError::InterpreterError(msg) => write!(f, "interpreter error: {msg}"),
            PdfError::ProfileError(msg) => write!(f, "profile error: {msg}"),
            PdfError::Conformance(v) => write!(f, "{v}"),
            PdfError::ResourceLimitExceeded {
                limit_name,
                limit_value,
                actual_value,
            } => write!(
                f,
                "resource limit exceeded: {limit_name} (limit: {limit_value}, actual: {actual_value})"
            ),
            PdfError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for PdfError {}

impl From<PolicyViolation> for PdfError {
    fn from(v: PolicyViolation) -> Self {
        PdfError::Conformance(v)
    }
}
