//! Configuration for conversion and conformance checking.

use crate::conformance::ConformanceLevel;
use crate::error::PdfError;

/// Options shared by the content rewriter and the conformance checker.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfxOptions {
    /// Conformance level to enforce (default: `None`, checks disabled).
    pub level: ConformanceLevel,
    /// Maximum nesting of composite colors resolved during a check (default: 16).
    pub max_color_depth: usize,
    /// Maximum nesting of content streams (forms, tiling patterns) (default: 10).
    pub max_recursion_depth: usize,
    /// Maximum content stream bytes to process (default: 100 MB).
    pub max_stream_bytes: usize,
}

impl Default for PdfxOptions {
    fn default() -> Self {
        Self {
            level: ConformanceLevel::None,
            max_color_depth: 16,
            max_recursion_depth: 10,
            max_stream_bytes: 100 * 1024 * 1024,
        }
    }
}

impl PdfxOptions {
    /// Default limits with the given conformance level.
    pub fn with_level(level: ConformanceLevel) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// Fail if a content stream of `len` bytes exceeds `max_stream_bytes`.
    pub fn check_stream_len(&self, len: usize) -> Result<(), PdfError> {
        if len > self.max_stream_bytes {
            return Err(PdfError::ResourceLimitExceeded {
                limit_name: "max_stream_bytes".to_string(),
                limit_value: self.max_stream_bytes,
                actual_value: len,
            });
        }
        Ok(())
    }
}
