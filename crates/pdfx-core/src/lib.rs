//! pdfx-core: Backend-independent color model and conformance types.
//!
//! This crate provides the color values a PDF content stream can express
//! ([`Color`], [`ColorSpace`]), the conversion engine that maps Gray and
//! RGB into an output CMYK profile ([`ColorSpaceConverter`]), and the
//! PDF/X conformance vocabulary ([`ConformanceLevel`], [`PolicyViolation`]).
//! It has no PDF parser dependency; see `pdfx-parse` for the interpreter.

pub mod color;
pub mod conformance;
pub mod convert;
pub mod error;
pub mod options;

pub use color::{Color, ColorKind, ColorSpace, normalize};
pub use conformance::{ConformanceKey, ConformanceLevel, PolicyViolation, UnknownLevel};
pub use convert::{
    CalibrationProfile, ColorSpaceConverter, DeviceCmykProfile, GrayProfile, OutputProfile,
    SrgbProfile,
};
pub use error::PdfError;
pub use options::PdfxOptions;
