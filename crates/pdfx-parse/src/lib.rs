//! pdfx-parse: content stream interpreter, color rewriter and conformance
//! checker.
//!
//! The [`tokenizer`] splits a content stream into operand groups, the
//! [`interpreter`] replays them through an [`OperatorRegistry`], and two
//! registry owners give the stream meaning: [`ContentRewriter`] converts
//! device colors to the output profile, [`ContentChecker`] enforces a
//! conformance level. PDF objects come from `lopdf`.

pub mod checker;
pub mod color_space;
pub mod conformance;
pub mod error;
pub mod interpreter;
pub mod interpreter_state;
pub mod lopdf_backend;
pub mod registry;
pub mod rewriter;
pub mod serialize;
pub mod tokenizer;

pub use checker::ContentChecker;
pub use color_space::{resolve_color_space_name, resolve_color_space_object};
pub use conformance::{FontSubject, Subject, check};
pub use error::BackendError;
pub use interpreter::{ContentState, Interpreter, interpret};
pub use interpreter_state::{ColorSpaceState, PaintTarget};
pub use registry::{OperatorContext, OperatorHandler, OperatorRegistry};
pub use rewriter::ContentRewriter;
pub use tokenizer::{ContentParser, Operand, Operator, tokenize};

pub use lopdf;
pub use pdfx_core;
