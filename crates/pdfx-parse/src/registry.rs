//! Operator registry: maps operator mnemonics to handler functions.
//!
//! A registry is built once, when its owner (rewriter or checker) is
//! constructed, and is read-only afterwards. Registering a name twice is a
//! setup error.

use std::collections::HashMap;
use std::fmt;

use lopdf::{Dictionary, Document};

use crate::error::BackendError;
use crate::interpreter_state::ColorSpaceState;
use crate::tokenizer::Operator;

/// Everything a handler sees for one dispatched operator.
pub struct OperatorContext<'a> {
    /// The operator and its operands.
    pub operator: &'a Operator,
    /// Resource dictionary of the stream being interpreted.
    pub resources: &'a Dictionary,
    /// Document used to resolve indirect references, when available.
    pub document: Option<&'a Document>,
    /// Current stroke/fill color space names.
    pub color_spaces: &'a mut ColorSpaceState,
}

/// Handler signature. `S` is the owner's per-run state.
pub type OperatorHandler<S> = fn(&mut S, OperatorContext<'_>) -> Result<(), BackendError>;

/// Mapping from operator name to handler, one handler per name.
pub struct OperatorRegistry<S> {
    handlers: HashMap<&'static str, OperatorHandler<S>>,
}

impl<S> OperatorRegistry<S> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Build a registry from `(name, handler)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::DuplicateOperator`] if a name repeats.
    pub fn from_entries(entries: &[(&'static str, OperatorHandler<S>)]) -> Result<Self, BackendError> {
        let mut registry = Self::new();
        for &(name, handler) in entries {
            registry.register(name, handler)?;
        }
        Ok(registry)
    }

    /// Register a handler for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::DuplicateOperator`] if `name` already has one.
    pub fn register(&mut self, name: &'static str, handler: OperatorHandler<S>) -> Result<(), BackendError> {
        if self.handlers.contains_key(name) {
            return Err(BackendError::DuplicateOperator(name.to_string()));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// The handler for `name`, or `None` if unregistered.
    pub fn lookup(&self, name: &str) -> Option<OperatorHandler<S>> {
        self.handlers.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl<S> Default for OperatorRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for OperatorRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("operators", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        calls: usize,
    }

    fn count(state: &mut Counter, _ctx: OperatorContext<'_>) -> Result<(), BackendError> {
        state.calls += 1;
        Ok(())
    }

    fn fail(_state: &mut Counter, ctx: OperatorContext<'_>) -> Result<(), BackendError> {
        Err(BackendError::malformed(&ctx.operator.name, "always fails"))
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = OperatorRegistry::<Counter>::new();
        registry.register("g", count).unwrap();
        assert!(registry.lookup("g").is_some());
        assert!(registry.lookup("G").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = OperatorRegistry::<Counter>::new();
        registry.register("rg", count).unwrap();
        let err = registry.register("rg", fail).unwrap_err();
        assert!(matches!(err, BackendError::DuplicateOperator(ref n) if n == "rg"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn from_entries_rejects_duplicates() {
        let result = OperatorRegistry::<Counter>::from_entries(&[("k", count), ("K", count), ("k", fail)]);
        assert!(result.is_err());
        let registry = OperatorRegistry::<Counter>::from_entries(&[("k", count), ("K", count)]).unwrap();
        assert_eq!(registry.names(), vec!["K", "k"]);
    }

    #[test]
    fn dispatch_through_lookup() {
        let registry = OperatorRegistry::<Counter>::from_entries(&[("g", count), ("x", fail)]).unwrap();
        let mut state = Counter::default();
        let mut spaces = ColorSpaceState::new();
        let resources = Dictionary::new();
        let op = Operator::new("g", vec![]);
        let handler = registry.lookup("g").unwrap();
        handler(
            &mut state,
            OperatorContext {
                operator: &op,
                resources: &resources,
                document: None,
                color_spaces: &mut spaces,
            },
        )
        .unwrap();
        assert_eq!(state.calls, 1);
    }

    #[test]
    fn empty_registry() {
        let registry: OperatorRegistry<Counter> = OperatorRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.lookup("g").is_none());
    }
}
