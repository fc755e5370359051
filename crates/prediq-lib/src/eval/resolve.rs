//! Identifier resolution as an injected capability.
//!
//! Resolution order in the default chain: bare constants, then the custom
//! callback when one is installed, then the dotted-path document walk.
//! A resolver failure is caught by the evaluation context and treated as
//! `Undefined`.

use crate::document::Document;
use crate::value::Value;

/// A resolver failure. Indistinguishable from a missing key at evaluation
/// time: both yield `Undefined`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("identifier resolution failed: {0}")]
pub struct ResolveError(pub String);

/// Resolves identifier names to values against a document.
pub trait Resolver {
    fn resolve(&self, name: &str, doc: &Document) -> Result<Value, ResolveError>;
}

impl<F> Resolver for F
where
    F: Fn(&str, &Document) -> Result<Value, ResolveError>,
{
    fn resolve(&self, name: &str, doc: &Document) -> Result<Value, ResolveError> {
        self(name, doc)
    }
}

/// Bare constants short-circuit resolution before any lookup.
pub(crate) fn constant_value(name: &str) -> Option<Value> {
    match name {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        "empty" => Some(Value::Empty),
        "undefined" => Some(Value::Undefined),
        _ => None,
    }
}

/// The default chain: constants, then the dotted-path walk through nested
/// document objects. Missing keys are `Undefined`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResolver;

impl Resolver for DefaultResolver {
    fn resolve(&self, name: &str, doc: &Document) -> Result<Value, ResolveError> {
        if let Some(constant) = constant_value(name) {
            return Ok(constant);
        }
        Ok(doc
            .lookup_path(name)
            .cloned()
            .unwrap_or(Value::Undefined))
    }
}
