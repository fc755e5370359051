//! The predicate facade: source, AST, validity, evaluation.

use std::sync::Arc;

use crate::Error;
use crate::ast::Expr;
use crate::diagnostics::{Diagnostic, Diagnostics, DiagnosticsPrinter};
use crate::document::Document;
use crate::eval::{self, DefaultResolver, EvalContext, ResolveError, Resolver};
use crate::optimize;
use crate::parser;
use crate::value::Value;

/// A boolean expression in the DSL plus its parsed AST.
///
/// Construction never fails: bad input produces an invalid predicate whose
/// [`errors`](Self::errors) explain why. Only valid predicates evaluate.
///
/// A predicate is immutable after construction and can be shared across
/// threads; each evaluation owns its own [`EvalContext`].
#[derive(Clone)]
pub struct Predicate {
    source: String,
    ast: Option<Expr>,
    /// The tree evaluation actually runs; present iff the predicate is
    /// valid.
    optimized: Option<Expr>,
    diagnostics: Diagnostics,
    resolver: Arc<dyn Resolver + Send + Sync>,
}

impl Predicate {
    /// Parses and optimizes `source`. Inspect [`is_valid`](Self::is_valid)
    /// before evaluating.
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let outcome = parser::parse(&source);

        let optimized = if outcome.diagnostics.is_empty() {
            outcome.ast.as_ref().map(optimize::optimize)
        } else {
            None
        };

        Self {
            source,
            ast: outcome.ast,
            optimized,
            diagnostics: outcome.diagnostics,
            resolver: Arc::new(DefaultResolver),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_valid(&self) -> bool {
        self.optimized.is_some()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        self.diagnostics.as_slice()
    }

    /// Caret-style rendering of the diagnostics against the source.
    pub fn diagnostics_printer(&self) -> DiagnosticsPrinter<'_, '_> {
        self.diagnostics.printer().source(&self.source)
    }

    /// Indented rendering of the parsed AST, children in evaluation order.
    /// Invalid predicates render as an empty string.
    pub fn description(&self) -> String {
        self.ast.as_ref().map(Expr::describe).unwrap_or_default()
    }

    /// Evaluates against a document. Fails only on an invalid predicate.
    pub fn evaluate(&self, doc: &Document) -> Result<bool, Error> {
        let ast = self.optimized.as_ref().ok_or_else(|| Error::invalid(self))?;
        let mut ctx = EvalContext::new(doc, self.resolver.clone());
        Ok(eval::eval_bool(ast, &mut ctx))
    }

    /// Evaluates and keeps the context: the failure trail and the literal
    /// values observed. The trail is empty exactly when the result is true.
    pub fn analyze<'a>(&self, doc: &'a Document) -> Result<(bool, EvalContext<'a>), Error> {
        let ast = self.optimized.as_ref().ok_or_else(|| Error::invalid(self))?;
        let mut ctx = EvalContext::new(doc, self.resolver.clone());
        let result = eval::eval_bool(ast, &mut ctx);
        Ok((result, ctx))
    }

    /// Installs a resolver callback. Bare constants still resolve first;
    /// for every other name the callback replaces the dotted-path walk and
    /// its answer is authoritative. A callback error reads as `Undefined`.
    pub fn set_resolver<F>(&mut self, callback: F)
    where
        F: Fn(&str, &Document) -> Result<Value, ResolveError> + Send + Sync + 'static,
    {
        self.resolver = Arc::new(CallbackResolver { callback });
    }

    /// Replaces the whole resolution chain.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver + Send + Sync>) -> Self {
        self.resolver = resolver;
        self
    }

    pub(crate) fn optimized_ast(&self) -> Option<&Expr> {
        self.optimized.as_ref()
    }
}

impl std::fmt::Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predicate")
            .field("source", &self.source)
            .field("valid", &self.is_valid())
            .field("diagnostics", &self.diagnostics.len())
            .finish_non_exhaustive()
    }
}

/// Constants first, then the user callback.
struct CallbackResolver<F> {
    callback: F,
}

impl<F> Resolver for CallbackResolver<F>
where
    F: Fn(&str, &Document) -> Result<Value, ResolveError> + Send + Sync,
{
    fn resolve(&self, name: &str, doc: &Document) -> Result<Value, ResolveError> {
        if let Some(constant) = eval::constant_value(name) {
            return Ok(constant);
        }
        (self.callback)(name, doc)
    }
}
