//! prediq: boolean predicate engine for attribute-keyed documents.
//!
//! # Example
//!
//! ```
//! use prediq_lib::{Document, Predicate};
//!
//! let pred = Predicate::new("name is 'Jack' and friend_name is 'Jill'");
//! assert!(pred.is_valid());
//!
//! let doc = Document::from_json_str(r#"{"name": "Jack", "friend_name": "Jill"}"#).unwrap();
//! assert!(pred.evaluate(&doc).unwrap());
//!
//! let (result, ctx) = pred.analyze(&doc).unwrap();
//! assert!(result);
//! assert!(ctx.failed().is_empty());
//! ```
//!
//! For matching one document against many predicates, see
//! [`OptimizedPredicateSet`]: it compiles the population into a decision
//! tree so shared tests are evaluated once per document.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod ast;
pub mod diagnostics;
pub mod document;
pub mod eval;
pub mod lexer;
pub mod optimize;
pub mod parser;
pub mod predicate;
pub mod set;
pub mod span;
pub mod value;

#[cfg(test)]
mod ast_tests;
#[cfg(test)]
mod eval_tests;
#[cfg(test)]
mod lexer_tests;
#[cfg(test)]
mod set_tests;

pub use ast::{CompareOp, Constant, Expr, ExprKind};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, DiagnosticsPrinter};
pub use document::Document;
pub use eval::{DefaultResolver, EvalContext, ResolveError, Resolver};
pub use optimize::{CostModel, OptimizeStats, optimize, optimize_with};
pub use predicate::Predicate;
pub use set::{CompileConfig, OptimizedPredicateSet, PredicateSet};
pub use span::Position;
pub use value::{CompiledRegex, LiteralSet, Value};

/// Errors from API misuse. Bad predicate *source* is never an `Err` - it
/// yields an invalid predicate carrying diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Evaluation or set membership was attempted on an invalid predicate.
    #[error("predicate is invalid: {0}")]
    InvalidPredicate(String),
}

impl Error {
    pub(crate) fn invalid(pred: &Predicate) -> Self {
        let detail = pred
            .errors()
            .first()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "no expression parsed".to_owned());
        Error::InvalidPredicate(detail)
    }
}

/// Result type for predicate operations.
pub type Result<T> = std::result::Result<T, Error>;
