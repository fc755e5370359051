//! Structured diagnostics for parse-time errors.
//!
//! The parser never throws on bad input: lex, syntax, and semantic problems
//! accumulate into a [`Diagnostics`] collection attached to the predicate,
//! which stays evaluable-but-invalid. Rendering with source snippets goes
//! through [`DiagnosticsPrinter`].

mod collection;
mod message;
mod printer;

#[cfg(test)]
mod tests;

pub use collection::Diagnostics;
pub use message::{Diagnostic, DiagnosticKind};
pub use printer::DiagnosticsPrinter;
