//! Diagnostic record types.

use serde::Serialize;

use crate::span::{Position, Span};

/// Which stage rejected the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// Bad character, unterminated string or regex.
    Lex,
    /// Grammar rule violated.
    Syntax,
    /// Well-formed but ill-typed: identifier in a literal set, unknown
    /// regex flag, non-regex right operand of `matches`.
    Semantic,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::Lex => write!(f, "lex"),
            DiagnosticKind::Syntax => write!(f, "syntax"),
            DiagnosticKind::Semantic => write!(f, "semantic"),
        }
    }
}

/// A single problem found while turning source text into an AST.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// 1-based line of the offending token.
    pub line: u32,
    /// 0-based column of the offending token.
    pub col: u32,
    #[serde(skip)]
    pub(crate) span: Span,
}

impl Diagnostic {
    pub(crate) fn new(
        kind: DiagnosticKind,
        span: Span,
        pos: Position,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            line: pos.line,
            col: pos.col,
            span,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.col)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} error at line: {}, col {}: {}",
            self.kind, self.line, self.col, self.message
        )
    }
}
