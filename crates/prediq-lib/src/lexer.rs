//! Lexer for the predicate DSL.
//!
//! Produces span-based tokens without storing text - text is sliced from
//! source only when the parser needs a value.
//!
//! ## Error handling
//!
//! Consecutive unlexable characters are coalesced into a single lex
//! diagnostic rather than one per character. Unterminated strings and regex
//! literals get their own lex diagnostics and are dropped from the stream.

use logos::Logos;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::span::{LineIndex, Span};

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    #[token("and")]
    KwAnd,

    #[token("or")]
    KwOr,

    #[token("not")]
    KwNot,

    #[token("is")]
    KwIs,

    #[token("contains")]
    KwContains,

    #[token("matches")]
    KwMatches,

    #[token("true")]
    KwTrue,

    #[token("false")]
    KwFalse,

    #[token("undefined")]
    KwUndefined,

    #[token("null")]
    KwNull,

    #[token("empty")]
    KwEmpty,

    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[token("{")]
    BraceOpen,

    #[token("}")]
    BraceClose,

    #[token("=")]
    Eq,

    #[token("!=")]
    NotEq,

    #[token(">=")]
    GreaterEq,

    #[token("<=")]
    LessEq,

    #[token(">")]
    Greater,

    #[token("<")]
    Less,

    #[regex(r#""(?:[^"\\\n]|\\.)*""#)]
    #[regex(r#"'(?:[^'\\\n]|\\.)*'"#)]
    String,

    #[regex(r#""(?:[^"\\\n]|\\.)*"#)]
    #[regex(r#"'(?:[^'\\\n]|\\.)*"#)]
    UnterminatedString,

    #[regex(r"-?[0-9]+(?:\.[0-9]+)?")]
    Number,

    #[regex(r"/(?:[^/\\\n]|\\.)*/[A-Za-z]*")]
    Regex,

    #[regex(r"/(?:[^/\\\n]|\\.)*")]
    UnterminatedRegex,

    #[regex(r"[A-Za-z_][A-Za-z0-9_.]*")]
    Identifier,
}

/// Kind + span; text retrieved via [`token_text`] when needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Retrieves the text slice for a token. O(1) slice into source.
pub fn token_text<'src>(source: &'src str, token: &Token) -> &'src str {
    &source[std::ops::Range::<usize>::from(token.span)]
}

/// Tokenizes source, reporting lex problems into `diags`.
///
/// The returned stream contains only well-formed tokens; garbage and
/// unterminated literals are diagnosed and skipped so the parser can keep
/// going.
pub fn lex(source: &str, index: &LineIndex, diags: &mut Diagnostics) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(source);
    let mut garbage: Option<Span> = None;

    let flush_garbage = |diags: &mut Diagnostics, span: Option<Span>| {
        if let Some(span) = span {
            diags.push(Diagnostic::new(
                DiagnosticKind::Lex,
                span,
                index.position(span.start),
                format!(
                    "unrecognized input `{}`",
                    &source[std::ops::Range::<usize>::from(span)]
                ),
            ));
        }
    };

    loop {
        match lexer.next() {
            Some(Ok(kind)) => {
                flush_garbage(diags, garbage.take());

                let span = Span::new(lexer.span().start, lexer.span().end);
                match kind {
                    TokenKind::UnterminatedString => {
                        diags.push(Diagnostic::new(
                            DiagnosticKind::Lex,
                            span,
                            index.position(span.start),
                            "unterminated string literal",
                        ));
                    }
                    TokenKind::UnterminatedRegex => {
                        diags.push(Diagnostic::new(
                            DiagnosticKind::Lex,
                            span,
                            index.position(span.start),
                            "unterminated regex literal",
                        ));
                    }
                    _ => tokens.push(Token::new(kind, span)),
                }
            }
            Some(Err(())) => {
                let span = lexer.span();
                garbage = Some(match garbage {
                    Some(existing) => Span::new(existing.start as usize, span.end),
                    None => Span::new(span.start, span.end),
                });
            }
            None => {
                flush_garbage(diags, garbage.take());
                break;
            }
        }
    }

    tokens
}
