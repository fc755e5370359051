//! Resilient precedence-climbing parser for the predicate DSL.
//!
//! # Grammar (EBNF-ish)
//!
//! ```text
//! expr       = or_expr
//! or_expr    = and_expr ("or" and_expr)*
//! and_expr   = not_expr ("and" not_expr)*
//! not_expr   = "not" not_expr | comparison
//! comparison = primary [compare_op primary
//!                      | "contains" primary
//!                      | "matches" primary
//!                      | "is" ["not"] primary]
//! primary    = "(" expr ")" | "{" literal* "}" | literal | IDENT
//! literal    = STRING | NUMBER | REGEX | "true" | "false" | "undefined"
//!            | "null" | "empty"
//! ```
//!
//! Precedence weakest to strongest: `or`, `and`, `not`, comparison, primary.
//!
//! # Error handling
//!
//! Diagnostics are accumulated, never thrown. The parser always terminates
//! and returns whatever tree it could build beside the diagnostics; a
//! predicate with any diagnostic is invalid. Identifier members inside a set
//! literal and unknown regex flags are semantic diagnostics, not syntax.

use std::sync::Arc;

use crate::ast::{CompareOp, Constant, Expr, ExprKind};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::lexer::{Token, TokenKind, lex, token_text};
use crate::span::{LineIndex, Position, Span};
use crate::value::{CompiledRegex, LiteralSet, Value};

/// Result of a parse: the tree (when one could be built) plus everything
/// that went wrong.
#[derive(Debug)]
pub struct ParseOutcome {
    pub ast: Option<Expr>,
    pub diagnostics: Diagnostics,
}

impl ParseOutcome {
    pub fn is_valid(&self) -> bool {
        self.ast.is_some() && self.diagnostics.is_empty()
    }
}

/// Expression nesting limit; prevents stack overflow on hostile input.
const MAX_DEPTH: u32 = 256;

/// Main entry point. Always returns; errors are carried in the outcome.
pub fn parse(source: &str) -> ParseOutcome {
    let index = LineIndex::new(source);
    let mut diagnostics = Diagnostics::new();
    let tokens = lex(source, &index, &mut diagnostics);

    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        index: &index,
        diags: diagnostics,
        depth: 0,
    };

    let ast = parser.parse_expr();
    parser.check_trailing();

    if let Some(ast) = &ast {
        ast.validate(&mut parser.diags);
    }

    ParseOutcome {
        ast,
        diagnostics: parser.diags,
    }
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    index: &'src LineIndex,
    diags: Diagnostics,
    depth: u32,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos];
        self.pos += 1;
        token
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.at(kind) { Some(self.bump()) } else { None }
    }

    fn eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn current_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map_or_else(|| Span::empty(self.source.len()), |t| t.span)
    }

    fn position_of(&self, span: Span) -> Position {
        self.index.position(span.start)
    }

    fn error(&mut self, kind: DiagnosticKind, span: Span, message: impl Into<String>) {
        let pos = self.position_of(span);
        self.diags.push(Diagnostic::new(kind, span, pos, message));
    }

    fn syntax_error_here(&mut self, message: impl Into<String>) {
        let span = self.current_span();
        self.error(DiagnosticKind::Syntax, span, message);
    }

    fn check_trailing(&mut self) {
        if !self.eof() {
            let token = self.tokens[self.pos];
            let text = token_text(self.source, &token);
            self.error(
                DiagnosticKind::Syntax,
                token.span,
                format!("unexpected `{text}` after expression"),
            );
        }
    }

    // =========================================================================
    // Productions, weakest binding first
    // =========================================================================

    fn parse_expr(&mut self) -> Option<Expr> {
        if self.depth >= MAX_DEPTH {
            self.syntax_error_here("expression nested too deeply");
            return None;
        }
        self.depth += 1;
        let result = self.parse_or();
        self.depth -= 1;
        result
    }

    fn parse_or(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_and()?;
        while let Some(op) = self.eat(TokenKind::KwOr) {
            let rhs = self.parse_and()?;
            lhs = self.binary(op, lhs, rhs, |l, r| ExprKind::Or(l, r));
        }
        Some(lhs)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_not()?;
        while let Some(op) = self.eat(TokenKind::KwAnd) {
            let rhs = self.parse_not()?;
            lhs = self.binary(op, lhs, rhs, |l, r| ExprKind::And(l, r));
        }
        Some(lhs)
    }

    fn parse_not(&mut self) -> Option<Expr> {
        if let Some(op) = self.eat(TokenKind::KwNot) {
            let child = self.parse_not()?;
            let span = Span::new(op.span.start as usize, child.span.end as usize);
            return Some(Expr::new(
                ExprKind::Not(Box::new(child)),
                self.position_of(op.span),
                span,
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Option<Expr> {
        let lhs = self.parse_primary()?;

        let op = match self.peek() {
            Some(TokenKind::Less) => Some(CompareOp::Less),
            Some(TokenKind::LessEq) => Some(CompareOp::LessEq),
            Some(TokenKind::Greater) => Some(CompareOp::Greater),
            Some(TokenKind::GreaterEq) => Some(CompareOp::GreaterEq),
            Some(TokenKind::Eq) => Some(CompareOp::Eq),
            Some(TokenKind::NotEq) => Some(CompareOp::NotEq),
            _ => None,
        };
        if let Some(op) = op {
            let op_token = self.bump();
            let rhs = self.parse_primary()?;
            return Some(self.binary(op_token, lhs, rhs, |l, r| ExprKind::Compare {
                op,
                lhs: l,
                rhs: r,
            }));
        }

        if let Some(op_token) = self.eat(TokenKind::KwIs) {
            let op = if self.eat(TokenKind::KwNot).is_some() {
                CompareOp::IsNot
            } else {
                CompareOp::Is
            };
            let rhs = self.parse_primary()?;
            return Some(self.binary(op_token, lhs, rhs, |l, r| ExprKind::Compare {
                op,
                lhs: l,
                rhs: r,
            }));
        }

        if let Some(op_token) = self.eat(TokenKind::KwContains) {
            let rhs = self.parse_primary()?;
            return Some(self.binary(op_token, lhs, rhs, |l, r| ExprKind::Contains {
                container: l,
                probe: r,
            }));
        }

        if let Some(op_token) = self.eat(TokenKind::KwMatches) {
            let rhs = self.parse_primary()?;
            let rhs = self.coerce_regex(rhs);
            return Some(self.binary(op_token, lhs, rhs, |l, r| ExprKind::Matches {
                ident: l,
                regex: r,
            }));
        }

        Some(lhs)
    }

    /// Builds a binary node positioned at its operator token.
    fn binary(
        &self,
        op: Token,
        lhs: Expr,
        rhs: Expr,
        make: impl FnOnce(Box<Expr>, Box<Expr>) -> ExprKind,
    ) -> Expr {
        let span = Span::new(lhs.span.start as usize, rhs.span.end as usize);
        Expr::new(
            make(Box::new(lhs), Box::new(rhs)),
            self.position_of(op.span),
            span,
        )
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let Some(kind) = self.peek() else {
            self.syntax_error_here("expected expression, found end of input");
            return None;
        };

        match kind {
            TokenKind::ParenOpen => {
                self.bump();
                let inner = self.parse_expr()?;
                if self.eat(TokenKind::ParenClose).is_none() {
                    self.syntax_error_here("expected `)`");
                    return None;
                }
                Some(inner)
            }
            TokenKind::BraceOpen => self.parse_literal_set(),
            _ => self.parse_literal(),
        }
    }

    fn parse_literal_set(&mut self) -> Option<Expr> {
        let open = self.bump();
        let mut members = Vec::new();

        loop {
            match self.peek() {
                None => {
                    self.syntax_error_here("expected `}` to close literal set");
                    return None;
                }
                Some(TokenKind::BraceClose) => {
                    let close = self.bump();
                    let set = match LiteralSet::new(members) {
                        Ok(set) => set,
                        Err(err) => {
                            self.error(DiagnosticKind::Semantic, open.span, err.to_string());
                            LiteralSet::new(Vec::new()).expect("empty set is ground")
                        }
                    };
                    return Some(Expr::new(
                        ExprKind::LiteralSet(Arc::new(set)),
                        self.position_of(open.span),
                        Span::new(open.span.start as usize, close.span.end as usize),
                    ));
                }
                Some(TokenKind::Identifier) => {
                    let token = self.bump();
                    let text = token_text(self.source, &token);
                    self.error(
                        DiagnosticKind::Semantic,
                        token.span,
                        format!("identifier `{text}` not allowed in literal set"),
                    );
                }
                Some(_) => {
                    // Bad members are diagnosed and skipped so the closing
                    // brace is still found.
                    if let Some(member) = self.parse_set_member() {
                        members.push(member);
                    }
                }
            }
        }
    }

    /// A single ground member: string, number, or constant.
    fn parse_set_member(&mut self) -> Option<Value> {
        let token = self.bump();
        match token.kind {
            TokenKind::String => Some(Value::Str(self.string_value(token))),
            TokenKind::Number => Some(Value::Number(self.number_value(token))),
            TokenKind::KwTrue => Some(Value::Bool(true)),
            TokenKind::KwFalse => Some(Value::Bool(false)),
            TokenKind::KwNull => Some(Value::Null),
            TokenKind::KwEmpty => Some(Value::Empty),
            TokenKind::KwUndefined => Some(Value::Undefined),
            _ => {
                let text = token_text(self.source, &token);
                self.error(
                    DiagnosticKind::Semantic,
                    token.span,
                    format!("`{text}` not allowed in literal set"),
                );
                None
            }
        }
    }

    fn parse_literal(&mut self) -> Option<Expr> {
        let token = self.bump();
        let pos = self.position_of(token.span);
        let kind = match token.kind {
            TokenKind::String => ExprKind::StringLit(self.string_value(token)),
            TokenKind::Number => ExprKind::NumberLit(self.number_value(token)),
            TokenKind::KwTrue => ExprKind::Constant(Constant::True),
            TokenKind::KwFalse => ExprKind::Constant(Constant::False),
            TokenKind::KwUndefined => ExprKind::Constant(Constant::Undefined),
            TokenKind::KwNull => ExprKind::Constant(Constant::Null),
            TokenKind::KwEmpty => ExprKind::Constant(Constant::Empty),
            TokenKind::Regex => self.regex_value(token)?,
            TokenKind::Identifier => {
                ExprKind::Identifier(token_text(self.source, &token).to_owned())
            }
            _ => {
                let text = token_text(self.source, &token);
                self.error(
                    DiagnosticKind::Syntax,
                    token.span,
                    format!("expected expression, found `{text}`"),
                );
                return None;
            }
        };
        Some(Expr::new(kind, pos, token.span))
    }

    fn string_value(&self, token: Token) -> String {
        let text = token_text(self.source, &token);
        unescape(&text[1..text.len() - 1])
    }

    fn number_value(&self, token: Token) -> f64 {
        token_text(self.source, &token)
            .parse()
            .expect("lexer only accepts valid numbers")
    }

    /// A quoted string on the right of `matches` is a flagless regex.
    fn coerce_regex(&mut self, rhs: Expr) -> Expr {
        if let ExprKind::StringLit(pattern) = &rhs.kind {
            match CompiledRegex::new(pattern, "") {
                Ok(re) => {
                    return Expr::new(ExprKind::RegexLit(Arc::new(re)), rhs.pos, rhs.span);
                }
                Err(err) => {
                    self.error(DiagnosticKind::Semantic, rhs.span, err.to_string());
                }
            }
        }
        rhs
    }

    fn regex_value(&mut self, token: Token) -> Option<ExprKind> {
        let text = token_text(self.source, &token);
        let close = text.rfind('/').expect("lexer guarantees closing slash");
        let pattern = text[1..close].replace("\\/", "/");
        let flags = &text[close + 1..];

        match CompiledRegex::new(&pattern, flags) {
            Ok(re) => Some(ExprKind::RegexLit(Arc::new(re))),
            Err(err) => {
                self.error(DiagnosticKind::Semantic, token.span, err.to_string());
                None
            }
        }
    }
}

/// Standard escape processing for quoted strings. Unrecognized escapes keep
/// the backslash so regex shorthand like `"\d"` survives into `matches`.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(c @ ('\\' | '"' | '\'' | '/')) => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
