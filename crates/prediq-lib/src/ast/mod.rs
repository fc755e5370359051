//! The AST node family.
//!
//! A tagged [`ExprKind`] variant per node kind, each node carrying the
//! source [`Position`] of its defining token (binary operators carry the
//! operator token's position). Trees are logically immutable after parse;
//! the optimizer and the set compiler build new trees.
//!
//! Two canonical renderings matter:
//!
//! - [`Expr::describe`] - the indented human-readable form,
//!   `<NodeKind> at line: L, col C` with children indented four spaces.
//! - [`Expr::fingerprint`] - the canonical textual form used as the key
//!   for the subexpression cache and all cross-predicate CSE machinery.

use std::fmt::Write;
use std::sync::Arc;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::span::{Position, Span};
use crate::value::{CompiledRegex, LiteralSet, Value, fmt_number};

/// A predicate expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
    pub(crate) span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position, span: Span) -> Self {
        Self { kind, pos, span }
    }
}

/// Bare constants of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    True,
    False,
    Undefined,
    Null,
    Empty,
}

impl Constant {
    pub fn keyword(self) -> &'static str {
        match self {
            Constant::True => "true",
            Constant::False => "false",
            Constant::Undefined => "undefined",
            Constant::Null => "null",
            Constant::Empty => "empty",
        }
    }

    pub fn value(self) -> Value {
        match self {
            Constant::True => Value::Bool(true),
            Constant::False => Value::Bool(false),
            Constant::Undefined => Value::Undefined,
            Constant::Null => Value::Null,
            Constant::Empty => Value::Empty,
        }
    }
}

/// Comparison operators, `is` and `is not` included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Eq,
    NotEq,
    Is,
    IsNot,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Less => "<",
            CompareOp::LessEq => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterEq => ">=",
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Is => "is",
            CompareOp::IsNot => "is not",
        }
    }

    /// The operator with operands swapped: `a < b` iff `b > a`.
    pub fn mirrored(self) -> CompareOp {
        match self {
            CompareOp::Less => CompareOp::Greater,
            CompareOp::LessEq => CompareOp::GreaterEq,
            CompareOp::Greater => CompareOp::Less,
            CompareOp::GreaterEq => CompareOp::LessEq,
            other => other,
        }
    }
}

/// Node variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Deferred identifier lookup, dotted paths included.
    Identifier(String),
    StringLit(String),
    NumberLit(f64),
    Constant(Constant),
    RegexLit(Arc<CompiledRegex>),
    LiteralSet(Arc<LiteralSet>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Contains {
        container: Box<Expr>,
        probe: Box<Expr>,
    },
    Matches {
        ident: Box<Expr>,
        regex: Box<Expr>,
    },
}

impl Expr {
    /// The node-kind name used in descriptions and failure messages.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExprKind::Identifier(_) => "Literal",
            ExprKind::StringLit(_) => "StringLiteral",
            ExprKind::NumberLit(_) => "NumberLiteral",
            ExprKind::Constant(_) => "Constant",
            ExprKind::RegexLit(_) => "Regex",
            ExprKind::LiteralSet(_) => "LiteralSet",
            ExprKind::Not(_) => "NegateOperator",
            ExprKind::And(..) | ExprKind::Or(..) => "LogicalOperator",
            ExprKind::Compare { .. } => "CompareOperator",
            ExprKind::Contains { .. } => "ContainsOperator",
            ExprKind::Matches { .. } => "MatchOperator",
        }
    }

    /// Indented multi-line rendering, children in evaluation order.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_into(0, &mut out);
        out
    }

    fn describe_into(&self, depth: usize, out: &mut String) {
        let _ = writeln!(
            out,
            "{:indent$}{} at {}",
            "",
            self.kind_name(),
            self.pos,
            indent = depth * 4
        );
        match &self.kind {
            ExprKind::Identifier(_)
            | ExprKind::StringLit(_)
            | ExprKind::NumberLit(_)
            | ExprKind::Constant(_)
            | ExprKind::RegexLit(_)
            | ExprKind::LiteralSet(_) => {}
            ExprKind::Not(child) => child.describe_into(depth + 1, out),
            ExprKind::And(lhs, rhs) | ExprKind::Or(lhs, rhs) => {
                lhs.describe_into(depth + 1, out);
                rhs.describe_into(depth + 1, out);
            }
            ExprKind::Compare { lhs, rhs, .. } => {
                lhs.describe_into(depth + 1, out);
                rhs.describe_into(depth + 1, out);
            }
            ExprKind::Contains { container, probe } => {
                container.describe_into(depth + 1, out);
                probe.describe_into(depth + 1, out);
            }
            ExprKind::Matches { ident, regex } => {
                ident.describe_into(depth + 1, out);
                regex.describe_into(depth + 1, out);
            }
        }
    }

    /// Canonical textual form. Two subtrees with equal fingerprints are
    /// syntactically identical up to positions, so with a pure resolver they
    /// evaluate identically.
    pub fn fingerprint(&self) -> String {
        let mut out = String::new();
        self.fingerprint_into(&mut out);
        out
    }

    fn fingerprint_into(&self, out: &mut String) {
        match &self.kind {
            ExprKind::Identifier(name) => out.push_str(name),
            ExprKind::StringLit(s) => {
                out.push('\'');
                out.push_str(s);
                out.push('\'');
            }
            ExprKind::NumberLit(n) => out.push_str(&fmt_number(*n)),
            ExprKind::Constant(c) => out.push_str(c.keyword()),
            ExprKind::RegexLit(re) => {
                let _ = write!(out, "/{}/{}", re.pattern(), re.flags());
            }
            ExprKind::LiteralSet(set) => {
                let _ = write!(out, "{set}");
            }
            ExprKind::Not(child) => {
                out.push_str("not ");
                child.fingerprint_into(out);
            }
            ExprKind::And(lhs, rhs) => {
                Self::binary_fingerprint(out, lhs, "and", rhs);
            }
            ExprKind::Or(lhs, rhs) => {
                Self::binary_fingerprint(out, lhs, "or", rhs);
            }
            ExprKind::Compare { op, lhs, rhs } => {
                Self::binary_fingerprint(out, lhs, op.symbol(), rhs);
            }
            ExprKind::Contains { container, probe } => {
                Self::binary_fingerprint(out, container, "contains", probe);
            }
            ExprKind::Matches { ident, regex } => {
                Self::binary_fingerprint(out, ident, "matches", regex);
            }
        }
    }

    fn binary_fingerprint(out: &mut String, lhs: &Expr, op: &str, rhs: &Expr) {
        out.push('(');
        lhs.fingerprint_into(out);
        out.push(' ');
        out.push_str(op);
        out.push(' ');
        rhs.fingerprint_into(out);
        out.push(')');
    }

    /// Calls `f` on this node and every descendant, pre-order.
    pub fn for_each(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match &self.kind {
            ExprKind::Identifier(_)
            | ExprKind::StringLit(_)
            | ExprKind::NumberLit(_)
            | ExprKind::Constant(_)
            | ExprKind::RegexLit(_)
            | ExprKind::LiteralSet(_) => {}
            ExprKind::Not(child) => child.for_each(f),
            ExprKind::And(lhs, rhs) | ExprKind::Or(lhs, rhs) => {
                lhs.for_each(f);
                rhs.for_each(f);
            }
            ExprKind::Compare { lhs, rhs, .. } => {
                lhs.for_each(f);
                rhs.for_each(f);
            }
            ExprKind::Contains { container, probe } => {
                container.for_each(f);
                probe.for_each(f);
            }
            ExprKind::Matches { ident, regex } => {
                ident.for_each(f);
                regex.for_each(f);
            }
        }
    }

    /// True when evaluation cannot touch the document: no identifier
    /// reachable.
    pub fn is_ground(&self) -> bool {
        let mut ground = true;
        self.for_each(&mut |e| {
            if matches!(e.kind, ExprKind::Identifier(_)) {
                ground = false;
            }
        });
        ground
    }

    /// Calls `f` on every subtree in *boolean position*: the root, and the
    /// operands of `and` / `or` / `not`. Operands of comparisons are value
    /// positions and are not visited.
    pub(crate) fn for_each_boolean(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match &self.kind {
            ExprKind::Not(child) => child.for_each_boolean(f),
            ExprKind::And(lhs, rhs) | ExprKind::Or(lhs, rhs) => {
                lhs.for_each_boolean(f);
                rhs.for_each_boolean(f);
            }
            _ => {}
        }
    }

    /// True when some boolean-position subtree has the given fingerprint.
    pub(crate) fn contains_boolean_fingerprint(&self, fp: &str) -> bool {
        let mut found = false;
        self.for_each_boolean(&mut |e| {
            if !found && e.fingerprint() == fp {
                found = true;
            }
        });
        found
    }

    /// Clones this tree, replacing every boolean-position subtree whose
    /// fingerprint equals `fp` with the given constant.
    pub(crate) fn substitute_boolean(&self, fp: &str, constant: Constant) -> Expr {
        if self.fingerprint() == fp {
            return Expr::new(ExprKind::Constant(constant), self.pos, self.span);
        }
        let kind = match &self.kind {
            ExprKind::Not(child) => ExprKind::Not(Box::new(child.substitute_boolean(fp, constant))),
            ExprKind::And(lhs, rhs) => ExprKind::And(
                Box::new(lhs.substitute_boolean(fp, constant)),
                Box::new(rhs.substitute_boolean(fp, constant)),
            ),
            ExprKind::Or(lhs, rhs) => ExprKind::Or(
                Box::new(lhs.substitute_boolean(fp, constant)),
                Box::new(rhs.substitute_boolean(fp, constant)),
            ),
            other => other.clone(),
        };
        Expr::new(kind, self.pos, self.span)
    }

    /// Semantic validation: `matches` needs an identifier left operand and a
    /// regex right operand. Literal-set groundness is enforced at
    /// construction; this pass catches what the grammar alone cannot.
    pub(crate) fn validate(&self, diags: &mut Diagnostics) {
        self.for_each(&mut |e| {
            if let ExprKind::Matches { ident, regex } = &e.kind {
                if !matches!(ident.kind, ExprKind::Identifier(_)) {
                    diags.push(Diagnostic::new(
                        DiagnosticKind::Semantic,
                        ident.span,
                        ident.pos,
                        "left operand of `matches` must be an identifier",
                    ));
                }
                if !matches!(regex.kind, ExprKind::RegexLit(_)) {
                    diags.push(Diagnostic::new(
                        DiagnosticKind::Semantic,
                        regex.span,
                        regex.pos,
                        "right operand of `matches` must be a regex literal",
                    ));
                }
            }
        });
    }
}
