//! Single-predicate AST optimizer.
//!
//! Rewrites a valid tree into an equivalent but faster one. Passes run to a
//! fixed point (bounded):
//!
//! 1. Constant folding - document-independent subtrees evaluate at compile
//!    time.
//! 2. Boolean absorption - `and`/`or`/`not` against constants.
//! 3. Literal-set compilation - `=`-disjunctions over one identifier
//!    collapse to a set containment.
//! 4. Range analysis - conjunctions of comparisons against ground values on
//!    one identifier are checked for satisfiability; only provably
//!    meaning-preserving simplifications apply.
//! 5. Operand ordering - the cheaper side of `and`/`or` moves left.
//!
//! Every rewrite preserves observational equivalence under a pure resolver.

use std::sync::Arc;

use crate::ast::{CompareOp, Constant, Expr, ExprKind};
use crate::document::Document;
use crate::eval::{self, DefaultResolver, EvalContext};
use crate::value::{LiteralSet, Value};

mod range;

/// Static per-operation cost scores used for operand ordering and for the
/// optimized set's branch selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostModel {
    pub constant: u32,
    pub set_contains: u32,
    pub compare: u32,
    pub matches: u32,
    /// Added per logical connective on top of its operands.
    pub logical: u32,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            constant: 0,
            set_contains: 1,
            compare: 2,
            matches: 4,
            logical: 1,
        }
    }
}

impl CostModel {
    /// Estimated cost of evaluating a subtree once.
    pub fn cost(&self, expr: &Expr) -> u32 {
        match &expr.kind {
            ExprKind::Constant(_)
            | ExprKind::StringLit(_)
            | ExprKind::NumberLit(_)
            | ExprKind::RegexLit(_)
            | ExprKind::LiteralSet(_) => self.constant,
            ExprKind::Identifier(_) => self.set_contains,
            ExprKind::Not(child) => self.logical + self.cost(child),
            ExprKind::And(lhs, rhs) | ExprKind::Or(lhs, rhs) => {
                self.logical + self.cost(lhs) + self.cost(rhs)
            }
            ExprKind::Compare { lhs, rhs, .. } => self.compare + self.cost(lhs) + self.cost(rhs),
            ExprKind::Contains { container, probe } => {
                self.set_contains + self.cost(container) + self.cost(probe)
            }
            ExprKind::Matches { .. } => self.matches,
        }
    }
}

/// Counters for what the optimizer did; exercised by tests and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub folded: usize,
    pub absorbed: usize,
    pub sets_compiled: usize,
    pub ranges_pruned: usize,
    pub reordered: usize,
}

impl OptimizeStats {
    fn changed(&self, before: &OptimizeStats) -> bool {
        self != before
    }
}

const MAX_PASSES: usize = 8;

/// Optimizes with the default cost model.
pub fn optimize(expr: &Expr) -> Expr {
    optimize_with(expr, &CostModel::default()).0
}

/// Optimizes, returning the rewritten tree and pass counters.
pub fn optimize_with(expr: &Expr, cost: &CostModel) -> (Expr, OptimizeStats) {
    let mut expr = expr.clone();
    let mut stats = OptimizeStats::default();

    for _ in 0..MAX_PASSES {
        let before = stats;
        expr = fold_constants(expr, &mut stats);
        expr = absorb(expr, &mut stats);
        expr = compile_literal_sets(expr, &mut stats);
        expr = range::prune_ranges(expr, &mut stats);
        expr = order_operands(expr, cost, &mut stats);
        if !stats.changed(&before) {
            break;
        }
    }

    (expr, stats)
}

fn map_children(expr: Expr, f: &mut impl FnMut(Expr) -> Expr) -> Expr {
    let Expr { kind, pos, span } = expr;
    let kind = match kind {
        ExprKind::Not(child) => ExprKind::Not(Box::new(f(*child))),
        ExprKind::And(lhs, rhs) => ExprKind::And(Box::new(f(*lhs)), Box::new(f(*rhs))),
        ExprKind::Or(lhs, rhs) => ExprKind::Or(Box::new(f(*lhs)), Box::new(f(*rhs))),
        ExprKind::Compare { op, lhs, rhs } => ExprKind::Compare {
            op,
            lhs: Box::new(f(*lhs)),
            rhs: Box::new(f(*rhs)),
        },
        ExprKind::Contains { container, probe } => ExprKind::Contains {
            container: Box::new(f(*container)),
            probe: Box::new(f(*probe)),
        },
        ExprKind::Matches { ident, regex } => ExprKind::Matches {
            ident: Box::new(f(*ident)),
            regex: Box::new(f(*regex)),
        },
        leaf => leaf,
    };
    Expr::new(kind, pos, span)
}

/// Pass 1: boolean subtrees with no identifier reachable evaluate now.
fn fold_constants(expr: Expr, stats: &mut OptimizeStats) -> Expr {
    let foldable = matches!(
        expr.kind,
        ExprKind::Not(_)
            | ExprKind::And(..)
            | ExprKind::Or(..)
            | ExprKind::Compare { .. }
            | ExprKind::Contains { .. }
    );
    if foldable && expr.is_ground() {
        let doc = Document::new();
        let mut ctx = EvalContext::new(&doc, std::sync::Arc::new(DefaultResolver));
        let result = eval::eval_bool(&expr, &mut ctx);
        stats.folded += 1;
        return constant(result, &expr);
    }
    map_children(expr, &mut |child| fold_constants(child, stats))
}

fn constant(value: bool, at: &Expr) -> Expr {
    let c = if value { Constant::True } else { Constant::False };
    Expr::new(ExprKind::Constant(c), at.pos, at.span)
}

fn as_bool_constant(expr: &Expr) -> Option<bool> {
    match expr.kind {
        ExprKind::Constant(Constant::True) => Some(true),
        ExprKind::Constant(Constant::False) => Some(false),
        _ => None,
    }
}

/// Pass 2: identity and annihilator rewrites against boolean constants.
fn absorb(expr: Expr, stats: &mut OptimizeStats) -> Expr {
    let expr = map_children(expr, &mut |child| absorb(child, stats));

    match &expr.kind {
        ExprKind::And(lhs, rhs) => match (as_bool_constant(lhs), as_bool_constant(rhs)) {
            (Some(true), _) => {
                stats.absorbed += 1;
                (**rhs).clone()
            }
            (_, Some(true)) => {
                stats.absorbed += 1;
                (**lhs).clone()
            }
            (Some(false), _) | (_, Some(false)) => {
                stats.absorbed += 1;
                constant(false, &expr)
            }
            _ => expr,
        },
        ExprKind::Or(lhs, rhs) => match (as_bool_constant(lhs), as_bool_constant(rhs)) {
            (Some(false), _) => {
                stats.absorbed += 1;
                (**rhs).clone()
            }
            (_, Some(false)) => {
                stats.absorbed += 1;
                (**lhs).clone()
            }
            (Some(true), _) | (_, Some(true)) => {
                stats.absorbed += 1;
                constant(true, &expr)
            }
            _ => expr,
        },
        ExprKind::Not(child) => match &child.kind {
            ExprKind::Not(inner) => {
                stats.absorbed += 1;
                (**inner).clone()
            }
            ExprKind::Constant(Constant::True) => {
                stats.absorbed += 1;
                constant(false, &expr)
            }
            ExprKind::Constant(Constant::False) => {
                stats.absorbed += 1;
                constant(true, &expr)
            }
            _ => expr,
        },
        _ => expr,
    }
}

/// A ground `id = literal` comparison, in either operand order.
fn eq_over_identifier(expr: &Expr) -> Option<(&str, Value)> {
    let ExprKind::Compare { op: CompareOp::Eq, lhs, rhs } = &expr.kind else {
        return None;
    };
    let ground_value = |e: &Expr| match &e.kind {
        ExprKind::StringLit(s) => Some(Value::Str(s.clone())),
        ExprKind::NumberLit(n) => Some(Value::Number(*n)),
        ExprKind::Constant(c) if !matches!(c, Constant::Undefined) => Some(c.value()),
        _ => None,
    };
    match (&lhs.kind, &rhs.kind) {
        (ExprKind::Identifier(name), _) => ground_value(rhs).map(|v| (name.as_str(), v)),
        (_, ExprKind::Identifier(name)) => ground_value(lhs).map(|v| (name.as_str(), v)),
        _ => None,
    }
}

/// Pass 3: `x = a or x = b or ...` collapses to
/// `{a b ...} contains x` under the set representation rules.
///
/// The whole `or` chain is flattened before grouping so a three-way
/// disjunction becomes one three-member set, not a nested pair.
fn compile_literal_sets(expr: Expr, stats: &mut OptimizeStats) -> Expr {
    if !matches!(expr.kind, ExprKind::Or(..)) {
        return map_children(expr, &mut |child| compile_literal_sets(child, stats));
    }

    let mut operands = Vec::new();
    flatten_or(&expr, &mut operands);
    let operands: Vec<Expr> = operands
        .into_iter()
        .map(|operand| compile_literal_sets(operand, stats))
        .collect();

    // Group the `id = ground` operands by identifier, preserving order.
    let mut by_ident: Vec<(String, Vec<Value>)> = Vec::new();
    for operand in &operands {
        if let Some((name, value)) = eq_over_identifier(operand) {
            match by_ident.iter_mut().find(|(n, _)| n.as_str() == name) {
                Some((_, values)) => values.push(value),
                None => by_ident.push((name.to_owned(), vec![value])),
            }
        }
    }

    let Some((name, values)) = by_ident.into_iter().find(|(_, vs)| vs.len() >= 2) else {
        return rebuild_or(operands, &expr);
    };
    let Ok(set) = LiteralSet::new(values) else {
        return rebuild_or(operands, &expr);
    };
    let set = Arc::new(set);

    let mut rebuilt: Vec<Expr> = Vec::new();
    let mut contains: Option<Expr> = None;
    for operand in operands {
        let grouped = matches!(eq_over_identifier(&operand), Some((n, _)) if n == name);
        if !grouped {
            rebuilt.push(operand);
            continue;
        }
        if contains.is_none() {
            let pos = operand.pos;
            let span = operand.span;
            contains = Some(Expr::new(
                ExprKind::Contains {
                    container: Box::new(Expr::new(ExprKind::LiteralSet(set.clone()), pos, span)),
                    probe: Box::new(Expr::new(ExprKind::Identifier(name.clone()), pos, span)),
                },
                pos,
                span,
            ));
        }
    }

    stats.sets_compiled += 1;
    let mut chain = contains.expect("at least two grouped operands");
    for operand in rebuilt {
        let pos = chain.pos;
        let span = chain.span;
        chain = Expr::new(
            ExprKind::Or(Box::new(chain), Box::new(operand)),
            pos,
            span,
        );
    }
    chain
}

fn rebuild_or(operands: Vec<Expr>, at: &Expr) -> Expr {
    let mut iter = operands.into_iter();
    let first = iter.next().expect("an or chain has operands");
    iter.fold(first, |chain, operand| {
        Expr::new(
            ExprKind::Or(Box::new(chain), Box::new(operand)),
            at.pos,
            at.span,
        )
    })
}

fn flatten_or(expr: &Expr, out: &mut Vec<Expr>) {
    match &expr.kind {
        ExprKind::Or(lhs, rhs) => {
            flatten_or(lhs, out);
            flatten_or(rhs, out);
        }
        _ => out.push(expr.clone()),
    }
}

pub(crate) fn flatten_and(expr: &Expr, out: &mut Vec<Expr>) {
    match &expr.kind {
        ExprKind::And(lhs, rhs) => {
            flatten_and(lhs, out);
            flatten_and(rhs, out);
        }
        _ => out.push(expr.clone()),
    }
}

/// Pass 5: within `and`/`or`, the cheaper operand moves left. Selectivity is
/// unknown (0.5 both ways), so the static cost decides. Swaps stay local:
/// a test never moves across a nested chain, which keeps the failure-trail
/// order of a multi-operand conjunction intact.
fn order_operands(expr: Expr, cost: &CostModel, stats: &mut OptimizeStats) -> Expr {
    let expr = map_children(expr, &mut |child| order_operands(child, cost, stats));

    let is_chain = |e: &Expr| matches!(e.kind, ExprKind::And(..) | ExprKind::Or(..));

    match expr.kind {
        ExprKind::And(lhs, rhs)
            if !is_chain(&lhs) && !is_chain(&rhs) && cost.cost(&rhs) < cost.cost(&lhs) =>
        {
            stats.reordered += 1;
            Expr::new(ExprKind::And(rhs, lhs), expr.pos, expr.span)
        }
        ExprKind::Or(lhs, rhs)
            if !is_chain(&lhs) && !is_chain(&rhs) && cost.cost(&rhs) < cost.cost(&lhs) =>
        {
            stats.reordered += 1;
            Expr::new(ExprKind::Or(rhs, lhs), expr.pos, expr.span)
        }
        kind => Expr::new(kind, expr.pos, expr.span),
    }
}
