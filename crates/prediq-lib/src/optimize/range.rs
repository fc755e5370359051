//! Pass 4: satisfiability of one-identifier conjunctions.
//!
//! Within an `and` chain, comparisons of a single identifier against ground
//! values are checked together: clashing equalities or impossible bounds
//! collapse the conjunction to `false`, and bounds implied by a kept
//! comparison are dropped. Unrecognized shapes are left alone.

use std::collections::HashSet;

use crate::ast::{CompareOp, Expr, ExprKind};
use crate::value::Value;

use super::{OptimizeStats, eq_over_identifier, flatten_and, map_children};

/// A numeric bound on one identifier: `x > value` (lower) or `x < value`
/// (upper), strict or not.
#[derive(Debug, Clone, Copy)]
struct Bound {
    operand: usize,
    value: f64,
    strict: bool,
}

impl Bound {
    /// Is this lower bound at least as tight as `other`?
    fn tighter_lower(&self, other: &Bound) -> bool {
        self.value > other.value || (self.value == other.value && self.strict >= other.strict)
    }

    fn tighter_upper(&self, other: &Bound) -> bool {
        self.value < other.value || (self.value == other.value && self.strict >= other.strict)
    }

    fn admits_lower(&self, v: f64) -> bool {
        if self.strict { v > self.value } else { v >= self.value }
    }

    fn admits_upper(&self, v: f64) -> bool {
        if self.strict { v < self.value } else { v <= self.value }
    }
}

#[derive(Debug, Default)]
struct Constraints {
    eqs: Vec<(usize, Value)>,
    lowers: Vec<Bound>,
    uppers: Vec<Bound>,
}

/// `id op number` in either operand order, normalized to the identifier on
/// the left.
fn numeric_bound(expr: &Expr) -> Option<(&str, CompareOp, f64)> {
    let ExprKind::Compare { op, lhs, rhs } = &expr.kind else {
        return None;
    };
    if !matches!(
        op,
        CompareOp::Less | CompareOp::LessEq | CompareOp::Greater | CompareOp::GreaterEq
    ) {
        return None;
    }
    match (&lhs.kind, &rhs.kind) {
        (ExprKind::Identifier(name), ExprKind::NumberLit(n)) => Some((name, *op, *n)),
        (ExprKind::NumberLit(n), ExprKind::Identifier(name)) => Some((name, op.mirrored(), *n)),
        _ => None,
    }
}

pub(super) fn prune_ranges(expr: Expr, stats: &mut OptimizeStats) -> Expr {
    let expr = map_children(expr, &mut |child| prune_ranges(child, stats));

    if !matches!(expr.kind, ExprKind::And(..)) {
        return expr;
    }

    let mut operands = Vec::new();
    flatten_and(&expr, &mut operands);

    let mut by_ident: Vec<(String, Constraints)> = Vec::new();
    fn constraints_for(name: &str, by_ident: &mut Vec<(String, Constraints)>) -> usize {
        match by_ident.iter().position(|(n, _)| n == name) {
            Some(i) => i,
            None => {
                by_ident.push((name.to_owned(), Constraints::default()));
                by_ident.len() - 1
            }
        }
    }

    for (i, operand) in operands.iter().enumerate() {
        if let Some((name, value)) = eq_over_identifier(operand) {
            let slot = constraints_for(name, &mut by_ident);
            by_ident[slot].1.eqs.push((i, value));
        } else if let Some((name, op, value)) = numeric_bound(operand) {
            let slot = constraints_for(name, &mut by_ident);
            let bound = Bound {
                operand: i,
                value,
                strict: matches!(op, CompareOp::Less | CompareOp::Greater),
            };
            match op {
                CompareOp::Greater | CompareOp::GreaterEq => by_ident[slot].1.lowers.push(bound),
                _ => by_ident[slot].1.uppers.push(bound),
            }
        }
    }

    let mut drop: HashSet<usize> = HashSet::new();
    for (_, c) in &by_ident {
        match analyze(c, &mut drop) {
            Verdict::Unsatisfiable => {
                stats.ranges_pruned += 1;
                return super::constant(false, &expr);
            }
            Verdict::Ok => {}
        }
    }

    if drop.is_empty() {
        return expr;
    }
    stats.ranges_pruned += drop.len();

    let mut kept = operands
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !drop.contains(i))
        .map(|(_, operand)| operand);
    let first = kept.next().expect("an equality or bound is always kept");
    kept.fold(first, |chain, operand| {
        let pos = expr.pos;
        let span = expr.span;
        Expr::new(ExprKind::And(Box::new(chain), Box::new(operand)), pos, span)
    })
}

enum Verdict {
    Ok,
    Unsatisfiable,
}

fn analyze(c: &Constraints, drop: &mut HashSet<usize>) -> Verdict {
    // Clashing equalities can never both hold.
    for (i, (_, a)) in c.eqs.iter().enumerate() {
        for (_, b) in &c.eqs[i + 1..] {
            if !a.loose_eq(b) {
                return Verdict::Unsatisfiable;
            }
        }
    }

    if let Some((first, value)) = c.eqs.first() {
        // Duplicate equalities collapse onto the first.
        for (i, _) in &c.eqs[1..] {
            if *i != *first {
                drop.insert(*i);
            }
        }

        let has_bounds = !c.lowers.is_empty() || !c.uppers.is_empty();
        if has_bounds {
            let Value::Number(v) = value else {
                // A numeric bound needs a numeric value; the equality pins a
                // non-number.
                return Verdict::Unsatisfiable;
            };
            for bound in &c.lowers {
                if !bound.admits_lower(*v) {
                    return Verdict::Unsatisfiable;
                }
            }
            for bound in &c.uppers {
                if !bound.admits_upper(*v) {
                    return Verdict::Unsatisfiable;
                }
            }
            // The equality implies every surviving bound.
            for bound in c.lowers.iter().chain(&c.uppers) {
                drop.insert(bound.operand);
            }
        }
        return Verdict::Ok;
    }

    let best_lower = keep_tightest(&c.lowers, Bound::tighter_lower, drop);
    let best_upper = keep_tightest(&c.uppers, Bound::tighter_upper, drop);

    if let (Some(lo), Some(hi)) = (best_lower, best_upper) {
        if lo.value > hi.value || (lo.value == hi.value && (lo.strict || hi.strict)) {
            return Verdict::Unsatisfiable;
        }
    }

    Verdict::Ok
}

fn keep_tightest(
    bounds: &[Bound],
    tighter: impl Fn(&Bound, &Bound) -> bool,
    drop: &mut HashSet<usize>,
) -> Option<Bound> {
    let mut best: Option<Bound> = None;
    for bound in bounds {
        match &best {
            None => best = Some(*bound),
            Some(current) => {
                if tighter(bound, current) {
                    drop.insert(current.operand);
                    best = Some(*bound);
                } else {
                    drop.insert(bound.operand);
                }
            }
        }
    }
    best
}
