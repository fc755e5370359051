//! Evaluation: a pure function from (AST, context) to bool.
//!
//! Each evaluation owns an [`EvalContext`]: the identifier cache (one
//! resolution per name per evaluation), the literal capture map, the failure
//! trail, and a subexpression result cache keyed by fingerprint.
//!
//! # Failure trail
//!
//! Reasons are pushed in post-order as subtrees fail, and every node
//! truncates the trail back to its entry mark when it evaluates to true.
//! The net effect: the trail is empty exactly when the predicate holds, and
//! a failing evaluation reads as the ordered story of what went wrong.

mod resolve;

pub use resolve::{DefaultResolver, ResolveError, Resolver};

pub(crate) use resolve::constant_value;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::{Expr, ExprKind};
use crate::document::Document;
use crate::value::Value;

/// Cached outcome of a subexpression, replayed on fingerprint hits.
#[derive(Debug, Clone)]
struct CachedEval {
    result: bool,
    literals: Vec<(String, Value)>,
    reasons: Vec<String>,
}

/// Per-evaluation scratch space.
pub struct EvalContext<'a> {
    doc: &'a Document,
    resolver: Arc<dyn Resolver + Send + Sync>,
    /// First resolution wins; later lookups of the same name are served from
    /// here so explanations stay consistent with the boolean result.
    idents: IndexMap<String, Value>,
    literals: IndexMap<String, Value>,
    literal_log: Vec<(String, Value)>,
    failed: Vec<String>,
    subexpr: HashMap<String, CachedEval>,
}

impl<'a> EvalContext<'a> {
    pub fn new(doc: &'a Document, resolver: Arc<dyn Resolver + Send + Sync>) -> Self {
        Self {
            doc,
            resolver,
            idents: IndexMap::new(),
            literals: IndexMap::new(),
            literal_log: Vec::new(),
            failed: Vec::new(),
            subexpr: HashMap::new(),
        }
    }

    /// Ordered failure reasons; empty iff the evaluation returned true.
    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    /// Map from textual expression form to the value observed during
    /// evaluation.
    pub fn literals(&self) -> &IndexMap<String, Value> {
        &self.literals
    }

    pub fn document(&self) -> &Document {
        self.doc
    }

    fn resolve_identifier(&mut self, name: &str) -> Value {
        if let Some(v) = self.idents.get(name) {
            return v.clone();
        }
        // Resolver failures are explanatory, not fatal.
        let value = self
            .resolver
            .resolve(name, self.doc)
            .unwrap_or(Value::Undefined);
        self.idents.insert(name.to_owned(), value.clone());
        self.record_literal(name, value.clone());
        value
    }

    fn record_literal(&mut self, form: &str, value: Value) {
        self.literal_log.push((form.to_owned(), value.clone()));
        self.literals.insert(form.to_owned(), value);
    }

    fn push_reason(&mut self, reason: String) {
        self.failed.push(reason);
    }
}

/// Evaluates `expr` to a boolean under the trail discipline described in the
/// module docs.
pub(crate) fn eval_bool(expr: &Expr, ctx: &mut EvalContext) -> bool {
    let fingerprint = expr.fingerprint();

    if let Some(hit) = ctx.subexpr.get(&fingerprint).cloned() {
        for (form, value) in &hit.literals {
            ctx.record_literal(form, value.clone());
        }
        if !hit.result {
            for reason in &hit.reasons {
                ctx.push_reason(reason.clone());
            }
        }
        return hit.result;
    }

    let trail_mark = ctx.failed.len();
    let literal_mark = ctx.literal_log.len();

    let result = eval_bool_uncached(expr, ctx);

    if result {
        ctx.failed.truncate(trail_mark);
    }

    let cached = CachedEval {
        result,
        literals: ctx.literal_log[literal_mark..].to_vec(),
        reasons: ctx.failed[trail_mark..].to_vec(),
    };
    ctx.subexpr.insert(fingerprint, cached);

    result
}

fn eval_bool_uncached(expr: &Expr, ctx: &mut EvalContext) -> bool {
    match &expr.kind {
        ExprKind::Not(child) => {
            if eval_bool(child, ctx) {
                ctx.push_reason(format!(
                    "Negation of {} at {} was true for NegateOperator at {}",
                    child.kind_name(),
                    child.pos,
                    expr.pos
                ));
                false
            } else {
                true
            }
        }
        ExprKind::And(lhs, rhs) => {
            if !eval_bool(lhs, ctx) {
                // Left side's own reason is already on the trail.
                return false;
            }
            if !eval_bool(rhs, ctx) {
                ctx.push_reason(format!(
                    "Right side failed for LogicalOperator 'and' at {}",
                    expr.pos
                ));
                return false;
            }
            true
        }
        ExprKind::Or(lhs, rhs) => {
            // Both branches push their own reasons when both fail.
            eval_bool(lhs, ctx) || eval_bool(rhs, ctx)
        }
        ExprKind::Compare { op, lhs, rhs } => eval_compare(expr, *op, lhs, rhs, ctx),
        ExprKind::Contains { container, probe } => eval_contains(expr, container, probe, ctx),
        ExprKind::Matches { ident, regex } => eval_matches(expr, ident, regex, ctx),
        // A leaf at boolean position is its truthiness.
        _ => {
            let value = eval_value(expr, ctx);
            if value.truthy() {
                true
            } else {
                ctx.push_reason(format!(
                    "Value {} is falsey for {} at {}",
                    value,
                    expr.kind_name(),
                    expr.pos
                ));
                false
            }
        }
    }
}

fn eval_compare(
    expr: &Expr,
    op: crate::ast::CompareOp,
    lhs: &Expr,
    rhs: &Expr,
    ctx: &mut EvalContext,
) -> bool {
    use crate::ast::CompareOp;

    let lv = eval_value(lhs, ctx);
    let rv = eval_value(rhs, ctx);

    // `is` / `is not` treat Undefined as a comparable value.
    if matches!(op, CompareOp::Is | CompareOp::IsNot) {
        let eq = lv.is_eq(&rv);
        let result = if op == CompareOp::Is { eq } else { !eq };
        if !result {
            ctx.push_reason(format!(
                "Left side: {} {} right side: {} failed for CompareOperator at {}",
                lv,
                op.symbol(),
                rv,
                expr.pos
            ));
        }
        return result;
    }

    if lv.is_undefined() {
        ctx.push_reason(format!(
            "Left side of CompareOperator at {} is Undefined",
            expr.pos
        ));
        return false;
    }
    if rv.is_undefined() {
        ctx.push_reason(format!(
            "Right side of CompareOperator at {} is Undefined",
            expr.pos
        ));
        return false;
    }

    let result = match op {
        CompareOp::Eq => lv.loose_eq(&rv),
        CompareOp::NotEq => !lv.loose_eq(&rv),
        CompareOp::Less | CompareOp::LessEq | CompareOp::Greater | CompareOp::GreaterEq => {
            match lv.partial_cmp_values(&rv) {
                Some(ord) => match op {
                    CompareOp::Less => ord.is_lt(),
                    CompareOp::LessEq => ord.is_le(),
                    CompareOp::Greater => ord.is_gt(),
                    CompareOp::GreaterEq => ord.is_ge(),
                    _ => unreachable!("ordering op"),
                },
                None => {
                    ctx.push_reason(format!(
                        "Cannot compare left side: {} with right side: {} for CompareOperator at {}",
                        lv, rv, expr.pos
                    ));
                    return false;
                }
            }
        }
        CompareOp::Is | CompareOp::IsNot => unreachable!("handled above"),
    };

    if !result {
        ctx.push_reason(format!(
            "Left side: {} {} right side: {} failed for CompareOperator at {}",
            lv,
            op.symbol(),
            rv,
            expr.pos
        ));
    }
    result
}

fn eval_contains(expr: &Expr, container: &Expr, probe: &Expr, ctx: &mut EvalContext) -> bool {
    let cv = eval_value(container, ctx);
    let pv = eval_value(probe, ctx);

    if cv.is_undefined() {
        ctx.push_reason(format!(
            "Left side of ContainsOperator at {} is Undefined",
            expr.pos
        ));
        return false;
    }

    let held = match &cv {
        Value::Seq(items) => items.iter().any(|item| item.loose_eq(&pv)),
        Value::Set(set) => set.contains(&pv),
        Value::Str(haystack) => match &pv {
            Value::Str(needle) => haystack.contains(needle.as_str()),
            _ => false,
        },
        _ => {
            ctx.push_reason(format!(
                "Left side: {} is not a container for ContainsOperator at {}",
                cv, expr.pos
            ));
            return false;
        }
    };

    if !held {
        ctx.push_reason(format!(
            "Right side: {} not in left side: {} for ContainsOperator at {}",
            pv, cv, expr.pos
        ));
    }
    held
}

fn eval_matches(expr: &Expr, ident: &Expr, regex: &Expr, ctx: &mut EvalContext) -> bool {
    let value = eval_value(ident, ctx);
    let ExprKind::RegexLit(re) = &regex.kind else {
        // Semantic validation rejects this shape; stay total regardless.
        ctx.push_reason(format!(
            "Right side of MatchOperator at {} is not a regex",
            expr.pos
        ));
        return false;
    };

    match &value {
        Value::Str(s) => {
            if re.is_match(s) {
                true
            } else {
                ctx.push_reason(format!(
                    "Value: {} does not match /{}/{} for MatchOperator at {}",
                    value,
                    re.pattern(),
                    re.flags(),
                    expr.pos
                ));
                false
            }
        }
        Value::Undefined => {
            ctx.push_reason(format!(
                "Left side of MatchOperator at {} is Undefined",
                expr.pos
            ));
            false
        }
        other => {
            ctx.push_reason(format!(
                "Left side: {} is not a string for MatchOperator at {}",
                other, expr.pos
            ));
            false
        }
    }
}

/// Evaluates an expression at value position.
pub(crate) fn eval_value(expr: &Expr, ctx: &mut EvalContext) -> Value {
    match &expr.kind {
        ExprKind::Identifier(name) => ctx.resolve_identifier(name),
        ExprKind::StringLit(s) => Value::Str(s.clone()),
        ExprKind::NumberLit(n) => Value::Number(*n),
        ExprKind::Constant(c) => c.value(),
        ExprKind::RegexLit(re) => Value::Regex(re.clone()),
        ExprKind::LiteralSet(set) => Value::Set(set.clone()),
        // A composite at value position is its boolean result.
        _ => Value::Bool(eval_bool(expr, ctx)),
    }
}
