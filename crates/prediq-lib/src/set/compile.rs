//! Decision-tree compilation for the optimized predicate set.
//!
//! The build mines every boolean-position subexpression across the
//! population by fingerprint, picks the best-scoring shared one as a branch,
//! partitions each predicate by substituting `true`/`false` for the branch
//! and re-optimizing, then recurses under a depth budget. Ties break on
//! fingerprint order so the build is reproducible.

use indexmap::IndexMap;

use crate::ast::{Constant, Expr};
use crate::optimize::{CostModel, optimize_with};

use super::{Residual, classify};

/// Tuning knobs for the decision-tree build.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileConfig {
    /// A fingerprint must occur in at least this many predicates to become a
    /// branch candidate.
    pub min_count: usize,
    /// Maximum tree depth.
    pub max_depth: u32,
    /// Minimum estimated saving, in cost units, for a branch to be worth it.
    pub min_benefit: f64,
    /// Per-operation cost scores shared with the single-predicate optimizer.
    pub cost: CostModel,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            min_count: 2,
            max_depth: 8,
            min_benefit: 1.0,
            cost: CostModel::default(),
        }
    }
}

impl CompileConfig {
    pub fn with_min_count(mut self, min_count: usize) -> Self {
        self.min_count = min_count.max(2);
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_min_benefit(mut self, min_benefit: f64) -> Self {
        self.min_benefit = min_benefit;
        self
    }

    pub fn with_cost(mut self, cost: CostModel) -> Self {
        self.cost = cost;
        self
    }
}

/// One node of the compiled tree.
#[derive(Debug, Clone)]
pub(crate) enum DecisionNode {
    Branch {
        expr: Expr,
        fingerprint: String,
        if_true: Box<DecisionNode>,
        if_false: Box<DecisionNode>,
    },
    Leaf {
        /// `(predicate index, residual AST)` still live here, in index order.
        residuals: Vec<(usize, Expr)>,
        /// Predicates that match unconditionally at this leaf.
        unconditional: Vec<usize>,
    },
}

struct Candidate {
    expr: Expr,
    count: usize,
    cost: u32,
}

/// Compiles `(index, optimized AST)` pairs into a decision tree.
pub(crate) fn compile(preds: &[(usize, Expr)], config: &CompileConfig) -> DecisionNode {
    build(preds.to_vec(), config, 0)
}

fn build(items: Vec<(usize, Expr)>, config: &CompileConfig, depth: u32) -> DecisionNode {
    // Settle constants before looking for a branch.
    let mut unconditional = Vec::new();
    let mut live: Vec<(usize, Expr)> = Vec::new();
    for (idx, expr) in items {
        match classify(&expr) {
            Residual::AlwaysTrue => unconditional.push(idx),
            Residual::AlwaysFalse => {}
            Residual::Live => live.push((idx, expr)),
        }
    }

    if depth >= config.max_depth || live.len() < config.min_count {
        return leaf(live, unconditional);
    }

    let Some(branch) = select_branch(&live, config) else {
        return leaf(live, unconditional);
    };
    let fingerprint = branch.expr.fingerprint();

    let mut true_side = Vec::with_capacity(live.len());
    let mut false_side = Vec::with_capacity(live.len());
    for (idx, expr) in &live {
        if expr.contains_boolean_fingerprint(&fingerprint) {
            true_side.push((*idx, specialize(expr, &fingerprint, Constant::True, config)));
            false_side.push((*idx, specialize(expr, &fingerprint, Constant::False, config)));
        } else {
            true_side.push((*idx, expr.clone()));
            false_side.push((*idx, expr.clone()));
        }
    }

    let mut if_true = Box::new(build(true_side, config, depth + 1));
    let mut if_false = Box::new(build(false_side, config, depth + 1));

    // Predicates proven true before branching match on every side.
    if !unconditional.is_empty() {
        push_unconditional(&mut if_true, &unconditional);
        push_unconditional(&mut if_false, &unconditional);
    }

    DecisionNode::Branch {
        expr: branch.expr,
        fingerprint,
        if_true,
        if_false,
    }
}

fn leaf(mut live: Vec<(usize, Expr)>, mut unconditional: Vec<usize>) -> DecisionNode {
    live.sort_by_key(|(idx, _)| *idx);
    unconditional.sort_unstable();
    DecisionNode::Leaf {
        residuals: live,
        unconditional,
    }
}

fn push_unconditional(node: &mut DecisionNode, extra: &[usize]) {
    match node {
        DecisionNode::Branch {
            if_true, if_false, ..
        } => {
            push_unconditional(if_true, extra);
            push_unconditional(if_false, extra);
        }
        DecisionNode::Leaf { unconditional, .. } => {
            unconditional.extend_from_slice(extra);
            unconditional.sort_unstable();
            unconditional.dedup();
        }
    }
}

/// Substitutes the branch outcome into a predicate and re-optimizes.
fn specialize(expr: &Expr, fingerprint: &str, outcome: Constant, config: &CompileConfig) -> Expr {
    let substituted = expr.substitute_boolean(fingerprint, outcome);
    optimize_with(&substituted, &config.cost).0
}

/// Mines shared fingerprints and picks the best-scoring branch candidate,
/// or `None` when no candidate clears the thresholds.
fn select_branch(live: &[(usize, Expr)], config: &CompileConfig) -> Option<Candidate> {
    // Count each fingerprint once per predicate; insertion order makes the
    // tie-break deterministic.
    let mut candidates: IndexMap<String, Candidate> = IndexMap::new();
    for (_, expr) in live {
        let mut seen_here: Vec<String> = Vec::new();
        expr.for_each_boolean(&mut |sub| {
            if sub.is_ground() {
                return;
            }
            let fp = sub.fingerprint();
            if seen_here.contains(&fp) {
                return;
            }
            seen_here.push(fp.clone());
            candidates
                .entry(fp)
                .and_modify(|c| c.count += 1)
                .or_insert_with(|| Candidate {
                    expr: sub.clone(),
                    count: 1,
                    cost: config.cost.cost(sub),
                });
        });
    }

    let mut best: Option<(f64, String)> = None;
    for (fp, candidate) in &candidates {
        if candidate.count < config.min_count {
            continue;
        }
        // Evaluating once instead of `count` times saves `count - 1`
        // evaluations of the subexpression.
        let benefit = (candidate.count as f64 - 1.0) * candidate.cost.max(1) as f64;
        if benefit < config.min_benefit {
            continue;
        }
        let score = score(candidate, live.len());
        let better = match &best {
            None => true,
            Some((best_score, best_fp)) => {
                score > *best_score || (score == *best_score && fp < best_fp)
            }
        };
        if better {
            best = Some((score, fp.clone()));
        }
    }

    let (_, fp) = best?;
    candidates.swap_remove(&fp)
}

/// Prefers high occurrence, balanced partitions, and low cost. With static
/// selectivity fixed at 0.5 the discriminating-power term reduces to how
/// much of the population the branch covers.
fn score(candidate: &Candidate, population: usize) -> f64 {
    let coverage = candidate.count as f64 / population as f64;
    let discrimination = 2.0 * 0.5 * coverage;
    candidate.count as f64 * discrimination / (1.0 + candidate.cost as f64)
}
