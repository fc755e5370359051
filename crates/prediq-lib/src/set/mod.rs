//! Predicate sets: matching one document against a population of
//! predicates.
//!
//! [`PredicateSet`] is the baseline - a linear fan-out of `evaluate` across
//! members. [`OptimizedPredicateSet`] compiles the population into a single
//! decision tree that factors shared subexpressions into branches, so a
//! test appearing in many predicates is evaluated once per document.

mod compile;

pub use compile::CompileConfig;

use std::fmt::Write;
use std::sync::Arc;

use crate::Error;
use crate::ast::{Constant, Expr, ExprKind};
use crate::document::Document;
use crate::eval::{self, DefaultResolver, EvalContext, Resolver};
use crate::predicate::Predicate;

use compile::DecisionNode;

/// Linear fan-out of `evaluate(doc)` across members.
#[derive(Debug, Clone, Default)]
pub struct PredicateSet {
    preds: Vec<Predicate>,
}

impl PredicateSet {
    pub fn new(preds: Vec<Predicate>) -> Result<Self, Error> {
        let mut set = Self::default();
        set.update(preds)?;
        Ok(set)
    }

    pub fn add(&mut self, pred: Predicate) -> Result<(), Error> {
        if !pred.is_valid() {
            return Err(Error::invalid(&pred));
        }
        self.preds.push(pred);
        Ok(())
    }

    pub fn update(&mut self, preds: Vec<Predicate>) -> Result<(), Error> {
        for pred in preds {
            self.add(pred)?;
        }
        Ok(())
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.preds
    }

    /// All members matching the document, in insertion order.
    pub fn evaluate(&self, doc: &Document) -> Vec<&Predicate> {
        self.preds
            .iter()
            .filter(|p| p.evaluate(doc).unwrap_or(false))
            .collect()
    }
}

/// A population of predicates compiled into a decision tree.
///
/// Internal nodes are shared subexpressions; leaves carry the predicates
/// still live there plus the residual each needs to finish. Construction is
/// lazy: `add`/`update` invalidate the tree,
/// [`compile_ast`](Self::compile_ast) forces a rebuild, and `evaluate`
/// falls back to a linear scan when no tree is built.
pub struct OptimizedPredicateSet {
    preds: Vec<Arc<Predicate>>,
    config: CompileConfig,
    resolver: Arc<dyn Resolver + Send + Sync>,
    tree: Option<DecisionNode>,
    /// Residual ASTs retained for recompiles; dropped by `finalize`.
    compile_inputs: Option<Vec<(usize, Expr)>>,
    finalized: bool,
}

impl OptimizedPredicateSet {
    pub fn new(preds: Vec<Predicate>) -> Result<Self, Error> {
        Self::with_config(preds, CompileConfig::default())
    }

    pub fn with_config(preds: Vec<Predicate>, config: CompileConfig) -> Result<Self, Error> {
        let mut set = Self {
            preds: Vec::new(),
            config,
            resolver: Arc::new(DefaultResolver),
            tree: None,
            compile_inputs: None,
            finalized: false,
        };
        set.update(preds)?;
        Ok(set)
    }

    /// Installs the resolver used for every branch and residual evaluation.
    /// The whole population shares it; per-predicate resolvers do not apply
    /// inside an optimized set.
    pub fn set_resolver(&mut self, resolver: Arc<dyn Resolver + Send + Sync>) {
        self.resolver = resolver;
    }

    pub fn add(&mut self, pred: Predicate) -> Result<(), Error> {
        if !pred.is_valid() {
            return Err(Error::invalid(&pred));
        }
        self.preds.push(Arc::new(pred));
        self.invalidate();
        Ok(())
    }

    pub fn update(&mut self, preds: Vec<Predicate>) -> Result<(), Error> {
        for pred in preds {
            self.add(pred)?;
        }
        Ok(())
    }

    fn invalidate(&mut self) {
        self.tree = None;
        self.compile_inputs = None;
        self.finalized = false;
    }

    pub fn predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.preds.iter().map(|p| p.as_ref())
    }

    pub fn is_compiled(&self) -> bool {
        self.tree.is_some()
    }

    /// Forces the decision-tree build.
    pub fn compile_ast(&mut self) {
        let inputs: Vec<(usize, Expr)> = match self.compile_inputs.take() {
            Some(inputs) if inputs.len() == self.preds.len() => inputs,
            _ => self
                .preds
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let ast = p.optimized_ast().expect("set members are valid");
                    (i, ast.clone())
                })
                .collect(),
        };
        self.tree = Some(compile::compile(&inputs, &self.config));
        self.compile_inputs = Some(inputs);
    }

    /// Drops compile-time bookkeeping, keeping only what evaluation needs.
    /// A later `add`/`update` recomputes from the predicates themselves.
    pub fn finalize(&mut self) {
        if self.tree.is_none() {
            self.compile_ast();
        }
        self.compile_inputs = None;
        self.finalized = true;
    }

    /// All members matching the document, in insertion order.
    ///
    /// Descends the tree, evaluating each branch expression once (the result
    /// also lands in the shared subexpression cache for the leaf's
    /// residuals), then evaluates the residual predicates at the single
    /// reached leaf.
    pub fn evaluate(&self, doc: &Document) -> Vec<&Predicate> {
        self.analyze(doc).1
    }

    /// Like `evaluate`, also exposing whether anything matched and the
    /// evaluation context (failure trail, literal captures).
    pub fn analyze<'s, 'd>(
        &'s self,
        doc: &'d Document,
    ) -> (bool, Vec<&'s Predicate>, EvalContext<'d>) {
        // The context is shared across the whole descent so branch results
        // are reused by residuals through the subexpression cache.
        let mut ctx = EvalContext::new(doc, self.resolver.clone());

        let mut matched: Vec<usize> = Vec::new();
        match &self.tree {
            Some(tree) => Self::descend(tree, &mut ctx, &mut matched),
            None => {
                for (i, pred) in self.preds.iter().enumerate() {
                    if let Some(ast) = pred.optimized_ast() {
                        if eval::eval_bool(ast, &mut ctx) {
                            matched.push(i);
                        }
                    }
                }
            }
        }

        matched.sort_unstable();
        let matches: Vec<&Predicate> = matched.iter().map(|&i| self.preds[i].as_ref()).collect();
        (!matches.is_empty(), matches, ctx)
    }

    fn descend(node: &DecisionNode, ctx: &mut EvalContext<'_>, matched: &mut Vec<usize>) {
        match node {
            DecisionNode::Branch {
                expr,
                if_true,
                if_false,
                ..
            } => {
                let side = if eval::eval_bool(expr, ctx) {
                    if_true
                } else {
                    if_false
                };
                Self::descend(side, ctx, matched);
            }
            DecisionNode::Leaf {
                residuals,
                unconditional,
            } => {
                matched.extend(unconditional.iter().copied());
                for (idx, residual) in residuals {
                    if eval::eval_bool(residual, ctx) {
                        matched.push(*idx);
                    }
                }
            }
        }
    }

    /// Renders the decision tree. Compile first; uncompiled sets render a
    /// placeholder line.
    pub fn description(&self) -> String {
        let mut out = String::new();
        match &self.tree {
            Some(tree) => Self::describe_node(tree, 0, &mut out),
            None => {
                let _ = writeln!(out, "uncompiled set of {} predicates", self.preds.len());
            }
        }
        out
    }

    fn describe_node(node: &DecisionNode, depth: usize, out: &mut String) {
        let indent = depth * 4;
        match node {
            DecisionNode::Branch {
                fingerprint,
                if_true,
                if_false,
                ..
            } => {
                let _ = writeln!(out, "{:indent$}branch {fingerprint}", "");
                let _ = writeln!(out, "{:indent$}true ->", "", indent = indent + 2);
                Self::describe_node(if_true, depth + 1, out);
                let _ = writeln!(out, "{:indent$}false ->", "", indent = indent + 2);
                Self::describe_node(if_false, depth + 1, out);
            }
            DecisionNode::Leaf {
                residuals,
                unconditional,
            } => {
                for idx in unconditional {
                    let _ = writeln!(out, "{:indent$}match P{idx}", "");
                }
                for (idx, residual) in residuals {
                    let _ = writeln!(out, "{:indent$}P{idx}: {}", "", residual.fingerprint());
                }
                if unconditional.is_empty() && residuals.is_empty() {
                    let _ = writeln!(out, "{:indent$}no live predicates", "");
                }
            }
        }
    }
}

impl std::fmt::Debug for OptimizedPredicateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizedPredicateSet")
            .field("predicates", &self.preds.len())
            .field("compiled", &self.tree.is_some())
            .field("finalized", &self.finalized)
            .finish()
    }
}

/// Split a residual into unconditional / dropped / live after optimization.
pub(crate) fn classify(expr: &Expr) -> Residual {
    match expr.kind {
        ExprKind::Constant(Constant::True) => Residual::AlwaysTrue,
        ExprKind::Constant(Constant::False) => Residual::AlwaysFalse,
        _ => Residual::Live,
    }
}

pub(crate) enum Residual {
    AlwaysTrue,
    AlwaysFalse,
    Live,
}
