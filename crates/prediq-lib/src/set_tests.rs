use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::document::Document;
use crate::eval::{ResolveError, Resolver};
use crate::predicate::Predicate;
use crate::set::{CompileConfig, OptimizedPredicateSet, PredicateSet};
use crate::value::Value;

#[track_caller]
fn preds(sources: &[&str]) -> Vec<Predicate> {
    sources
        .iter()
        .map(|s| {
            let p = Predicate::new(*s);
            assert!(p.is_valid(), "bad test predicate {s:?}");
            p
        })
        .collect()
}

fn doc(json: &str) -> Document {
    Document::from_json_str(json).expect("test documents are JSON objects")
}

fn sources<'p>(matches: &[&'p Predicate]) -> Vec<&'p str> {
    matches.iter().map(|p| p.source()).collect()
}

struct CountingResolver {
    counts: Mutex<HashMap<String, usize>>,
}

impl CountingResolver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            counts: Mutex::new(HashMap::new()),
        })
    }

    fn count(&self, name: &str) -> usize {
        self.counts.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl Resolver for CountingResolver {
    fn resolve(&self, name: &str, doc: &Document) -> Result<Value, ResolveError> {
        *self.counts.lock().unwrap().entry(name.to_owned()).or_insert(0) += 1;
        Ok(doc.get(name).cloned().unwrap_or(Value::Undefined))
    }
}

// =============================================================================
// Simple set
// =============================================================================

#[test]
fn simple_set_fans_out_in_insertion_order() {
    let set = PredicateSet::new(preds(&["a = 1", "b = 2", "a = 1 and b = 2"])).unwrap();
    let matches = set.evaluate(&doc(r#"{"a": 1, "b": 2}"#));
    assert_eq!(sources(&matches), vec!["a = 1", "b = 2", "a = 1 and b = 2"]);

    let matches = set.evaluate(&doc(r#"{"a": 1, "b": 9}"#));
    assert_eq!(sources(&matches), vec!["a = 1"]);
}

#[test]
fn simple_set_rejects_invalid_predicates() {
    let mut set = PredicateSet::default();
    assert!(set.add(Predicate::new("a and")).is_err());
    assert!(set.add(Predicate::new("a = 1")).is_ok());
}

// =============================================================================
// Optimized set: scenario E and tree behavior
// =============================================================================

#[test]
fn scenario_e_shared_branch_evaluates_once() {
    let mut set = OptimizedPredicateSet::new(preds(&["a and b", "a and c"])).unwrap();
    set.compile_ast();

    let resolver = CountingResolver::new();
    set.set_resolver(resolver.clone());

    // a = false: no matches, and neither b nor c is ever consulted.
    let matches = set.evaluate(&doc(r#"{"a": false, "b": true, "c": true}"#));
    assert!(matches.is_empty());
    assert_eq!(resolver.count("a"), 1);
    assert_eq!(resolver.count("b"), 0);
    assert_eq!(resolver.count("c"), 0);
}

#[test]
fn scenario_e_true_branch_evaluates_residuals() {
    let mut set = OptimizedPredicateSet::new(preds(&["a and b", "a and c"])).unwrap();
    set.compile_ast();

    let resolver = CountingResolver::new();
    set.set_resolver(resolver.clone());

    let matches = set.evaluate(&doc(r#"{"a": true, "b": true, "c": false}"#));
    assert_eq!(sources(&matches), vec!["a and b"]);
    assert_eq!(resolver.count("a"), 1);
    assert_eq!(resolver.count("b"), 1);
    assert_eq!(resolver.count("c"), 1);
}

#[test]
fn compilation_builds_a_branch_for_the_shared_test() {
    let mut set = OptimizedPredicateSet::new(preds(&["a and b", "a and c"])).unwrap();
    assert!(!set.is_compiled());
    set.compile_ast();
    assert!(set.is_compiled());

    let description = set.description();
    assert!(description.contains("branch a"), "got:\n{description}");
}

#[test]
fn uncompiled_set_still_evaluates() {
    let set = OptimizedPredicateSet::new(preds(&["a = 1", "b = 2"])).unwrap();
    let matches = set.evaluate(&doc(r#"{"a": 1, "b": 2}"#));
    assert_eq!(sources(&matches), vec!["a = 1", "b = 2"]);
}

#[test]
fn add_invalidates_the_tree() {
    let mut set = OptimizedPredicateSet::new(preds(&["a and b", "a and c"])).unwrap();
    set.compile_ast();
    assert!(set.is_compiled());

    set.add(Predicate::new("a and d")).unwrap();
    assert!(!set.is_compiled());

    set.compile_ast();
    let matches = set.evaluate(&doc(r#"{"a": true, "d": true}"#));
    assert_eq!(sources(&matches), vec!["a and d"]);
}

#[test]
fn finalize_keeps_evaluation_working() {
    let mut set = OptimizedPredicateSet::new(preds(&["a and b", "a and c", "x = 1"])).unwrap();
    set.compile_ast();
    set.finalize();

    let matches = set.evaluate(&doc(r#"{"a": true, "b": true, "x": 1}"#));
    assert_eq!(sources(&matches), vec!["a and b", "x = 1"]);
}

#[test]
fn finalize_compiles_when_needed() {
    let mut set = OptimizedPredicateSet::new(preds(&["a and b", "a and c"])).unwrap();
    set.finalize();
    assert!(set.is_compiled());
}

#[test]
fn analyze_reports_any_match_and_context() {
    let set = OptimizedPredicateSet::new(preds(&["a = 1", "b = 2"])).unwrap();

    let d1 = doc(r#"{"a": 1}"#);
    let (any, matches, _ctx) = set.analyze(&d1);
    assert!(any);
    assert_eq!(sources(&matches), vec!["a = 1"]);

    let d2 = doc(r#"{"a": 0, "b": 0}"#);
    let (any, matches, _ctx) = set.analyze(&d2);
    assert!(!any);
    assert!(matches.is_empty());
}

#[test]
fn predicates_collapsing_to_false_are_dropped_from_a_side() {
    // On the a = false side, `a` alone collapses away entirely while
    // `a or z` still needs z.
    let mut set = OptimizedPredicateSet::new(preds(&["a and b", "a", "a or z"])).unwrap();
    set.compile_ast();

    let matches = set.evaluate(&doc(r#"{"a": false, "b": true, "z": true}"#));
    assert_eq!(sources(&matches), vec!["a or z"]);

    let matches = set.evaluate(&doc(r#"{"a": true, "b": false, "z": false}"#));
    assert_eq!(sources(&matches), vec!["a", "a or z"]);
}

#[test]
fn config_thresholds_disable_hoisting() {
    let config = CompileConfig::default().with_min_count(100);
    let mut set =
        OptimizedPredicateSet::with_config(preds(&["a and b", "a and c"]), config).unwrap();
    set.compile_ast();

    // No candidate clears min_count; the tree is a single leaf but still
    // evaluates correctly.
    let description = set.description();
    assert!(!description.contains("branch"), "got:\n{description}");
    let matches = set.evaluate(&doc(r#"{"a": true, "b": true, "c": true}"#));
    assert_eq!(sources(&matches), vec!["a and b", "a and c"]);
}

// =============================================================================
// Parity: the optimized set returns exactly the simple set's matches
// =============================================================================

#[test]
fn optimized_set_matches_simple_set_on_every_document() {
    let sources_list = [
        "a and b",
        "a and c",
        "a or b",
        "x = 1 and a",
        "x = 1 or x = 2",
        "not a",
        "errors contains 'CPU load'",
        "x > 2 and x < 10",
    ];
    let docs = [
        r#"{"a": true, "b": true, "c": false, "x": 1, "errors": ["CPU load"]}"#,
        r#"{"a": false, "b": true, "c": true, "x": 2, "errors": []}"#,
        r#"{"a": true, "b": false, "c": true, "x": 5}"#,
        r#"{"x": 12}"#,
        "{}",
    ];

    let simple = PredicateSet::new(preds(&sources_list)).unwrap();
    let mut optimized = OptimizedPredicateSet::new(preds(&sources_list)).unwrap();
    optimized.compile_ast();

    for json in docs {
        let d = doc(json);
        assert_eq!(
            sources(&simple.evaluate(&d)),
            sources(&optimized.evaluate(&d)),
            "match sets diverge on {json}"
        );
    }
}

#[test]
fn deep_populations_respect_the_depth_cap() {
    let config = CompileConfig::default().with_max_depth(2);
    let sources_list: Vec<String> = (0..6)
        .map(|i| format!("shared = 1 and f{i} = {i}"))
        .collect();
    let refs: Vec<&str> = sources_list.iter().map(String::as_str).collect();

    let mut set = OptimizedPredicateSet::with_config(preds(&refs), config).unwrap();
    set.compile_ast();

    let d = doc(r#"{"shared": 1, "f0": 0, "f3": 3}"#);
    let matches = set.evaluate(&d);
    assert_eq!(
        sources(&matches),
        vec![refs[0], refs[3]],
        "depth-capped tree must still match correctly"
    );
}
