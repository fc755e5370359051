use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::document::Document;
use crate::eval::{ResolveError, Resolver};
use crate::predicate::Predicate;
use crate::value::Value;

#[track_caller]
fn pred(source: &str) -> Predicate {
    let p = Predicate::new(source);
    assert!(
        p.is_valid(),
        "expected valid predicate {source:?}:\n{}",
        p.diagnostics_printer().render()
    );
    p
}

fn doc(json: &str) -> Document {
    Document::from_json_str(json).expect("test documents are JSON objects")
}

/// Counts resolutions per name; proves caching and short-circuit behavior.
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
// End-to-end scenarios
// =============================================================================

#[test]
fn scenario_a_conjunction_of_is_comparisons() {
    let p = pred("name is 'Jack' and friend_name is 'Jill'");
    assert!(p.evaluate(&doc(r#"{"name": "Jack", "friend_name": "Jill"}"#)).unwrap());
    assert!(!p.evaluate(&doc(r#"{"name": "Jack", "friend_name": "Joan"}"#)).unwrap());
}

#[test]
fn scenario_b_failure_trail_names_the_contains_operator() {
    let p = pred(
        r#"server matches "east-web-([\d]+)" and errors contains "CPU load" and environment != test"#,
    );
    let d = doc(r#"{"server": "east-web-001", "errors": [], "environment": "prod"}"#);

    let (result, ctx) = p.analyze(&d).unwrap();
    assert!(!result);
    let first = ctx.failed().first().expect("failing analyze leaves a trail");
    assert_eq!(
        first,
        "Right side: 'CPU load' not in left side: [] for ContainsOperator at line: 1, col 45"
    );
}

#[test]
fn scenario_c_literal_set_membership() {
    let p = pred(r#"{"WARN" "ERR" "CRIT"} contains error_level"#);
    assert!(p.evaluate(&doc(r#"{"error_level": "ERR"}"#)).unwrap());
    assert!(!p.evaluate(&doc(r#"{"error_level": "INFO"}"#)).unwrap());
}

#[test]
fn scenario_f_undefined_semantics() {
    let p = pred("undefined_field is undefined");
    assert!(p.evaluate(&doc("{}")).unwrap());

    let p = pred("undefined_field = 1");
    let d = doc("{}");
    let (result, ctx) = p.analyze(&d).unwrap();
    assert!(!result);
    assert_eq!(
        ctx.failed()[0],
        "Left side of CompareOperator at line: 1, col 16 is Undefined"
    );
}

// =============================================================================
// Semantics
// =============================================================================

#[test]
fn and_short_circuits() {
    let p = pred("a = 1 and b = 2");
    let resolver = CountingResolver::new();
    let p = p.with_resolver(resolver.clone());

    assert!(!p.evaluate(&doc(r#"{"a": 9, "b": 2}"#)).unwrap());
    assert_eq!(resolver.count("a"), 1);
    assert_eq!(resolver.count("b"), 0);
}

#[test]
fn or_short_circuits() {
    let p = pred("a = 1 or b = 2").with_resolver(CountingResolver::new());
    assert!(p.evaluate(&doc(r#"{"a": 1}"#)).unwrap());
}

#[test]
fn or_appends_both_reasons_when_both_fail() {
    let p = pred("a = 1 or b = 2");
    let d = doc(r#"{"a": 5, "b": 5}"#);
    let (result, ctx) = p.analyze(&d).unwrap();
    assert!(!result);
    assert_eq!(ctx.failed().len(), 2);
    assert!(ctx.failed()[0].contains("Left side: 5 = right side: 1"));
    assert!(ctx.failed()[1].contains("Left side: 5 = right side: 2"));
}

#[test]
fn negation_records_the_inverted_branch() {
    let p = pred("not (a = 1)");
    let d1 = doc(r#"{"a": 1}"#);
    let (result, ctx) = p.analyze(&d1).unwrap();
    assert!(!result);
    assert!(ctx.failed()[0].starts_with("Negation of CompareOperator"));

    let d2 = doc(r#"{"a": 2}"#);
    let (result, ctx) = p.analyze(&d2).unwrap();
    assert!(result);
    assert!(ctx.failed().is_empty());
}

#[test]
fn type_mismatch_comparison_is_false_with_reason() {
    let p = pred("a > 'zebra'");
    let d = doc(r#"{"a": 5}"#);
    let (result, ctx) = p.analyze(&d).unwrap();
    assert!(!result);
    assert!(ctx.failed()[0].contains("Cannot compare"));
}

#[test]
fn string_containment_is_substring() {
    let p = pred("message contains 'disk'");
    assert!(p.evaluate(&doc(r#"{"message": "low disk space"}"#)).unwrap());
    assert!(!p.evaluate(&doc(r#"{"message": "all good"}"#)).unwrap());
}

#[test]
fn sequence_containment_is_by_equality() {
    let p = pred("codes contains 404");
    assert!(p.evaluate(&doc(r#"{"codes": [500, 404]}"#)).unwrap());
    assert!(!p.evaluate(&doc(r#"{"codes": [500]}"#)).unwrap());
}

#[test]
fn contains_on_non_container_is_false_with_reason() {
    let p = pred("port contains 8");
    let d = doc(r#"{"port": 80}"#);
    let (result, ctx) = p.analyze(&d).unwrap();
    assert!(!result);
    assert!(ctx.failed()[0].contains("is not a container"));
}

#[test]
fn contains_on_undefined_is_false_with_reason() {
    let p = pred("missing contains 'x'");
    let d = doc("{}");
    let (result, ctx) = p.analyze(&d).unwrap();
    assert!(!result);
    assert!(ctx.failed()[0].contains("is Undefined"));
}

#[test]
fn matches_on_non_string_is_false_with_reason() {
    let p = pred("port matches /80/");
    let d = doc(r#"{"port": 80}"#);
    let (result, ctx) = p.analyze(&d).unwrap();
    assert!(!result);
    assert!(ctx.failed()[0].contains("is not a string"));
}

#[test]
fn empty_constant_against_containers() {
    assert!(pred("errors = empty").evaluate(&doc(r#"{"errors": []}"#)).unwrap());
    assert!(pred("name = empty").evaluate(&doc(r#"{"name": ""}"#)).unwrap());
    assert!(!pred("errors = empty").evaluate(&doc(r#"{"errors": ["x"]}"#)).unwrap());
}

#[test]
fn null_is_distinct_from_missing() {
    let d = doc(r#"{"field": null}"#);
    assert!(pred("field is null").evaluate(&d).unwrap());
    assert!(!pred("field is undefined").evaluate(&d).unwrap());
    assert!(pred("other is undefined").evaluate(&d).unwrap());
}

#[test]
fn dotted_path_resolution() {
    let p = pred("meta.region = 'east'");
    assert!(p.evaluate(&doc(r#"{"meta": {"region": "east"}}"#)).unwrap());
    assert!(!p.evaluate(&doc(r#"{"meta": {}}"#)).unwrap());
}

#[test]
fn truthiness_of_bare_identifier() {
    let p = pred("enabled");
    assert!(p.evaluate(&doc(r#"{"enabled": true}"#)).unwrap());
    assert!(!p.evaluate(&doc(r#"{"enabled": false}"#)).unwrap());
    assert!(!p.evaluate(&doc("{}")).unwrap());
}

// =============================================================================
// Context: caches, trail discipline, literal captures
// =============================================================================

#[test]
fn identifier_resolution_is_cached_within_one_evaluation() {
    let p = pred("x = 1 or x = 2");
    let resolver = CountingResolver::new();
    let p = p.with_resolver(resolver.clone());

    assert!(p.evaluate(&doc(r#"{"x": 2}"#)).unwrap());
    assert_eq!(resolver.count("x"), 1);
}

#[test]
fn nondeterministic_resolver_still_sees_stable_values() {
    // A resolver that changes its answer every call; the cache must pin the
    // first answer for the whole evaluation.
    struct FlipFlop(Mutex<i64>);
    impl Resolver for FlipFlop {
        fn resolve(&self, _: &str, _: &Document) -> Result<Value, ResolveError> {
            let mut n = self.0.lock().unwrap();
            *n += 1;
            Ok(Value::Number(*n as f64))
        }
    }

    let p = pred("x = x").with_resolver(Arc::new(FlipFlop(Mutex::new(0))));
    assert!(p.evaluate(&Document::new()).unwrap());
}

#[test]
fn resolver_failure_reads_as_undefined() {
    let p = pred("x is undefined").with_resolver(Arc::new(
        |_: &str, _: &Document| -> Result<Value, ResolveError> {
            Err(ResolveError("backend down".into()))
        },
    ));
    assert!(p.evaluate(&Document::new()).unwrap());
}

#[test]
fn repeated_subexpressions_hit_the_cache() {
    let p = pred("(a = 1 and b = 2) or (a = 1 and c = 3)");
    let resolver = CountingResolver::new();
    let p = p.with_resolver(resolver.clone());

    assert!(p.evaluate(&doc(r#"{"a": 1, "b": 9, "c": 3}"#)).unwrap());
    // `a = 1` is evaluated once; its second occurrence replays the cache.
    assert_eq!(resolver.count("a"), 1);
}

#[test]
fn literal_captures_record_observed_values() {
    let p = pred("name is 'Jack' and age > 40");
    let d = doc(r#"{"name": "Jack", "age": 42}"#);
    let (result, ctx) = p.analyze(&d).unwrap();
    assert!(result);
    assert_eq!(ctx.literals().get("name"), Some(&Value::Str("Jack".into())));
    assert_eq!(ctx.literals().get("age"), Some(&Value::Number(42.0)));
}

#[test]
fn trail_is_empty_iff_true() {
    let cases = [
        ("a = 1", r#"{"a": 1}"#),
        ("a = 1", r#"{"a": 2}"#),
        ("not (a = 1)", r#"{"a": 1}"#),
        ("not (a = 1)", r#"{"a": 2}"#),
        ("a = 1 or b = 2", r#"{"a": 9, "b": 2}"#),
        ("a = 1 or b = 2", r#"{"a": 9, "b": 9}"#),
        ("a = 1 and b = 2", r#"{"a": 1, "b": 2}"#),
    ];
    for (source, json) in cases {
        let d = doc(json);
        let (result, ctx) = pred(source).analyze(&d).unwrap();
        assert_eq!(
            result,
            ctx.failed().is_empty(),
            "trail/result mismatch for {source} on {json}: {:?}",
            ctx.failed()
        );
    }
}

#[test]
fn evaluate_agrees_with_analyze() {
    let sources = [
        "a = 1 and b = 2",
        "a = 1 or b = 2",
        "not (a = 1)",
        "{1 2 3} contains a",
        "name matches /^j/i",
    ];
    let docs = [r#"{"a": 1, "b": 2, "name": "Jack"}"#, r#"{"a": 7, "b": 7, "name": "x"}"#, "{}"];
    for source in sources {
        for json in docs {
            let p = pred(source);
            let d = doc(json);
            let direct = p.evaluate(&d).unwrap();
            let (analyzed, _) = p.analyze(&d).unwrap();
            assert_eq!(direct, analyzed, "disagreement for {source} on {json}");
        }
    }
}
