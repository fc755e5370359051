//! `prediq match` - match a document against a predicate population.

use std::path::Path;

use prediq_lib::{OptimizedPredicateSet, Predicate, PredicateSet};

use super::{load_document, load_predicate};

pub fn run(preds_path: &Path, doc_json: &str, simple: bool, colored: bool) -> i32 {
    let source = match std::fs::read_to_string(preds_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: cannot read {}: {err}", preds_path.display());
            return 2;
        }
    };

    let mut preds: Vec<Predicate> = Vec::new();
    let mut bad = 0;
    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match load_predicate(line, colored) {
            Some(pred) => preds.push(pred),
            None => bad += 1,
        }
    }
    if bad > 0 {
        eprintln!("error: {bad} invalid predicate(s)");
        return 2;
    }

    let Some(doc) = load_document(doc_json) else {
        return 2;
    };

    let matches: Vec<String> = if simple {
        let set = PredicateSet::new(preds).expect("members validated above");
        set.evaluate(&doc)
            .into_iter()
            .map(|p| p.source().to_owned())
            .collect()
    } else {
        let mut set = OptimizedPredicateSet::new(preds).expect("members validated above");
        set.compile_ast();
        set.evaluate(&doc)
            .into_iter()
            .map(|p| p.source().to_owned())
            .collect()
    };

    for source in &matches {
        println!("{source}");
    }

    if matches.is_empty() { 1 } else { 0 }
}
