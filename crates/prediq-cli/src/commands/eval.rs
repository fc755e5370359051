//! `prediq eval` - evaluate one predicate against one document.

use serde::Serialize;

use super::{load_document, load_predicate};

#[derive(Serialize)]
struct Explanation<'a> {
    result: bool,
    failed: &'a [String],
    literals: serde_json::Map<String, serde_json::Value>,
}

pub fn run(source: &str, doc_json: &str, explain: bool, colored: bool) -> i32 {
    let Some(pred) = load_predicate(source, colored) else {
        return 2;
    };
    let Some(doc) = load_document(doc_json) else {
        return 2;
    };

    let (result, ctx) = pred.analyze(&doc).expect("predicate validated above");

    if explain {
        let literals = ctx
            .literals()
            .iter()
            .map(|(form, value)| {
                let json = serde_json::to_value(value).expect("values serialize");
                (form.clone(), json)
            })
            .collect();
        let explanation = Explanation {
            result,
            failed: ctx.failed(),
            literals,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&explanation).expect("explanation serializes")
        );
    } else {
        println!("{result}");
    }

    if result { 0 } else { 1 }
}
