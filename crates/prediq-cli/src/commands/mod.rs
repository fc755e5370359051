pub mod check;
pub mod describe;
pub mod eval;
pub mod matches;

use prediq_lib::{Document, Predicate};

/// Parses a predicate, printing diagnostics on failure. `None` means the
/// caller should exit nonzero.
pub(crate) fn load_predicate(source: &str, colored: bool) -> Option<Predicate> {
    let pred = Predicate::new(source);
    if pred.is_valid() {
        return Some(pred);
    }
    eprintln!("{}", pred.diagnostics_printer().colored(colored).render());
    None
}

pub(crate) fn load_document(json: &str) -> Option<Document> {
    match Document::from_json_str(json) {
        Ok(doc) => Some(doc),
        Err(err) => {
            eprintln!("error: invalid document: {err}");
            None
        }
    }
}
