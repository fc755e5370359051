use super::*;
use crate::span::{Position, Span};

fn diag(kind: DiagnosticKind, start: usize, end: usize, col: u32, msg: &str) -> Diagnostic {
    Diagnostic::new(kind, Span::new(start, end), Position::new(1, col), msg)
}

#[test]
fn display_names_kind_and_position() {
    let d = diag(DiagnosticKind::Syntax, 4, 5, 4, "expected expression");
    assert_eq!(
        d.to_string(),
        "syntax error at line: 1, col 4: expected expression"
    );
}

#[test]
fn collection_counts_by_kind() {
    let mut diags = Diagnostics::new();
    diags.push(diag(DiagnosticKind::Lex, 0, 1, 0, "unrecognized input"));
    diags.push(diag(DiagnosticKind::Semantic, 2, 3, 2, "unknown regex flag"));
    diags.push(diag(DiagnosticKind::Semantic, 4, 5, 4, "identifier in set"));

    assert_eq!(diags.len(), 3);
    assert_eq!(diags.count_of(DiagnosticKind::Lex), 1);
    assert_eq!(diags.count_of(DiagnosticKind::Syntax), 0);
    assert_eq!(diags.count_of(DiagnosticKind::Semantic), 2);
}

#[test]
fn printer_without_source_is_plain() {
    let mut diags = Diagnostics::new();
    diags.push(diag(DiagnosticKind::Lex, 0, 1, 0, "unrecognized input"));
    diags.push(diag(DiagnosticKind::Syntax, 2, 3, 2, "expected expression"));

    insta::assert_snapshot!(diags.printer().render(), @r"
    lex error at line: 1, col 0: unrecognized input
    syntax error at line: 1, col 2: expected expression
    ");
}

#[test]
fn printer_with_source_renders_snippet() {
    let source = "a @@ b";
    let mut diags = Diagnostics::new();
    diags.push(diag(DiagnosticKind::Lex, 2, 4, 2, "unrecognized input `@@`"));

    let out = diags.printer().source(source).render();
    assert!(out.contains("unrecognized input"));
    assert!(out.contains("a @@ b"));
}

#[test]
fn printer_clamps_eof_span() {
    let source = "a and";
    let mut diags = Diagnostics::new();
    diags.push(diag(DiagnosticKind::Syntax, 5, 5, 5, "expected expression"));

    // Must not panic on the zero-width end-of-input span.
    let out = diags.printer().source(source).render();
    assert!(out.contains("expected expression"));
}
