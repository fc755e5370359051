use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::lexer::{TokenKind, lex, token_text};
use crate::span::LineIndex;

fn kinds(source: &str) -> (Vec<TokenKind>, Diagnostics) {
    let index = LineIndex::new(source);
    let mut diags = Diagnostics::new();
    let tokens = lex(source, &index, &mut diags);
    (tokens.into_iter().map(|t| t.kind).collect(), diags)
}

#[track_caller]
fn expect_kinds(source: &str, expected: &[TokenKind]) {
    let (actual, diags) = kinds(source);
    assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
    assert_eq!(actual, expected, "for {source:?}");
}

#[test]
fn keywords_win_over_identifiers() {
    expect_kinds(
        "and or not is contains matches true false undefined null empty",
        &[
            TokenKind::KwAnd,
            TokenKind::KwOr,
            TokenKind::KwNot,
            TokenKind::KwIs,
            TokenKind::KwContains,
            TokenKind::KwMatches,
            TokenKind::KwTrue,
            TokenKind::KwFalse,
            TokenKind::KwUndefined,
            TokenKind::KwNull,
            TokenKind::KwEmpty,
        ],
    );
}

#[test]
fn keyword_prefixed_identifiers_stay_identifiers() {
    expect_kinds(
        "android nothing istanbul trueish",
        &[
            TokenKind::Identifier,
            TokenKind::Identifier,
            TokenKind::Identifier,
            TokenKind::Identifier,
        ],
    );
}

#[test]
fn comparison_operators() {
    expect_kinds(
        "= != > >= < <=",
        &[
            TokenKind::Eq,
            TokenKind::NotEq,
            TokenKind::Greater,
            TokenKind::GreaterEq,
            TokenKind::Less,
            TokenKind::LessEq,
        ],
    );
}

#[test]
fn strings_both_quote_styles() {
    expect_kinds(
        r#""double" 'single' "with \"escape\"""#,
        &[TokenKind::String, TokenKind::String, TokenKind::String],
    );
}

#[test]
fn numbers_integer_decimal_negative() {
    expect_kinds(
        "42 3.25 -7 -0.5",
        &[
            TokenKind::Number,
            TokenKind::Number,
            TokenKind::Number,
            TokenKind::Number,
        ],
    );
}

#[test]
fn regex_literal_with_flags() {
    let source = r"/east-web-([0-9]+)/i";
    let index = LineIndex::new(source);
    let mut diags = Diagnostics::new();
    let tokens = lex(source, &index, &mut diags);

    assert!(diags.is_empty());
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::Regex);
    assert_eq!(token_text(source, &tokens[0]), source);
}

#[test]
fn regex_with_escaped_slash() {
    expect_kinds(r"/a\/b/", &[TokenKind::Regex]);
}

#[test]
fn dotted_identifier_is_one_token() {
    let source = "meta.region.zone";
    let index = LineIndex::new(source);
    let mut diags = Diagnostics::new();
    let tokens = lex(source, &index, &mut diags);

    assert_eq!(tokens.len(), 1);
    assert_eq!(token_text(source, &tokens[0]), "meta.region.zone");
}

#[test]
fn set_braces_and_parens() {
    expect_kinds(
        "{ } ( )",
        &[
            TokenKind::BraceOpen,
            TokenKind::BraceClose,
            TokenKind::ParenOpen,
            TokenKind::ParenClose,
        ],
    );
}

#[test]
fn garbage_coalesces_into_one_diagnostic() {
    let (tokens, diags) = kinds("a @@@ b");
    assert_eq!(tokens, vec![TokenKind::Identifier, TokenKind::Identifier]);
    assert_eq!(diags.len(), 1);
    let diag = &diags.as_slice()[0];
    assert_eq!(diag.kind, DiagnosticKind::Lex);
    assert!(diag.message.contains("@@@"), "got: {}", diag.message);
    assert_eq!((diag.line, diag.col), (1, 2));
}

#[test]
fn unterminated_string_is_a_lex_error() {
    let (tokens, diags) = kinds(r#"x = "oops"#);
    assert_eq!(tokens, vec![TokenKind::Identifier, TokenKind::Eq]);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags.as_slice()[0].kind, DiagnosticKind::Lex);
    assert!(diags.as_slice()[0].message.contains("unterminated string"));
}

#[test]
fn unterminated_regex_is_a_lex_error() {
    let (_, diags) = kinds("x matches /oops");
    assert_eq!(diags.len(), 1);
    assert!(diags.as_slice()[0].message.contains("unterminated regex"));
}

#[test]
fn positions_track_lines_and_columns() {
    let source = "a and\n  b";
    let index = LineIndex::new(source);
    let mut diags = Diagnostics::new();
    let tokens = lex(source, &index, &mut diags);

    let positions: Vec<(u32, u32)> = tokens
        .iter()
        .map(|t| {
            let p = index.position(t.span.start);
            (p.line, p.col)
        })
        .collect();
    assert_eq!(positions, vec![(1, 0), (1, 2), (2, 2)]);
}
