use crate::ast::{Constant, ExprKind};
use crate::parser::parse;

fn ast(source: &str) -> crate::ast::Expr {
    parse(source).ast.expect("test sources parse")
}

#[test]
fn fingerprints_ignore_positions_and_whitespace() {
    assert_eq!(ast("a and b").fingerprint(), ast("a  and\n  b").fingerprint());
    assert_eq!(ast("x = 3").fingerprint(), ast("x =\t3.0").fingerprint());
}

#[test]
fn fingerprints_distinguish_structure() {
    assert_ne!(ast("a and b").fingerprint(), ast("b and a").fingerprint());
    assert_ne!(ast("a or b").fingerprint(), ast("a and b").fingerprint());
    assert_ne!(ast("not a").fingerprint(), ast("a").fingerprint());
}

#[test]
fn ground_detection() {
    assert!(ast("3 = 3").is_ground());
    assert!(ast("'a' contains 'b'").is_ground());
    assert!(ast("true and false").is_ground());
    assert!(!ast("x = 3").is_ground());
    assert!(!ast("{1 2} contains x").is_ground());
}

#[test]
fn boolean_position_visitor_skips_comparison_operands() {
    let expr = ast("x = 3 and not (y or z)");
    let mut seen = Vec::new();
    expr.for_each_boolean(&mut |e| seen.push(e.fingerprint()));
    assert_eq!(
        seen,
        vec![
            "((x = 3) and not (y or z))",
            "(x = 3)",
            "not (y or z)",
            "(y or z)",
            "y",
            "z",
        ]
    );
}

#[test]
fn substitution_replaces_matching_boolean_subtrees() {
    let expr = ast("a and b");
    let replaced = expr.substitute_boolean("a", Constant::True);
    assert_eq!(replaced.fingerprint(), "(true and b)");

    // Value-position occurrences are left alone.
    let expr = ast("a = 3 and a");
    let replaced = expr.substitute_boolean("a", Constant::False);
    assert_eq!(replaced.fingerprint(), "((a = 3) and false)");
}

#[test]
fn kind_names_match_descriptions() {
    assert_eq!(ast("a contains b").kind_name(), "ContainsOperator");
    assert_eq!(ast("x matches /a/").kind_name(), "MatchOperator");
    assert_eq!(ast("not a").kind_name(), "NegateOperator");
    assert_eq!(ast("a and b").kind_name(), "LogicalOperator");
    assert_eq!(ast("a = b").kind_name(), "CompareOperator");
    assert_eq!(ast("a").kind_name(), "Literal");
}

#[test]
fn describe_indents_children_four_spaces() {
    let expr = ast("not (x < 3)");
    insta::assert_snapshot!(expr.describe(), @r"
    NegateOperator at line: 1, col 0
        CompareOperator at line: 1, col 7
            Literal at line: 1, col 5
            NumberLiteral at line: 1, col 9
    ");
}

#[test]
fn constant_values() {
    let expr = ast("empty");
    assert_eq!(expr.kind, ExprKind::Constant(Constant::Empty));
    assert_eq!(expr.fingerprint(), "empty");
}
