use cinder::parse::{ConnectorKind, RedirectOp};
use cinder::{ErrorKind, Node, parse};
use proptest::prelude::*;

fn parse_one(input: &str) -> Node {
    parse(input)
        .unwrap_or_else(|err| panic!("{input}: {err}"))
        .unwrap_or_else(|| panic!("{input}: empty program"))
}

#[test]
fn pipeline_black_box() {
    let Node::Connector(conn) = parse_one("echo hi | cat") else {
        panic!("expected pipeline")
    };
    assert_eq!(conn.kind, ConnectorKind::Pipeline);
    assert_eq!(conn.left.to_string(), "echo hi");
    assert_eq!(conn.right.to_string(), "cat");
}

#[test]
fn sequence_black_box() {
    let node = parse_one("a && b || c ; d");
    let Node::Connector(last) = node else {
        panic!("expected connector")
    };
    assert_eq!(last.kind, ConnectorKind::Semicolon);
    assert_eq!(last.right.to_string(), "d");
    assert_eq!(last.left.to_string(), "a && b || c");
}

#[test]
fn redirect_chain_keeps_order() {
    let Node::Command(cmd) = parse_one("echo hi 3>f 4>&3 >&4") else {
        panic!("expected command")
    };
    let ops: Vec<(i32, RedirectOp)> = cmd.redirects.iter().map(|r| (r.dest, r.op)).collect();
    assert_eq!(
        ops,
        vec![
            (3, RedirectOp::Write),
            (4, RedirectOp::CopyWrite),
            (1, RedirectOp::CopyWrite),
        ]
    );
    assert_eq!(cmd.redirects[2].src, Some(4));
}

#[test]
fn compound_statement_inside_pipeline() {
    let node = parse_one("cat in | while read line; do echo $line; done > out");
    let Node::Connector(conn) = node else {
        panic!("expected pipeline")
    };
    let Node::While(stmt) = *conn.right else {
        panic!("expected while on the right")
    };
    assert_eq!(stmt.redirects.len(), 1);
    assert_eq!(stmt.body.to_string(), "echo $line");
}

#[test]
fn command_substitution_stays_one_word() {
    let Node::For(stmt) = parse_one("for x in $(echo a b); do echo $x; done") else {
        panic!("expected for")
    };
    assert_eq!(stmt.items.fields().len(), 1);
    assert_eq!(stmt.items.to_string(), "$(echo a b)");
}

#[test]
fn errors_carry_kind_and_continuation() {
    assert!(parse("while true; do").unwrap_err().is_incomplete());
    assert!(parse("echo 'open").unwrap_err().is_incomplete());
    let err = parse("if true; then echo x; done").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnexpectedKeyword);
    assert!(!err.is_incomplete());
}

proptest! {
    #[test]
    fn arbitrary_input_never_panics(input in "\\PC{0,64}") {
        let _ = parse(&input);
    }

    #[test]
    fn printed_form_is_stable(
        words in prop::collection::vec("[a-z]{1,5}x", 1..6),
        ops in prop::collection::vec(prop::sample::select(vec![";", "&&", "||", "|"]), 5),
    ) {
        let mut input = words[0].clone();
        for (word, op) in words.iter().skip(1).zip(ops.iter()) {
            input.push_str(&format!(" {op} {word}"));
        }
        let printed = parse_one(&input).to_string();
        prop_assert_eq!(parse_one(&printed).to_string(), printed);
    }
}
