//! Tests for loop control: labels, break/continue/return through nested loops

use super::helpers::{execution, failed, finished_int, run_through_saves, run_until_done};
use crate::interpreter::{ErrorKind, RunState};

/// int main() {
///   int count = 0;
///   outer: for (int i = 0; i < 5; i = i + 1) {
///     inner: for (int j = 0; j < 5; j = j + 1) {
///       if (j == 3) continue outer;
///       if (i == 3) break outer;
///       count += 1;
///     }
///   }
///   return count;
/// }
const LABELED: &str = r#"{
    "functions": [{
        "name": "main",
        "returns": "Int",
        "body": {"t": "Block", "body": [
            {"t": "Let", "name": "count", "ty": "Int", "init": {"t": "Int", "v": 0}},
            {"t": "For", "label": "outer",
                "init": {"t": "Let", "name": "i", "ty": "Int", "init": {"t": "Int", "v": 0}},
                "test": {"t": "Binary", "op": "Lt", "lhs": {"t": "Var", "name": "i"}, "rhs": {"t": "Int", "v": 5}},
                "update": {"t": "Assign", "name": "i", "op": "Add", "value": {"t": "Int", "v": 1}},
                "body": {"t": "Block", "body": [
                    {"t": "For", "label": "inner",
                        "init": {"t": "Let", "name": "j", "ty": "Int", "init": {"t": "Int", "v": 0}},
                        "test": {"t": "Binary", "op": "Lt", "lhs": {"t": "Var", "name": "j"}, "rhs": {"t": "Int", "v": 5}},
                        "update": {"t": "Assign", "name": "j", "op": "Add", "value": {"t": "Int", "v": 1}},
                        "body": {"t": "Block", "body": [
                            {"t": "If",
                                "test": {"t": "Binary", "op": "Eq", "lhs": {"t": "Var", "name": "j"}, "rhs": {"t": "Int", "v": 3}},
                                "then_s": {"t": "Continue", "label": "outer"}},
                            {"t": "If",
                                "test": {"t": "Binary", "op": "Eq", "lhs": {"t": "Var", "name": "i"}, "rhs": {"t": "Int", "v": 3}},
                                "then_s": {"t": "Break", "label": "outer"}},
                            {"t": "Expr", "expr": {"t": "Assign", "name": "count", "op": "Add", "value": {"t": "Int", "v": 1}}}
                        ]}}
                ]}},
            {"t": "Return", "value": {"t": "Var", "name": "count"}}
        ]}
    }]
}"#;

#[test]
fn test_labeled_break_and_continue() {
    for budget in [1, 3, 1000] {
        let mut exec = execution(LABELED, budget);
        let (state, _) = run_until_done(&mut exec, "main");
        assert_eq!(finished_int(&state), 9, "budget {}", budget);
    }
}

#[test]
fn test_labeled_loops_survive_reload() {
    let (state, _, saves) = run_through_saves(LABELED, "main", 4);
    assert_eq!(finished_int(&state), 9);
    assert!(saves > 10);
}

#[test]
fn test_unlabeled_break_leaves_innermost_loop() {
    // int main() {
    //   int count = 0;
    //   for (int i = 0; i < 3; i += 1) {
    //     int j = 0;
    //     while (true) { if (j == 2) break; count += 1; j += 1; }
    //   }
    //   return count;
    // }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Int",
            "body": {"t": "Block", "body": [
                {"t": "Let", "name": "count", "ty": "Int", "init": {"t": "Int", "v": 0}},
                {"t": "For",
                    "init": {"t": "Let", "name": "i", "ty": "Int", "init": {"t": "Int", "v": 0}},
                    "test": {"t": "Binary", "op": "Lt", "lhs": {"t": "Var", "name": "i"}, "rhs": {"t": "Int", "v": 3}},
                    "update": {"t": "Assign", "name": "i", "op": "Add", "value": {"t": "Int", "v": 1}},
                    "body": {"t": "Block", "body": [
                        {"t": "Let", "name": "j", "ty": "Int", "init": {"t": "Int", "v": 0}},
                        {"t": "While", "test": {"t": "Bool", "v": true}, "body": {"t": "Block", "body": [
                            {"t": "If",
                                "test": {"t": "Binary", "op": "Eq", "lhs": {"t": "Var", "name": "j"}, "rhs": {"t": "Int", "v": 2}},
                                "then_s": {"t": "Break"}},
                            {"t": "Expr", "expr": {"t": "Assign", "name": "count", "op": "Add", "value": {"t": "Int", "v": 1}}},
                            {"t": "Expr", "expr": {"t": "Assign", "name": "j", "op": "Add", "value": {"t": "Int", "v": 1}}}
                        ]}}
                    ]}},
                {"t": "Return", "value": {"t": "Var", "name": "count"}}
            ]}
        }]
    }"#;

    let mut exec = execution(source, 2);
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(finished_int(&state), 6);
}

#[test]
fn test_return_from_nested_loops() {
    // int main() {
    //   int i = 0;
    //   while (true) { for (;;) { i += 1; if (i == 4) return i * 10; } }
    // }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Int",
            "body": {"t": "Block", "body": [
                {"t": "Let", "name": "i", "ty": "Int", "init": {"t": "Int", "v": 0}},
                {"t": "While", "test": {"t": "Bool", "v": true}, "body": {"t": "Block", "body": [
                    {"t": "For", "body": {"t": "Block", "body": [
                        {"t": "Expr", "expr": {"t": "Assign", "name": "i", "op": "Add", "value": {"t": "Int", "v": 1}}},
                        {"t": "If",
                            "test": {"t": "Binary", "op": "Eq", "lhs": {"t": "Var", "name": "i"}, "rhs": {"t": "Int", "v": 4}},
                            "then_s": {"t": "Return", "value": {"t": "Binary", "op": "Mul",
                                "lhs": {"t": "Var", "name": "i"}, "rhs": {"t": "Int", "v": 10}}}}
                    ]}}
                ]}}
            ]}
        }]
    }"#;

    let mut exec = execution(source, 3);
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(finished_int(&state), 40);
}

#[test]
fn test_break_outside_loop_is_error() {
    // void helper() { break; }
    // void main() { while (true) { helper(); } }
    let source = r#"{
        "functions": [
            {
                "name": "helper",
                "body": {"t": "Block", "body": [{"t": "Break"}]}
            },
            {
                "name": "main",
                "body": {"t": "Block", "body": [
                    {"t": "While", "test": {"t": "Bool", "v": true}, "body": {"t": "Block", "body": [
                        {"t": "Expr", "expr": {"t": "Call", "name": "helper", "span": {"start": 40, "end": 48}}}
                    ]}}
                ]}
            }
        ]
    }"#;

    // the loop in main must not see the break raised inside helper
    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    let err = failed(&state);
    assert_eq!(err.kind, ErrorKind::NoLoop);
    assert_eq!(err.code(), 6024);
    assert_eq!((err.span.start, err.span.end), (40, 48));
}

#[test]
fn test_unmatched_label_is_error() {
    // void main() { a: while (true) { continue b; } }
    let source = r#"{
        "functions": [{
            "name": "main",
            "body": {"t": "Block", "body": [
                {"t": "While", "label": "a", "test": {"t": "Bool", "v": true},
                    "body": {"t": "Continue", "label": "b"}}
            ]}
        }]
    }"#;

    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(failed(&state).kind, ErrorKind::NoLoop);
}

#[test]
fn test_declaration_as_loop_body_does_not_pile_up() {
    // int main() { int i = 0; while (i < 50) int x = (i = i + 1); wait(1); return x; }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Int",
            "body": {"t": "Block", "body": [
                {"t": "Let", "name": "i", "ty": "Int", "init": {"t": "Int", "v": 0}},
                {"t": "While",
                    "test": {"t": "Binary", "op": "Lt", "lhs": {"t": "Var", "name": "i"}, "rhs": {"t": "Int", "v": 50}},
                    "body": {"t": "Let", "name": "x", "ty": "Int", "init": {"t": "Assign", "name": "i",
                        "value": {"t": "Binary", "op": "Add", "lhs": {"t": "Var", "name": "i"}, "rhs": {"t": "Int", "v": 1}}}}},
                {"t": "Expr", "expr": {"t": "Call", "name": "wait", "args": [{"t": "Int", "v": 1}]}},
                {"t": "Return", "value": {"t": "Var", "name": "x"}}
            ]}
        }]
    }"#;

    let mut exec = execution(source, 100_000);
    assert!(matches!(exec.resume_or_start("main").unwrap(), RunState::Suspended));
    let block = exec.stack_vars(0).expect("main block");
    assert_eq!(block.vars.iter().filter(|v| v.name == "x").count(), 1);

    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(finished_int(&state), 50);
}
