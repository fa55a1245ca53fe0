//! Tests for plain evaluation: literals, locals, operators, branches, loops

use super::helpers::{execution, finished_bool, finished_int, run_collect, run_until_done};
use crate::interpreter::RunState;

#[test]
fn test_return_arithmetic() {
    // int main() { return 2 + 3 * 4; }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Int",
            "body": {"t": "Block", "body": [
                {"t": "Return", "value": {"t": "Binary", "op": "Add",
                    "lhs": {"t": "Int", "v": 2},
                    "rhs": {"t": "Binary", "op": "Mul",
                        "lhs": {"t": "Int", "v": 3},
                        "rhs": {"t": "Int", "v": 4}}}}
            ]}
        }]
    }"#;

    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(finished_int(&state), 14);
    assert!(!exec.is_running());
}

#[test]
fn test_void_function_finishes_without_value() {
    // void main() { int x = 1; }
    let source = r#"{
        "functions": [{
            "name": "main",
            "body": {"t": "Block", "body": [
                {"t": "Let", "name": "x", "ty": "Int", "init": {"t": "Int", "v": 1}}
            ]}
        }]
    }"#;

    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    assert!(matches!(state, RunState::Finished(None)), "got {:?}", state);
}

#[test]
fn test_locals_and_compound_assign() {
    // int main() { int a = 5; int b; b = a * 2; b += a; b -= 1; return b; }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Int",
            "body": {"t": "Block", "body": [
                {"t": "Let", "name": "a", "ty": "Int", "init": {"t": "Int", "v": 5}},
                {"t": "Let", "name": "b", "ty": "Int"},
                {"t": "Expr", "expr": {"t": "Assign", "name": "b", "value":
                    {"t": "Binary", "op": "Mul", "lhs": {"t": "Var", "name": "a"}, "rhs": {"t": "Int", "v": 2}}}},
                {"t": "Expr", "expr": {"t": "Assign", "name": "b", "op": "Add", "value": {"t": "Var", "name": "a"}}},
                {"t": "Expr", "expr": {"t": "Assign", "name": "b", "op": "Sub", "value": {"t": "Int", "v": 1}}},
                {"t": "Return", "value": {"t": "Var", "name": "b"}}
            ]}
        }]
    }"#;

    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(finished_int(&state), 14);
}

#[test]
fn test_self_assignment_updates_variable() {
    // int main() { int x = 3; x = x; x = x + x; return x; }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Int",
            "body": {"t": "Block", "body": [
                {"t": "Let", "name": "x", "ty": "Int", "init": {"t": "Int", "v": 3}},
                {"t": "Expr", "expr": {"t": "Assign", "name": "x", "value": {"t": "Var", "name": "x"}}},
                {"t": "Expr", "expr": {"t": "Assign", "name": "x", "value":
                    {"t": "Binary", "op": "Add", "lhs": {"t": "Var", "name": "x"}, "rhs": {"t": "Var", "name": "x"}}}},
                {"t": "Return", "value": {"t": "Var", "name": "x"}}
            ]}
        }]
    }"#;

    let mut exec = execution(source, 1);
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(finished_int(&state), 6);
}

#[test]
fn test_if_else_and_conditional() {
    // int main() {
    //   int x = 7;
    //   if (x > 5) { x = x - 5; } else { x = 100; }
    //   return x == 2 ? 10 : 20;
    // }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Int",
            "body": {"t": "Block", "body": [
                {"t": "Let", "name": "x", "ty": "Int", "init": {"t": "Int", "v": 7}},
                {"t": "If",
                    "test": {"t": "Binary", "op": "Gt", "lhs": {"t": "Var", "name": "x"}, "rhs": {"t": "Int", "v": 5}},
                    "then_s": {"t": "Block", "body": [
                        {"t": "Expr", "expr": {"t": "Assign", "name": "x", "value":
                            {"t": "Binary", "op": "Sub", "lhs": {"t": "Var", "name": "x"}, "rhs": {"t": "Int", "v": 5}}}}
                    ]},
                    "else_s": {"t": "Block", "body": [
                        {"t": "Expr", "expr": {"t": "Assign", "name": "x", "value": {"t": "Int", "v": 100}}}
                    ]}},
                {"t": "Return", "value": {"t": "Cond",
                    "test": {"t": "Binary", "op": "Eq", "lhs": {"t": "Var", "name": "x"}, "rhs": {"t": "Int", "v": 2}},
                    "then_e": {"t": "Int", "v": 10},
                    "else_e": {"t": "Int", "v": 20}}}
            ]}
        }]
    }"#;

    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(finished_int(&state), 10);
}

#[test]
fn test_while_loop() {
    // int main() { int i = 0; int sum = 0; while (i < 5) { sum += i; i += 1; } return sum; }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Int",
            "body": {"t": "Block", "body": [
                {"t": "Let", "name": "i", "ty": "Int", "init": {"t": "Int", "v": 0}},
                {"t": "Let", "name": "sum", "ty": "Int", "init": {"t": "Int", "v": 0}},
                {"t": "While",
                    "test": {"t": "Binary", "op": "Lt", "lhs": {"t": "Var", "name": "i"}, "rhs": {"t": "Int", "v": 5}},
                    "body": {"t": "Block", "body": [
                        {"t": "Expr", "expr": {"t": "Assign", "name": "sum", "op": "Add", "value": {"t": "Var", "name": "i"}}},
                        {"t": "Expr", "expr": {"t": "Assign", "name": "i", "op": "Add", "value": {"t": "Int", "v": 1}}}
                    ]}},
                {"t": "Return", "value": {"t": "Var", "name": "sum"}}
            ]}
        }]
    }"#;

    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(finished_int(&state), 10);
}

#[test]
fn test_for_loop_with_continue() {
    // int main() {
    //   int total = 0;
    //   for (int i = 0; i < 10; i = i + 1) { if (i % 3 == 0) continue; total += i; }
    //   return total;
    // }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Int",
            "body": {"t": "Block", "body": [
                {"t": "Let", "name": "total", "ty": "Int", "init": {"t": "Int", "v": 0}},
                {"t": "For",
                    "init": {"t": "Let", "name": "i", "ty": "Int", "init": {"t": "Int", "v": 0}},
                    "test": {"t": "Binary", "op": "Lt", "lhs": {"t": "Var", "name": "i"}, "rhs": {"t": "Int", "v": 10}},
                    "update": {"t": "Assign", "name": "i", "value":
                        {"t": "Binary", "op": "Add", "lhs": {"t": "Var", "name": "i"}, "rhs": {"t": "Int", "v": 1}}},
                    "body": {"t": "Block", "body": [
                        {"t": "If",
                            "test": {"t": "Binary", "op": "Eq",
                                "lhs": {"t": "Binary", "op": "Rem", "lhs": {"t": "Var", "name": "i"}, "rhs": {"t": "Int", "v": 3}},
                                "rhs": {"t": "Int", "v": 0}},
                            "then_s": {"t": "Continue"}},
                        {"t": "Expr", "expr": {"t": "Assign", "name": "total", "op": "Add", "value": {"t": "Var", "name": "i"}}}
                    ]}},
                {"t": "Return", "value": {"t": "Var", "name": "total"}}
            ]}
        }]
    }"#;

    let mut exec = execution(source, 1000);
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(finished_int(&state), 27);
}

#[test]
fn test_short_circuit_skips_rhs() {
    // bool main() { bool a = false && (1 / 0 == 0); bool b = true || (1 / 0 == 0); return !a && b; }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Bool",
            "body": {"t": "Block", "body": [
                {"t": "Let", "name": "a", "ty": "Bool", "init": {"t": "Binary", "op": "And",
                    "lhs": {"t": "Bool", "v": false},
                    "rhs": {"t": "Binary", "op": "Eq",
                        "lhs": {"t": "Binary", "op": "Div", "lhs": {"t": "Int", "v": 1}, "rhs": {"t": "Int", "v": 0}},
                        "rhs": {"t": "Int", "v": 0}}}},
                {"t": "Let", "name": "b", "ty": "Bool", "init": {"t": "Binary", "op": "Or",
                    "lhs": {"t": "Bool", "v": true},
                    "rhs": {"t": "Binary", "op": "Eq",
                        "lhs": {"t": "Binary", "op": "Div", "lhs": {"t": "Int", "v": 1}, "rhs": {"t": "Int", "v": 0}},
                        "rhs": {"t": "Int", "v": 0}}}},
                {"t": "Return", "value": {"t": "Binary", "op": "And",
                    "lhs": {"t": "Unary", "op": "Not", "operand": {"t": "Var", "name": "a"}},
                    "rhs": {"t": "Var", "name": "b"}}}
            ]}
        }]
    }"#;

    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    assert!(finished_bool(&state));
}

#[test]
fn test_float_promotion_and_conversion() {
    // float main() { float f = 3; f = f / 2; int i = f * 3; return f + i; }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Float",
            "body": {"t": "Block", "body": [
                {"t": "Let", "name": "f", "ty": "Float", "init": {"t": "Int", "v": 3}},
                {"t": "Expr", "expr": {"t": "Assign", "name": "f", "value":
                    {"t": "Binary", "op": "Div", "lhs": {"t": "Var", "name": "f"}, "rhs": {"t": "Int", "v": 2}}}},
                {"t": "Let", "name": "i", "ty": "Int", "init":
                    {"t": "Binary", "op": "Mul", "lhs": {"t": "Var", "name": "f"}, "rhs": {"t": "Int", "v": 3}}},
                {"t": "Return", "value": {"t": "Binary", "op": "Add", "lhs": {"t": "Var", "name": "f"}, "rhs": {"t": "Var", "name": "i"}}}
            ]}
        }]
    }"#;

    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    let RunState::Finished(Some(value)) = &state else {
        unreachable!("Expected a float result, got {:?}", state);
    };
    // 1.5 + int(4.5)
    assert_eq!(value.as_float(), Some(5.5));
}

#[test]
fn test_arrays() {
    // int main() { int[] xs = [1, 2, 3]; xs[1] = 10; xs[2] += xs[0]; return xs[0] + xs[1] + xs[2]; }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Int",
            "body": {"t": "Block", "body": [
                {"t": "Let", "name": "xs", "ty": {"Array": "Int"}, "init": {"t": "Array", "items": [
                    {"t": "Int", "v": 1}, {"t": "Int", "v": 2}, {"t": "Int", "v": 3}]}},
                {"t": "Expr", "expr": {"t": "Assign", "name": "xs",
                    "path": [{"t": "Index", "index": {"t": "Int", "v": 1}}],
                    "value": {"t": "Int", "v": 10}}},
                {"t": "Expr", "expr": {"t": "Assign", "name": "xs", "op": "Add",
                    "path": [{"t": "Index", "index": {"t": "Int", "v": 2}}],
                    "value": {"t": "Var", "name": "xs", "path": [{"t": "Index", "index": {"t": "Int", "v": 0}}]}}},
                {"t": "Return", "value": {"t": "Binary", "op": "Add",
                    "lhs": {"t": "Binary", "op": "Add",
                        "lhs": {"t": "Var", "name": "xs", "path": [{"t": "Index", "index": {"t": "Int", "v": 0}}]},
                        "rhs": {"t": "Var", "name": "xs", "path": [{"t": "Index", "index": {"t": "Int", "v": 1}}]}},
                    "rhs": {"t": "Var", "name": "xs", "path": [{"t": "Index", "index": {"t": "Int", "v": 2}}]}}}
            ]}
        }]
    }"#;

    for budget in [1, 2, 100] {
        let mut exec = execution(source, budget);
        let (state, _) = run_until_done(&mut exec, "main");
        assert_eq!(finished_int(&state), 15, "budget {}", budget);
    }
}

#[test]
fn test_string_concat_and_print() {
    // void main() { string s = "n=" + 4; print(s, true); print(); }
    let source = r#"{
        "functions": [{
            "name": "main",
            "body": {"t": "Block", "body": [
                {"t": "Let", "name": "s", "ty": "String", "init": {"t": "Binary", "op": "Add",
                    "lhs": {"t": "Str", "v": "n="}, "rhs": {"t": "Int", "v": 4}}},
                {"t": "Expr", "expr": {"t": "Call", "name": "print", "args": [
                    {"t": "Var", "name": "s"}, {"t": "Bool", "v": true}]}},
                {"t": "Expr", "expr": {"t": "Call", "name": "print"}}
            ]}
        }]
    }"#;

    let (state, output, _) = run_collect(source, "main", 100);
    assert!(matches!(state, RunState::Finished(None)), "got {:?}", state);
    assert_eq!(output, vec!["n=4 true".to_string(), String::new()]);
}

#[test]
fn test_rerun_after_finish() {
    // int main() { return 1; }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Int",
            "body": {"t": "Return", "value": {"t": "Int", "v": 1}}
        }]
    }"#;

    let mut exec = execution(source, 100);
    let (first, _) = run_until_done(&mut exec, "main");
    let (second, _) = run_until_done(&mut exec, "main");
    assert_eq!(finished_int(&first), 1);
    assert_eq!(finished_int(&second), 1);
}
