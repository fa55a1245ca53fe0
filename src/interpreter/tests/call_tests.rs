//! Tests for calls: user functions, recursion, arity, overflow, host functions

use super::helpers::{execution, failed, finished_int, program, run_through_saves, run_until_done};
use crate::config::EngineConfig;
use crate::interpreter::{CallState, ErrorKind, Execution, ExternalFunction, ExternalStep, RunState, Variable};
use std::rc::Rc;

/// int fib(int n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
/// int main() { return fib(10); }
const FIB: &str = r#"{
    "functions": [
        {
            "name": "fib",
            "params": [{"name": "n", "ty": "Int"}],
            "returns": "Int",
            "body": {"t": "Block", "body": [
                {"t": "If",
                    "test": {"t": "Binary", "op": "Lt", "lhs": {"t": "Var", "name": "n"}, "rhs": {"t": "Int", "v": 2}},
                    "then_s": {"t": "Return", "value": {"t": "Var", "name": "n"}}},
                {"t": "Return", "value": {"t": "Binary", "op": "Add",
                    "lhs": {"t": "Call", "name": "fib", "args": [
                        {"t": "Binary", "op": "Sub", "lhs": {"t": "Var", "name": "n"}, "rhs": {"t": "Int", "v": 1}}]},
                    "rhs": {"t": "Call", "name": "fib", "args": [
                        {"t": "Binary", "op": "Sub", "lhs": {"t": "Var", "name": "n"}, "rhs": {"t": "Int", "v": 2}}]}}}
            ]}
        },
        {
            "name": "main",
            "returns": "Int",
            "body": {"t": "Block", "body": [
                {"t": "Return", "value": {"t": "Call", "name": "fib", "args": [{"t": "Int", "v": 10}]}}
            ]}
        }
    ]
}"#;

#[test]
fn test_recursion() {
    for budget in [1, 7, 100_000] {
        let mut exec = execution(FIB, budget);
        let (state, _) = run_until_done(&mut exec, "main");
        assert_eq!(finished_int(&state), 55, "budget {}", budget);
    }
}

#[test]
fn test_recursion_through_saves() {
    let (state, _, _) = run_through_saves(FIB, "main", 25);
    assert_eq!(finished_int(&state), 55);
}

#[test]
fn test_entry_with_arguments() {
    let mut exec = execution(FIB, 1000);
    exec.start("fib", vec![Variable::int(12)]).unwrap();
    let (state, _) = run_until_done(&mut exec, "fib");
    assert_eq!(finished_int(&state), 144);
}

#[test]
fn test_unknown_entry() {
    let mut exec = execution(FIB, 1000);
    assert!(exec.resume_or_start("nope").is_err());
    assert!(!exec.is_running());
}

#[test]
fn test_parameters_are_converted() {
    // float half(float x) { return x / 2; }
    // float main() { return half(3); }
    let source = r#"{
        "functions": [
            {
                "name": "half",
                "params": [{"name": "x", "ty": "Float"}],
                "returns": "Float",
                "body": {"t": "Return", "value": {"t": "Binary", "op": "Div",
                    "lhs": {"t": "Var", "name": "x"}, "rhs": {"t": "Int", "v": 2}}}
            },
            {
                "name": "main",
                "returns": "Float",
                "body": {"t": "Return", "value": {"t": "Call", "name": "half", "args": [{"t": "Int", "v": 3}]}}
            }
        ]
    }"#;

    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    let RunState::Finished(Some(value)) = &state else {
        unreachable!("Expected a float result, got {:?}", state);
    };
    assert_eq!(value.as_float(), Some(1.5));
}

#[test]
fn test_callee_cannot_see_caller_locals() {
    // int peek() { return secret; }
    // int main() { int secret = 1; return peek(); }
    let source = r#"{
        "functions": [
            {
                "name": "peek",
                "returns": "Int",
                "body": {"t": "Return", "value": {"t": "Var", "name": "secret", "span": {"start": 20, "end": 26}}}
            },
            {
                "name": "main",
                "returns": "Int",
                "body": {"t": "Block", "body": [
                    {"t": "Let", "name": "secret", "ty": "Int", "init": {"t": "Int", "v": 1}},
                    {"t": "Return", "value": {"t": "Call", "name": "peek"}}
                ]}
            }
        ]
    }"#;

    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    let err = failed(&state);
    assert_eq!(err.kind, ErrorKind::UndefinedVariable("secret".to_string()));
    assert_eq!((err.span.start, err.span.end), (20, 26));
}

#[test]
fn test_globals_visible_from_functions() {
    // int read() { return limit; }
    // int main() { limit = limit + 1; return read(); }
    let source = r#"{
        "functions": [
            {
                "name": "read",
                "returns": "Int",
                "body": {"t": "Return", "value": {"t": "Var", "name": "limit"}}
            },
            {
                "name": "main",
                "returns": "Int",
                "body": {"t": "Block", "body": [
                    {"t": "Expr", "expr": {"t": "Assign", "name": "limit", "op": "Add", "value": {"t": "Int", "v": 1}}},
                    {"t": "Return", "value": {"t": "Call", "name": "read"}}
                ]}
            }
        ]
    }"#;

    let mut exec = execution(source, 100);
    exec.bind_global(Variable::int(41).named("limit"));
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(finished_int(&state), 42);
    assert_eq!(exec.global("limit").and_then(Variable::as_int), Some(42));
}

#[test]
fn test_bad_argument_count() {
    // int one(int a) { return a; }
    // int main() { return one(1, 2); }
    let source = r#"{
        "functions": [
            {
                "name": "one",
                "params": [{"name": "a", "ty": "Int"}],
                "returns": "Int",
                "body": {"t": "Return", "value": {"t": "Var", "name": "a"}}
            },
            {
                "name": "main",
                "returns": "Int",
                "body": {"t": "Return", "value": {"t": "Call", "name": "one", "span": {"start": 7, "end": 16},
                    "args": [{"t": "Int", "v": 1}, {"t": "Int", "v": 2}]}}
            }
        ]
    }"#;

    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    let err = failed(&state);
    assert_eq!(err.code(), 6023);
    assert_eq!((err.span.start, err.span.end), (7, 16));
}

#[test]
fn test_undefined_function() {
    // void main() { nothing(); }
    let source = r#"{
        "functions": [{
            "name": "main",
            "body": {"t": "Expr", "expr": {"t": "Call", "name": "nothing", "span": {"start": 1, "end": 8}}}
        }]
    }"#;

    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    let err = failed(&state);
    assert_eq!(err.kind, ErrorKind::UndefinedFunction("nothing".to_string()));
    assert_eq!(err.span.start, 1);
}

/// int down(int n) { return down(n + 1); }
/// int main() { try { down(0); } catch (e) { return e; } return 0; }
const RUNAWAY: &str = r#"{
    "functions": [
        {
            "name": "down",
            "params": [{"name": "n", "ty": "Int"}],
            "returns": "Int",
            "body": {"t": "Return", "value": {"t": "Call", "name": "down", "args": [
                {"t": "Binary", "op": "Add", "lhs": {"t": "Var", "name": "n"}, "rhs": {"t": "Int", "v": 1}}]}}
        },
        {
            "name": "main",
            "returns": "Int",
            "body": {"t": "Block", "body": [
                {"t": "Try",
                    "body": {"t": "Expr", "expr": {"t": "Call", "name": "down", "args": [{"t": "Int", "v": 0}]}},
                    "catch_var": "e",
                    "handler": {"t": "Return", "value": {"t": "Var", "name": "e"}}},
                {"t": "Return", "value": {"t": "Int", "v": 0}}
            ]}
        }
    ]
}"#;

#[test]
fn test_stack_overflow_is_not_catchable() {
    let config = EngineConfig {
        step_budget: 1000,
        max_depth: 60,
        ..EngineConfig::default()
    };
    let mut exec = Execution::new(program(RUNAWAY), &config);
    let (state, _) = run_until_done(&mut exec, "main");
    let err = failed(&state);
    assert_eq!(err.kind, ErrorKind::StackOverflow);
    assert_eq!(exec.current_error().map(|e| e.code()), Some(6010));

    // the execution is usable again afterwards
    assert!(!exec.is_running());
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(failed(&state).kind, ErrorKind::StackOverflow);
}

/// int main() { return -(-(...(1))); } with `depth` negations
fn negations(depth: usize) -> String {
    let mut expr = r#"{"t": "Int", "v": 1}"#.to_string();
    for _ in 0..depth {
        expr = format!(r#"{{"t": "Unary", "op": "Neg", "operand": {}}}"#, expr);
    }
    format!(
        r#"{{"functions": [{{"name": "main", "returns": "Int", "body": {{"t": "Return", "value": {}}}}}]}}"#,
        expr
    )
}

#[test]
fn test_deep_expression_cannot_outgrow_guard_region() {
    let config = EngineConfig {
        step_budget: 1000,
        max_depth: 10,
        guard_slots: 2,
        ..EngineConfig::default()
    };

    let mut exec = Execution::new(program(&negations(3)), &config);
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(finished_int(&state), -1);

    let mut exec = Execution::new(program(&negations(30)), &config);
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(failed(&state).kind, ErrorKind::StackOverflow);
}

/// Host function that doubles its argument after one pending round
struct SlowDouble;

impl ExternalFunction for SlowDouble {
    fn arity(&self) -> Option<usize> {
        Some(1)
    }

    fn call(&self, call: &mut CallState<'_>) -> Result<ExternalStep, ErrorKind> {
        if *call.state == 0 {
            *call.state = 1;
            return Ok(ExternalStep::Pending);
        }
        let v = call.args[0].as_int().ok_or(ErrorKind::TypeMismatch {
            expected: "int".to_string(),
            found: call.args[0].ty.to_string(),
        })?;
        Ok(ExternalStep::Done(Some(Variable::int(v * 2))))
    }
}

#[test]
fn test_custom_external() {
    // int main() { return double(21); }
    let source = r#"{
        "functions": [{
            "name": "main",
            "returns": "Int",
            "body": {"t": "Return", "value": {"t": "Call", "name": "double", "args": [{"t": "Int", "v": 21}]}}
        }]
    }"#;

    let mut exec = execution(source, 100);
    exec.register_external("double", Rc::new(SlowDouble));
    let (state, ticks) = run_until_done(&mut exec, "main");
    assert_eq!(finished_int(&state), 42);
    assert_eq!(ticks, 2);
}

#[test]
fn test_external_arity_checked() {
    // void main() { wait(); }
    let source = r#"{
        "functions": [{
            "name": "main",
            "body": {"t": "Expr", "expr": {"t": "Call", "name": "wait"}}
        }]
    }"#;

    let mut exec = execution(source, 100);
    let (state, _) = run_until_done(&mut exec, "main");
    assert_eq!(failed(&state).code(), 6023);
}
