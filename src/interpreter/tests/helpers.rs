//! Test helpers for building programs and driving executions

use crate::config::EngineConfig;
use crate::interpreter::{Execution, Program, RunState, RuntimeError, Script};
use std::rc::Rc;

/// Upper bound on resumptions before a test gives up
pub const MAX_TICKS: usize = 100_000;

/// Parses a script, round-tripping it through serde_json first
pub fn program(source: &str) -> Rc<Program> {
    let script: Script = serde_json::from_str(source).expect("Script deserialization failed");
    let json = serde_json::to_string(&script).expect("Script serialization failed");
    let script: Script = serde_json::from_str(&json).expect("Script re-deserialization failed");
    Rc::new(Program::new(script))
}

pub fn config(budget: i32) -> EngineConfig {
    EngineConfig {
        step_budget: budget,
        ..EngineConfig::default()
    }
}

pub fn execution(source: &str, budget: i32) -> Execution {
    Execution::new(program(source), &config(budget))
}

/// Resumes until the run is over; returns the outcome and the number of resumptions
pub fn run_until_done(exec: &mut Execution, entry: &str) -> (RunState, usize) {
    for tick in 1..=MAX_TICKS {
        let state = exec.resume_or_start(entry).expect("resume failed");
        if !matches!(state, RunState::Suspended) {
            return (state, tick);
        }
    }
    panic!("'{}' still suspended after {} ticks", entry, MAX_TICKS);
}

/// Runs `entry` with the given budget, collecting everything it prints
pub fn run_collect(source: &str, entry: &str, budget: i32) -> (RunState, Vec<String>, usize) {
    let mut exec = execution(source, budget);
    let mut output = Vec::new();
    for tick in 1..=MAX_TICKS {
        let state = exec.resume_or_start(entry).expect("resume failed");
        output.extend(exec.drain_output());
        if !matches!(state, RunState::Suspended) {
            return (state, output, tick);
        }
    }
    panic!("'{}' still suspended after {} ticks", entry, MAX_TICKS);
}

/// Like `run_collect`, but after every suspension the state is saved and
/// loaded into a brand new execution of the same program
pub fn run_through_saves(source: &str, entry: &str, budget: i32) -> (RunState, Vec<String>, usize) {
    let program = program(source);
    let config = config(budget);
    let mut exec = Execution::new(program.clone(), &config);
    let mut output = Vec::new();
    for saves in 0..MAX_TICKS {
        let state = exec.resume_or_start(entry).expect("resume failed");
        output.extend(exec.drain_output());
        if !matches!(state, RunState::Suspended) {
            return (state, output, saves);
        }
        let mut bytes = Vec::new();
        exec.save(&mut bytes).expect("save failed");
        let mut next = Execution::new(program.clone(), &config);
        next.load(bytes.as_slice()).expect("load failed");
        exec = next;
    }
    panic!("'{}' still suspended after {} saves", entry, MAX_TICKS);
}

pub fn finished_int(state: &RunState) -> i32 {
    let RunState::Finished(Some(value)) = state else {
        unreachable!("Expected a finished run with a value, got {:?}", state);
    };
    value
        .as_int()
        .unwrap_or_else(|| unreachable!("Expected an int result, got {:?}", value))
}

pub fn finished_bool(state: &RunState) -> bool {
    let RunState::Finished(Some(value)) = state else {
        unreachable!("Expected a finished run with a value, got {:?}", state);
    };
    value
        .as_bool()
        .unwrap_or_else(|| unreachable!("Expected a bool result, got {:?}", value))
}

pub fn failed(state: &RunState) -> &RuntimeError {
    let RunState::Failed(err) = state else {
        unreachable!("Expected a failed run, got {:?}", state);
    };
    err
}
