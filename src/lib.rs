pub mod cli;
pub mod config;
pub mod interpreter;

// Re-export main types
pub use crate::config::EngineConfig;
pub use interpreter::{
    EngineError, Execution, ObjRef, PersistError, Program, RunPosition, RunState, RuntimeError,
    Script, Span, Variable,
};
