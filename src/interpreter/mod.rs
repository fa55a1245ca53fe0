//! # Resumable interpreter
//!
//! A tree-walking evaluator whose whole control state lives in an arena of
//! frames instead of the Rust call stack's locals.
//!
//! ## Core Principles
//!
//! 1. **Memoized frames**: a node re-entered after a suspension finds the frame
//!    it allocated before, with its state counter and partial results
//! 2. **Cooperative budget**: every state change spends one tick; when the budget
//!    is gone the evaluation returns `Interrupt::Suspend` all the way up
//! 3. **One signal channel**: break/continue/return and language errors travel
//!    as `Interrupt::Signal` until a loop, call or `try` consumes them
//! 4. **Persistable**: the frame chain, globals, instances and class statics
//!    serialize to a flat byte stream and load back into a fresh execution

pub mod access;
pub mod context;
pub mod errors;
pub mod exec_loop;
pub mod execution;
pub mod expressions;
pub mod externals;
pub mod operators;
pub mod persist;
pub mod program;
pub mod stack;
pub mod statements;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used items
pub use errors::{EngineError, ErrorKind, PersistError, RuntimeError};
pub use execution::{Execution, RunPosition, RunState, StackVars};
pub use externals::{CallState, ExternalFunction, ExternalStep};
pub use program::Program;
pub use types::{Instance, ObjRef, ObjectHost, Script, Span, TypeTag, Variable};
