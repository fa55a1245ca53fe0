//! Type definitions for the engine
//!
//! - AST nodes (Stmt, Expr)
//! - Runtime values (Variable, TypeTag)
//! - Object model (Class, Instance, Registry)
//! - Control flow (Interrupt, Control)

pub mod ast;
pub mod control;
pub mod objects;
pub mod values;

// Re-export all types for convenient access
pub use ast::*;
pub use control::{Control, Exec, Interrupt};
pub use objects::{next_ident, Class, Instance, NoHost, ObjRef, ObjectHost, Registry};
pub use values::{InitStatus, Payload, TypeTag, Variable, Visibility};
