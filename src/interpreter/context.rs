//! Per-execution runtime context
//!
//! Everything an evaluation touches besides the frame arena: the instance
//! registry, host functions, the host refresh hook, the error record and the
//! output buffer. Each `Execution` owns one, so several programs can be in
//! flight on the same thread.

use super::errors::RuntimeError;
use super::externals::{self, ExternalFunction};
use super::types::{NoHost, ObjectHost, Registry};
use std::collections::HashMap;
use std::rc::Rc;

pub struct ExecContext {
    pub registry: Registry,
    pub externals: HashMap<String, Rc<dyn ExternalFunction>>,
    pub host: Box<dyn ObjectHost>,
    pub single_step: bool,
    /// First error of the current run
    pub last_error: Option<RuntimeError>,
    pub output: Vec<String>,
}

impl ExecContext {
    pub fn new(single_step: bool) -> Self {
        ExecContext {
            registry: Registry::new(),
            externals: externals::builtins(),
            host: Box::new(NoHost),
            single_step,
            last_error: None,
            output: Vec::new(),
        }
    }

    /// Records an error unless one is already recorded
    pub fn set_error(&mut self, err: RuntimeError) {
        if self.last_error.is_none() {
            self.last_error = Some(err);
        }
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }
}
