//! Host functions callable from scripts
//!
//! A host function runs inside its own `ExternalCall` frame. It may report
//! `Pending` to be called again on the next resumption, using the frame's state
//! counter as its own progress marker.

use super::errors::ErrorKind;
use super::types::Variable;
use std::collections::HashMap;
use std::rc::Rc;

/// Outcome of one invocation of a host function
#[derive(Debug)]
pub enum ExternalStep {
    Done(Option<Variable>),
    Pending,
}

/// What a host function can see and touch during one invocation
pub struct CallState<'a> {
    pub args: &'a [Variable],
    /// Persisted with the frame; zero on the first invocation
    pub state: &'a mut i32,
    pub output: &'a mut Vec<String>,
}

pub trait ExternalFunction {
    /// Expected argument count, `None` for variadic
    fn arity(&self) -> Option<usize>;

    fn call(&self, call: &mut CallState<'_>) -> Result<ExternalStep, ErrorKind>;
}

/// `wait(ticks)`: stays pending for the given number of resumptions
pub struct Wait;

impl ExternalFunction for Wait {
    fn arity(&self) -> Option<usize> {
        Some(1)
    }

    fn call(&self, call: &mut CallState<'_>) -> Result<ExternalStep, ErrorKind> {
        let ticks = call.args[0].as_int().ok_or_else(|| ErrorKind::TypeMismatch {
            expected: "int".to_string(),
            found: call.args[0].ty.to_string(),
        })?;
        if *call.state >= ticks {
            return Ok(ExternalStep::Done(None));
        }
        *call.state += 1;
        Ok(ExternalStep::Pending)
    }
}

/// `print(value...)`: appends the rendered arguments to the output buffer
pub struct Print;

impl ExternalFunction for Print {
    fn arity(&self) -> Option<usize> {
        None
    }

    fn call(&self, call: &mut CallState<'_>) -> Result<ExternalStep, ErrorKind> {
        let line: Vec<String> = call.args.iter().map(Variable::display).collect();
        call.output.push(line.join(" "));
        Ok(ExternalStep::Done(None))
    }
}

/// Functions every execution starts with
pub fn builtins() -> HashMap<String, Rc<dyn ExternalFunction>> {
    let mut map: HashMap<String, Rc<dyn ExternalFunction>> = HashMap::new();
    map.insert("wait".to_string(), Rc::new(Wait));
    map.insert("print".to_string(), Rc::new(Print));
    map
}
