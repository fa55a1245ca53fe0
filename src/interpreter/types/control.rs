//! Control flow outcome of an evaluation step

use super::super::errors::RuntimeError;
use super::values::Variable;

/* ===================== Control Flow ===================== */

/// A signal unwinding the evaluation towards the construct that consumes it
#[derive(Debug, Clone)]
pub enum Control {
    Break(Option<String>),    // Optional loop label
    Continue(Option<String>), // Optional loop label
    Return(Option<Variable>),
    Error(RuntimeError),
}

/// Why an evaluation step did not complete
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// Step budget exhausted; re-enter from the root to continue
    Suspend,
    Signal(Control),
}

/// Result of evaluating a node against its parent frame
pub type Exec = Result<(), Interrupt>;

impl From<RuntimeError> for Interrupt {
    fn from(err: RuntimeError) -> Self {
        Interrupt::Signal(Control::Error(err))
    }
}

impl From<Control> for Interrupt {
    fn from(c: Control) -> Self {
        Interrupt::Signal(c)
    }
}

/// Whether a break/continue carrying `signal` targets a loop labelled `label`.
/// An unlabelled signal targets the nearest loop.
pub fn targets_loop(signal: &Option<String>, label: &Option<String>) -> bool {
    match signal {
        None => true,
        Some(wanted) => label.as_deref() == Some(wanted.as_str()),
    }
}
