//! Core evaluation loop
//!
//! `Interp` borrows the program, the frame arena and the context for one
//! resumption. Every node is evaluated against its parent frame and returns an
//! `Exec`:
//!
//! - `Ok(())`: finished, its value (if any) is in the parent's result slot
//! - `Err(Interrupt::Suspend)`: out of budget, every frame left in place
//! - `Err(Interrupt::Signal(..))`: break/continue/return/error travelling upward
//!
//! Re-entering from the root after a suspension walks the memoized frames and
//! picks up each node at its saved state.

use super::context::ExecContext;
use super::errors::ErrorKind;
use super::externals::{CallState, ExternalStep};
use super::program::Program;
use super::stack::{BlockKind, ExecStack, FrameId};
use super::types::{Control, Exec, FunctionDef, Interrupt, Span, Variable};
use tracing::{trace, warn};

/// State changes never yield while the timer is above this
pub const TIMER_LIMIT: i32 = 0;

pub struct Interp<'a> {
    pub program: &'a Program,
    pub stack: &'a mut ExecStack,
    pub ctx: &'a mut ExecContext,
}

impl<'a> Interp<'a> {
    pub fn new(program: &'a Program, stack: &'a mut ExecStack, ctx: &'a mut ExecContext) -> Self {
        Interp {
            program,
            stack,
            ctx,
        }
    }

    /* ===================== Helpers ===================== */

    /// Moves `frame` to state `next`, yielding if the budget is spent
    pub fn checkpoint(&mut self, frame: FrameId, next: i32) -> Exec {
        if self.stack.advance_state(frame, next, TIMER_LIMIT) {
            Ok(())
        } else {
            Err(Interrupt::Suspend)
        }
    }

    /// Bumps the state of `frame`, yielding if the budget is spent
    pub fn bump(&mut self, frame: FrameId) -> Exec {
        if self.stack.increment_state(frame, TIMER_LIMIT) {
            Ok(())
        } else {
            Err(Interrupt::Suspend)
        }
    }

    pub fn state(&self, frame: FrameId) -> i32 {
        self.stack[frame].state
    }

    /// Raises a language error at `span`
    pub fn fail<T>(&self, kind: ErrorKind, span: Span) -> Result<T, Interrupt> {
        Err(Interrupt::from(kind.at(span)))
    }

    /// Takes the result a child left in `frame`
    pub fn take_result(&mut self, frame: FrameId, span: Span) -> Result<Variable, Interrupt> {
        match self.stack[frame].take_result() {
            Some(v) => Ok(v),
            None => self.fail(ErrorKind::NotInitialized(String::new()), span),
        }
    }

    /* ===================== Calls ===================== */

    /// Runs function `name` with the arguments already collected in `call`'s locals.
    /// Returns the function's value once it completes.
    pub fn dispatch(&mut self, name: &str, call: FrameId, span: Span) -> Result<Option<Variable>, Interrupt> {
        let program = self.program;
        if let Some(func) = program.function(name) {
            return self.invoke(func, call, span);
        }
        if let Some(ext) = self.ctx.externals.get(name).cloned() {
            let argc = self.stack[call].locals.len();
            if let Some(expected) = ext.arity() {
                if expected != argc {
                    return self.fail(
                        ErrorKind::BadArgumentCount {
                            name: name.to_string(),
                            expected,
                            found: argc,
                        },
                        span,
                    );
                }
            }
            let frame = self.stack.push(call, None, BlockKind::ExternalCall);
            let args = std::mem::take(&mut self.stack[call].locals);
            let mut state = self.stack[frame].state;
            let step = ext.call(&mut CallState {
                args: &args,
                state: &mut state,
                output: &mut self.ctx.output,
            });
            self.stack[call].locals = args;
            self.stack[frame].state = state;
            return match step {
                Ok(ExternalStep::Done(value)) => Ok(value),
                Ok(ExternalStep::Pending) => Err(Interrupt::Suspend),
                Err(kind) => self.fail(kind, span),
            };
        }
        self.fail(ErrorKind::UndefinedFunction(name.to_string()), span)
    }

    /// Runs a user function whose arguments sit in `call`'s locals
    fn invoke(&mut self, func: &FunctionDef, call: FrameId, span: Span) -> Result<Option<Variable>, Interrupt> {
        let body = self.stack.push(call, Some(func.id), BlockKind::FunctionBody);
        if self.stack.is_overflowed(body) {
            warn!(function = %func.name, depth = self.stack.live(), "stack overflow");
            return self.fail(ErrorKind::StackOverflow, span);
        }

        if self.state(body) == 0 {
            let args = &self.stack[call].locals;
            if args.len() != func.params.len() {
                let found = args.len();
                return self.fail(
                    ErrorKind::BadArgumentCount {
                        name: func.name.clone(),
                        expected: func.params.len(),
                        found,
                    },
                    span,
                );
            }
            let mut bound = Vec::with_capacity(func.params.len());
            for (param, arg) in func.params.iter().zip(args.iter().cloned()) {
                match Variable::coerce(&param.name, &param.ty, arg) {
                    Ok(var) => bound.push(var.with_ident(func.id as i64)),
                    Err(kind) => return self.fail(kind, span),
                }
            }
            self.stack[body].locals = bound;
            self.checkpoint(body, 1)?;
        }

        match self.exec_stmt(&func.body, body) {
            Ok(()) => Ok(None),
            Err(Interrupt::Signal(Control::Return(value))) => {
                trace!(function = %func.name, "return consumed");
                match value {
                    Some(v) => Variable::coerce("", &func.returns, v)
                        .map(Some)
                        .or_else(|kind| self.fail(kind, span)),
                    None => Ok(None),
                }
            }
            Err(Interrupt::Signal(Control::Break(_) | Control::Continue(_))) => {
                self.fail(ErrorKind::NoLoop, span)
            }
            Err(other) => Err(other),
        }
    }

    /// Re-attaches frames of a call after a reload
    pub fn restore_dispatch(&mut self, name: &str, call: FrameId) {
        let program = self.program;
        let Some(func) = program.function(name) else {
            return;
        };
        let Some(body) = self.stack.restore_for_resume(call, func.id) else {
            return;
        };
        if self.state(body) > 0 {
            self.restore_stmt(&func.body, body);
        }
    }
}
