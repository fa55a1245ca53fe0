//! Execution driver
//!
//! An `Execution` runs one entry function of a `Program` in bounded slices.
//! Each `resume_or_start` call spends at most the step budget and returns
//! `Suspended` when the run is not over yet; calling it again continues from
//! the exact point where the previous slice stopped. The whole in-flight state
//! can be saved to a byte stream and loaded back, into this execution or a
//! fresh one running the same program.

use super::context::ExecContext;
use super::errors::{EngineError, ErrorKind, PersistError, RuntimeError};
use super::exec_loop::Interp;
use super::externals::ExternalFunction;
use super::persist;
use super::program::Program;
use super::stack::{BlockKind, ExecStack, FrameId};
use super::types::{Control, Interrupt, ObjRef, ObjectHost, Span, Variable};
use crate::config::EngineConfig;
use std::io::{Read, Write};
use std::rc::Rc;
use tracing::{debug, info};

/// Outcome of one resumption
#[derive(Debug, Clone)]
pub enum RunState {
    Finished(Option<Variable>),
    Suspended,
    Failed(RuntimeError),
}

/// Where a suspended run currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPosition {
    pub function: String,
    pub span: Span,
}

/// Variables visible in one block of a suspended run
#[derive(Debug, Clone)]
pub struct StackVars {
    pub function: String,
    pub vars: Vec<Variable>,
}

pub struct Execution {
    program: Rc<Program>,
    stack: ExecStack,
    ctx: ExecContext,
    /// Entry function of the run in progress
    entry: Option<String>,
}

impl Execution {
    pub fn new(program: Rc<Program>, config: &EngineConfig) -> Self {
        let mut stack = ExecStack::new(config.max_depth, config.guard_slots, config.step_budget);
        stack.allocate();
        Execution {
            program,
            stack,
            ctx: ExecContext::new(config.single_step),
            entry: None,
        }
    }

    pub fn program(&self) -> &Rc<Program> {
        &self.program
    }

    /// Drops any run in progress and every global
    pub fn allocate(&mut self) {
        self.stack.allocate();
        self.entry = None;
        self.ctx.clear_error();
    }

    pub fn is_running(&self) -> bool {
        self.entry.is_some()
    }

    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    /// Frame of the entry call
    fn call_frame(&self) -> Option<FrameId> {
        self.entry.as_ref()?;
        self.stack.root().and_then(|root| self.stack[root].continuation)
    }

    /* ===================== Running ===================== */

    /// Begins a run of `entry` with arguments
    pub fn start(&mut self, entry: &str, args: Vec<Variable>) -> Result<(), EngineError> {
        if let Some(running) = &self.entry {
            return Err(EngineError::EntryMismatch {
                running: running.clone(),
                requested: entry.to_string(),
            });
        }
        let func = self
            .program
            .function(entry)
            .ok_or_else(|| EngineError::UnknownEntry(entry.to_string()))?;
        let root = match self.stack.root() {
            Some(root) => root,
            None => self.stack.allocate(),
        };
        self.stack.release_children(root);
        // an overflow flag left by the previous run does not carry over
        self.stack.take_exhausted();
        let call = self.stack.push(root, Some(func.id), BlockKind::Instruction);
        self.stack[call].state = args.len() as i32;
        self.stack[call].locals = args;
        self.ctx.clear_error();
        self.entry = Some(entry.to_string());
        debug!(entry, "run started");
        Ok(())
    }

    /// Runs one slice of `entry`, starting it first if nothing is running
    pub fn resume_or_start(&mut self, entry: &str) -> Result<RunState, EngineError> {
        match &self.entry {
            None => self.start(entry, Vec::new())?,
            Some(running) if running != entry => {
                return Err(EngineError::EntryMismatch {
                    running: running.clone(),
                    requested: entry.to_string(),
                })
            }
            Some(_) => {}
        }
        self.resume()
    }

    /// Runs one slice of the run in progress
    pub fn resume(&mut self) -> Result<RunState, EngineError> {
        let (Some(entry), Some(call)) = (self.entry.clone(), self.call_frame()) else {
            return Err(EngineError::NotRunning);
        };
        self.stack.reset_timer();

        let program = Rc::clone(&self.program);
        let span = program.function(&entry).map(|f| f.span).unwrap_or_default();
        let outcome = Interp::new(&program, &mut self.stack, &mut self.ctx).dispatch(&entry, call, span);

        let state = match outcome {
            Ok(value) => {
                debug!(entry = %entry, "run finished");
                RunState::Finished(value)
            }
            Err(Interrupt::Suspend) => {
                debug!(entry = %entry, frames = self.stack.live(), "run suspended");
                return Ok(RunState::Suspended);
            }
            Err(Interrupt::Signal(Control::Error(err))) => {
                debug!(entry = %entry, error = %err, "run failed");
                self.ctx.set_error(err.clone());
                RunState::Failed(err)
            }
            Err(Interrupt::Signal(_)) => {
                let err = ErrorKind::NoLoop.at(span);
                self.ctx.set_error(err.clone());
                RunState::Failed(err)
            }
        };
        self.stop();
        Ok(state)
    }

    /// Abandons the run in progress, keeping globals
    pub fn stop(&mut self) {
        if let Some(root) = self.stack.root() {
            self.stack.release_children(root);
            self.stack[root].result = None;
        }
        self.entry = None;
    }

    pub fn set_suspend_budget(&mut self, budget: i32) {
        self.stack.set_budget(budget.max(1));
    }

    /* ===================== Inspection ===================== */

    /// First error of the last run
    pub fn current_error(&self) -> Option<&RuntimeError> {
        self.ctx.last_error.as_ref()
    }

    pub fn error_position(&self) -> Option<Span> {
        self.ctx.last_error.as_ref().map(|e| e.span)
    }

    /// Innermost function and instruction of the run in progress
    pub fn run_position(&self) -> Option<RunPosition> {
        let call = self.call_frame()?;
        let instr = self
            .stack
            .active_chain(call)
            .into_iter()
            .rev()
            .find_map(|id| self.stack[id].instr)?;
        Some(RunPosition {
            function: self.program.function_of(instr)?.to_string(),
            span: self.program.span_of(instr),
        })
    }

    /// Named variables of the innermost block (level 0) or an enclosing one
    /// (level -1, -2, ...), with the function owning that block
    pub fn stack_vars(&self, level: i32) -> Option<StackVars> {
        let call = self.call_frame()?;
        let blocks: Vec<FrameId> = self
            .stack
            .active_chain(call)
            .into_iter()
            .filter(|id| matches!(self.stack[*id].kind, BlockKind::Block | BlockKind::FunctionBody))
            .collect();
        let index = (blocks.len() as i32 - 1).checked_add(level.min(0))?;
        let frame = *blocks.get(usize::try_from(index).ok()?)?;
        let instr = self.stack[frame].instr?;
        Some(StackVars {
            function: self.program.function_of(instr)?.to_string(),
            vars: self.stack[frame]
                .locals
                .iter()
                .filter(|v| !v.name.is_empty())
                .cloned()
                .collect(),
        })
    }

    /* ===================== Host API ===================== */

    /// Declares or replaces a global visible from every function
    pub fn bind_global(&mut self, var: Variable) {
        let root = match self.stack.root() {
            Some(root) => root,
            None => self.stack.allocate(),
        };
        let globals = &mut self.stack[root].locals;
        match globals.iter_mut().find(|g| g.name == var.name) {
            Some(existing) => *existing = var,
            None => globals.push(var),
        }
    }

    pub fn global(&self, name: &str) -> Option<&Variable> {
        let root = self.stack.root()?;
        self.stack[root].locals.iter().find(|g| g.name == name)
    }

    pub fn create_instance(&mut self, class: &str) -> Result<ObjRef, EngineError> {
        let class = self
            .program
            .class(class)
            .cloned()
            .ok_or_else(|| EngineError::UnknownClass(class.to_string()))?;
        Ok(self.ctx.registry.instantiate(class))
    }

    /// Resident instance with the given identity
    pub fn find_instance(&self, ident: i64) -> Option<ObjRef> {
        self.ctx.registry.find(ident)
    }

    pub fn register_external(&mut self, name: &str, function: Rc<dyn ExternalFunction>) {
        self.ctx.externals.insert(name.to_string(), function);
    }

    pub fn set_host(&mut self, host: Box<dyn ObjectHost>) {
        self.ctx.host = host;
    }

    pub fn output(&self) -> &[String] {
        &self.ctx.output
    }

    pub fn drain_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.ctx.output)
    }

    /* ===================== Persistence ===================== */

    pub fn save<W: Write>(&self, out: W) -> Result<(), PersistError> {
        persist::save_state(out, &self.program, &self.stack, self.entry.as_deref())?;
        debug!(entry = ?self.entry, frames = self.stack.live(), "state saved");
        Ok(())
    }

    /// Replaces the current state with a saved one. On error nothing changes.
    pub fn load<R: Read>(&mut self, input: R) -> Result<(), PersistError> {
        let loaded = persist::load_state(input, &self.program, &self.ctx.registry, &self.stack)?;

        self.stack = loaded.stack;
        self.entry = loaded.entry;
        self.ctx.clear_error();
        for obj in &loaded.created {
            self.ctx.registry.register(obj);
        }
        for (class, vars) in loaded.statics {
            *class.statics.borrow_mut() = vars;
        }
        self.ctx.registry.prune();

        if let (Some(entry), Some(call)) = (self.entry.clone(), self.call_frame()) {
            let program = Rc::clone(&self.program);
            Interp::new(&program, &mut self.stack, &mut self.ctx).restore_dispatch(&entry, call);
        }
        info!(entry = ?self.entry, frames = self.stack.live(), "state loaded");
        Ok(())
    }
}
