//! Statement evaluation
//!
//! Each statement handler owns at most one frame (pushed on its parent) and
//! uses the frame's state counter to remember how far it got. The matching
//! `restore_*` hook walks the same frame shape after a reload.

use super::exec_loop::Interp;
use super::stack::{BlockKind, FrameId};
use super::types::control::targets_loop;
use super::types::{Control, Exec, Expr, Interrupt, Stmt, StmtKind, Variable};
use super::errors::ErrorKind;
use tracing::trace;

/* ===================== Statement Handlers ===================== */

impl<'a> Interp<'a> {
    /// Execute a statement inside `parent`
    pub fn exec_stmt(&mut self, stmt: &Stmt, parent: FrameId) -> Exec {
        if self.stack.take_exhausted() {
            return self.fail(ErrorKind::StackOverflow, stmt.span);
        }
        match &stmt.kind {
            StmtKind::Block { body } => self.exec_block(stmt, body, parent),

            StmtKind::Let { name, ty, init } => {
                let frame = self.stack.push(parent, Some(stmt.id), BlockKind::Instruction);
                if self.state(frame) == 0 {
                    if let Some(init) = init {
                        self.eval(init, frame)?;
                    }
                    self.checkpoint(frame, 1)?;
                }
                let var = match self.stack[frame].take_result() {
                    Some(value) => Variable::coerce(name, ty, value).map_err(|k| k.at(stmt.span))?,
                    None => Variable::declared(name, ty.clone()),
                };
                self.stack.declare(parent, var.with_ident(stmt.id as i64));
                self.stack.unwind(parent, frame);
                Ok(())
            }

            StmtKind::Expr { expr } => {
                self.eval(expr, parent)?;
                self.stack[parent].result = None;
                Ok(())
            }

            StmtKind::If {
                test,
                then_s,
                else_s,
            } => {
                let frame = self.stack.push(parent, Some(stmt.id), BlockKind::Instruction);
                if self.state(frame) == 0 {
                    self.eval(test, frame)?;
                    let next = if self.truth(frame, test)? { 1 } else { 2 };
                    self.checkpoint(frame, next)?;
                }
                match (self.state(frame), else_s) {
                    (1, _) => self.exec_stmt(then_s, frame)?,
                    (_, Some(else_s)) => self.exec_stmt(else_s, frame)?,
                    (_, None) => {}
                }
                self.stack.unwind(parent, frame);
                Ok(())
            }

            StmtKind::While { label, test, body } => {
                let frame = self.stack.push(parent, Some(stmt.id), BlockKind::Instruction);
                loop {
                    if self.state(frame) == 0 {
                        self.eval(test, frame)?;
                        if !self.truth(frame, test)? {
                            break;
                        }
                        self.checkpoint(frame, 1)?;
                    }
                    match self.exec_stmt(body, frame) {
                        Ok(()) => {}
                        Err(Interrupt::Signal(Control::Break(l))) if targets_loop(&l, label) => {
                            trace!(?label, "break consumed");
                            break;
                        }
                        Err(Interrupt::Signal(Control::Continue(l))) if targets_loop(&l, label) => {
                            trace!(?label, "continue consumed");
                            self.stack.release_continuation(frame);
                        }
                        Err(other) => return Err(other),
                    }
                    self.checkpoint(frame, 0)?;
                }
                self.stack[frame].result = None;
                self.stack.unwind(parent, frame);
                Ok(())
            }

            StmtKind::For {
                label,
                init,
                test,
                update,
                body,
            } => self.exec_for(stmt, label, init.as_deref(), test.as_ref(), update.as_ref(), body, parent),

            StmtKind::Break { label } => Err(Control::Break(label.clone()).into()),

            StmtKind::Continue { label } => Err(Control::Continue(label.clone()).into()),

            StmtKind::Return { value } => {
                let frame = self.stack.push(parent, Some(stmt.id), BlockKind::Instruction);
                let value = match value {
                    Some(expr) => {
                        self.eval(expr, frame)?;
                        Some(self.take_result(frame, expr.span)?)
                    }
                    None => None,
                };
                Err(Control::Return(value).into())
            }

            StmtKind::Throw { code } => {
                let frame = self.stack.push(parent, Some(stmt.id), BlockKind::Instruction);
                self.eval(code, frame)?;
                let value = self.take_result(frame, code.span)?;
                match value.as_int() {
                    Some(code) => self.fail(ErrorKind::UserError(code), stmt.span),
                    None => self.fail(
                        ErrorKind::TypeMismatch {
                            expected: "int".to_string(),
                            found: value.ty.to_string(),
                        },
                        code.span,
                    ),
                }
            }

            StmtKind::Try {
                body,
                catch_var,
                handler,
            } => {
                let frame = self.stack.push(parent, Some(stmt.id), BlockKind::Instruction);
                if self.state(frame) == 0 {
                    match self.exec_stmt(body, frame) {
                        Ok(()) => {
                            self.stack.unwind(parent, frame);
                            return Ok(());
                        }
                        Err(Interrupt::Signal(Control::Error(err))) if !err.kind.is_fatal() => {
                            trace!(code = err.code(), "error caught");
                            self.stack.release_continuation(frame);
                            let catch = self.stack.push_parallel(frame, BlockKind::Block);
                            self.stack[catch].instr = Some(handler.id);
                            if let Some(name) = catch_var {
                                let var = Variable::int(err.code()).named(name).with_ident(stmt.id as i64);
                                self.stack.declare(catch, var);
                            }
                            self.checkpoint(frame, 1)?;
                        }
                        Err(other) => return Err(other),
                    }
                }
                let catch = self.stack.push_parallel(frame, BlockKind::Block);
                self.exec_stmt(handler, catch)?;
                self.stack.unwind(parent, frame);
                Ok(())
            }
        }
    }

    fn exec_block(&mut self, stmt: &Stmt, body: &[Stmt], parent: FrameId) -> Exec {
        let frame = self.stack.push(parent, Some(stmt.id), BlockKind::Block);
        if self.stack.if_step(frame, self.ctx.single_step) {
            return Err(Interrupt::Suspend);
        }
        while let Some(next) = body.get(self.state(frame) as usize) {
            self.exec_stmt(next, frame)?;
            self.bump(frame)?;
        }
        self.stack.unwind(parent, frame);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_for(
        &mut self,
        stmt: &Stmt,
        label: &Option<String>,
        init: Option<&Stmt>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        parent: FrameId,
    ) -> Exec {
        // states: 0 init, 1 test, 2 body, 3 update
        let frame = self.stack.push(parent, Some(stmt.id), BlockKind::Block);
        if self.state(frame) == 0 {
            if let Some(init) = init {
                self.exec_stmt(init, frame)?;
            }
            self.checkpoint(frame, 1)?;
        }
        loop {
            if self.state(frame) == 1 {
                if let Some(test) = test {
                    self.eval(test, frame)?;
                    if !self.truth(frame, test)? {
                        break;
                    }
                }
                self.checkpoint(frame, 2)?;
            }
            if self.state(frame) == 2 {
                match self.exec_stmt(body, frame) {
                    Ok(()) => {}
                    Err(Interrupt::Signal(Control::Break(l))) if targets_loop(&l, label) => {
                        trace!(?label, "break consumed");
                        break;
                    }
                    Err(Interrupt::Signal(Control::Continue(l))) if targets_loop(&l, label) => {
                        trace!(?label, "continue consumed");
                        self.stack.release_continuation(frame);
                    }
                    Err(other) => return Err(other),
                }
                self.checkpoint(frame, 3)?;
            }
            if let Some(update) = update {
                self.eval(update, frame)?;
                self.stack[frame].result = None;
            }
            self.checkpoint(frame, 1)?;
        }
        self.stack[frame].result = None;
        self.stack.unwind(parent, frame);
        Ok(())
    }

    /// Takes the boolean a condition left in `frame`
    pub fn truth(&mut self, frame: FrameId, test: &Expr) -> Result<bool, Interrupt> {
        let value = self.take_result(frame, test.span)?;
        match value.as_bool() {
            Some(b) => Ok(b),
            None => self.fail(
                ErrorKind::TypeMismatch {
                    expected: "bool".to_string(),
                    found: value.ty.to_string(),
                },
                test.span,
            ),
        }
    }

    /* ===================== Restore Hooks ===================== */

    /// Re-attaches instruction references to frames rebuilt by a load
    pub fn restore_stmt(&mut self, stmt: &Stmt, parent: FrameId) {
        if let StmtKind::Expr { expr } = &stmt.kind {
            self.restore_expr(expr, parent);
            return;
        }
        if matches!(stmt.kind, StmtKind::Break { .. } | StmtKind::Continue { .. }) {
            return;
        }
        let Some(frame) = self.stack.restore_for_resume(parent, stmt.id) else {
            return;
        };
        let state = self.state(frame);
        match &stmt.kind {
            StmtKind::Block { body } => {
                if let Some(next) = body.get(state as usize) {
                    self.restore_stmt(next, frame);
                }
            }
            StmtKind::Let { init: Some(init), .. } if state == 0 => self.restore_expr(init, frame),
            StmtKind::If {
                test,
                then_s,
                else_s,
            } => match (state, else_s) {
                (0, _) => self.restore_expr(test, frame),
                (1, _) => self.restore_stmt(then_s, frame),
                (_, Some(else_s)) => self.restore_stmt(else_s, frame),
                _ => {}
            },
            StmtKind::While { test, body, .. } => match state {
                0 => self.restore_expr(test, frame),
                _ => self.restore_stmt(body, frame),
            },
            StmtKind::For {
                init,
                test,
                update,
                body,
                ..
            } => match state {
                0 => {
                    if let Some(init) = init {
                        self.restore_stmt(init, frame);
                    }
                }
                1 => {
                    if let Some(test) = test {
                        self.restore_expr(test, frame);
                    }
                }
                2 => self.restore_stmt(body, frame),
                _ => {
                    if let Some(update) = update {
                        self.restore_expr(update, frame);
                    }
                }
            },
            StmtKind::Return { value: Some(expr) } => self.restore_expr(expr, frame),
            StmtKind::Throw { code } => self.restore_expr(code, frame),
            StmtKind::Try { body, handler, .. } => {
                if state == 0 {
                    self.restore_stmt(body, frame);
                } else if let Some(catch) = self.stack.restore_parallel(frame, handler.id) {
                    self.restore_stmt(handler, catch);
                }
            }
            _ => {}
        }
    }
}
