//! Expression evaluation
//!
//! An expression leaves its value in the result slot of the frame it was
//! evaluated against. Literals write it directly; everything else works in a
//! frame of its own and hands the value down with `unwind`.

use super::errors::ErrorKind;
use super::exec_loop::Interp;
use super::operators;
use super::stack::{BlockKind, FrameId};
use super::types::{Accessor, AccessorKind, BinaryOp, Exec, Expr, ExprKind, TypeTag, Variable};

/// Index expressions of an access path, in evaluation order
fn indices(path: &[Accessor]) -> impl Iterator<Item = &Expr> {
    path.iter().filter_map(|acc| match &acc.kind {
        AccessorKind::Index { index } => Some(index),
        AccessorKind::Field { .. } => None,
    })
}

/// The index expression evaluated after `done` others
fn pending_index(path: &[Accessor], done: i32) -> Option<&Expr> {
    indices(path).nth(done.max(0) as usize)
}

impl<'a> Interp<'a> {
    /// Evaluate an expression into `parent`'s result slot
    pub fn eval(&mut self, expr: &Expr, parent: FrameId) -> Exec {
        if self.stack.take_exhausted() {
            return self.fail(ErrorKind::StackOverflow, expr.span);
        }
        match &expr.kind {
            ExprKind::Int { v } => self.literal(parent, Variable::int(*v)),
            ExprKind::Float { v } => self.literal(parent, Variable::float(*v)),
            ExprKind::Bool { v } => self.literal(parent, Variable::boolean(*v)),
            ExprKind::Str { v } => self.literal(parent, Variable::string(v.as_str())),
            ExprKind::Null => self.literal(parent, Variable::pointer("", None)),

            ExprKind::New { class } => {
                let program = self.program;
                let Some(class_def) = program.class(class) else {
                    return self.fail(ErrorKind::UndefinedItem(class.clone()), expr.span);
                };
                let object = self.ctx.registry.instantiate(class_def.clone());
                self.literal(parent, Variable::pointer(class.as_str(), Some(object)))
            }

            ExprKind::Var { name, path } => {
                let frame = self.stack.push(parent, Some(expr.id), BlockKind::Instruction);
                self.eval_indices(path, frame, 0)?;
                let place = self.resolve_place(name, path, frame, 0, expr.span)?;
                let value = self.read_place(&place, expr.span)?;
                self.stack[frame].result = Some(value);
                self.stack.unwind(parent, frame);
                Ok(())
            }

            ExprKind::Assign {
                name,
                path,
                op,
                value,
            } => {
                // locals[0] holds the assigned value, index values follow
                let frame = self.stack.push(parent, Some(expr.id), BlockKind::Instruction);
                if self.state(frame) == 0 {
                    self.eval(value, frame)?;
                    let rhs = self.take_result(frame, value.span)?;
                    self.stack[frame].locals.push(rhs);
                    self.checkpoint(frame, 1)?;
                }
                self.eval_indices(path, frame, 1)?;
                let place = self.resolve_place(name, path, frame, 1, expr.span)?;
                let rhs = self.stack[frame].locals[0].clone();
                let new_value = match op.binary() {
                    None => rhs,
                    Some(bop) => {
                        let current = self.read_place(&place, expr.span)?;
                        operators::binary(bop, &current, &rhs).map_err(|k| k.at(expr.span))?
                    }
                };
                let stored = self.write_place(&place, new_value, expr.span)?;
                self.stack[frame].result = Some(stored);
                self.stack.unwind(parent, frame);
                Ok(())
            }

            ExprKind::Binary { op, lhs, rhs } => {
                let frame = self.stack.push(parent, Some(expr.id), BlockKind::Instruction);
                if self.state(frame) == 0 {
                    self.eval(lhs, frame)?;
                    self.checkpoint(frame, 1)?;
                }
                if matches!(op, BinaryOp::And | BinaryOp::Or) {
                    let left = self.stack[frame].result.as_ref().and_then(Variable::as_bool);
                    if left == Some(*op == BinaryOp::Or) {
                        self.stack.unwind(parent, frame);
                        return Ok(());
                    }
                }
                let holder = self.stack.push(frame, Some(rhs.id), BlockKind::Instruction);
                if self.state(holder) == 0 {
                    self.eval(rhs, holder)?;
                    self.checkpoint(holder, 1)?;
                }
                let right = self.take_result(holder, rhs.span)?;
                let left = self.take_result(frame, lhs.span)?;
                let value = operators::binary(*op, &left, &right).map_err(|k| k.at(expr.span))?;
                self.stack[frame].result = Some(value);
                self.stack.unwind(parent, frame);
                Ok(())
            }

            ExprKind::Unary { op, operand } => {
                let frame = self.stack.push(parent, Some(expr.id), BlockKind::Instruction);
                self.eval(operand, frame)?;
                let value = self.take_result(frame, operand.span)?;
                let value = operators::unary(*op, &value).map_err(|k| k.at(expr.span))?;
                self.stack[frame].result = Some(value);
                self.stack.unwind(parent, frame);
                Ok(())
            }

            ExprKind::Cond {
                test,
                then_e,
                else_e,
            } => {
                let frame = self.stack.push(parent, Some(expr.id), BlockKind::Instruction);
                if self.state(frame) == 0 {
                    self.eval(test, frame)?;
                    let next = if self.truth(frame, test)? { 1 } else { 2 };
                    self.checkpoint(frame, next)?;
                }
                let branch = if self.state(frame) == 1 { then_e } else { else_e };
                self.eval(branch, frame)?;
                self.stack.unwind(parent, frame);
                Ok(())
            }

            ExprKind::Call { name, args } => {
                let frame = self.stack.push(parent, Some(expr.id), BlockKind::Instruction);
                while let Some(arg) = args.get(self.state(frame) as usize) {
                    self.eval(arg, frame)?;
                    let value = self.take_result(frame, arg.span)?;
                    self.stack[frame].locals.push(value);
                    self.bump(frame)?;
                }
                let value = self.dispatch(name, frame, expr.span)?;
                self.stack[frame].result = value;
                self.stack.unwind(parent, frame);
                Ok(())
            }

            ExprKind::Array { items } => {
                let frame = self.stack.push(parent, Some(expr.id), BlockKind::Instruction);
                while let Some(item) = items.get(self.state(frame) as usize) {
                    self.eval(item, frame)?;
                    let value = self.take_result(frame, item.span)?;
                    self.stack[frame].locals.push(value);
                    self.bump(frame)?;
                }
                let values = std::mem::take(&mut self.stack[frame].locals);
                let elem = values.first().map(|v| v.ty.clone()).unwrap_or(TypeTag::Void);
                let array = Variable::coerce("", &TypeTag::Array(Box::new(elem.clone())), Variable::array(elem, values))
                    .map_err(|k| k.at(expr.span))?;
                self.stack[frame].result = Some(array);
                self.stack.unwind(parent, frame);
                Ok(())
            }
        }
    }

    fn literal(&mut self, parent: FrameId, value: Variable) -> Exec {
        self.stack[parent].result = Some(value);
        Ok(())
    }

    /// Evaluates the index expressions of `path` into `frame`'s locals.
    /// The frame's state counts indices done, offset by `first_state`.
    fn eval_indices(&mut self, path: &[Accessor], frame: FrameId, first_state: i32) -> Exec {
        for (k, index) in indices(path).enumerate() {
            if self.state(frame) > first_state + k as i32 {
                continue;
            }
            self.eval(index, frame)?;
            let value = self.take_result(frame, index.span)?;
            self.stack[frame].locals.push(value);
            self.bump(frame)?;
        }
        Ok(())
    }

    /* ===================== Restore Hooks ===================== */

    pub fn restore_expr(&mut self, expr: &Expr, parent: FrameId) {
        match &expr.kind {
            ExprKind::Int { .. }
            | ExprKind::Float { .. }
            | ExprKind::Bool { .. }
            | ExprKind::Str { .. }
            | ExprKind::Null
            | ExprKind::New { .. } => {}

            ExprKind::Var { path, .. } => {
                let Some(frame) = self.stack.restore_for_resume(parent, expr.id) else {
                    return;
                };
                if let Some(index) = pending_index(path, self.state(frame)) {
                    self.restore_expr(index, frame);
                }
            }

            ExprKind::Assign { path, value, .. } => {
                let Some(frame) = self.stack.restore_for_resume(parent, expr.id) else {
                    return;
                };
                match self.state(frame) {
                    0 => self.restore_expr(value, frame),
                    done => {
                        if let Some(index) = pending_index(path, done - 1) {
                            self.restore_expr(index, frame);
                        }
                    }
                }
            }

            ExprKind::Binary { lhs, rhs, .. } => {
                let Some(frame) = self.stack.restore_for_resume(parent, expr.id) else {
                    return;
                };
                if self.state(frame) == 0 {
                    self.restore_expr(lhs, frame);
                } else if let Some(holder) = self.stack.restore_for_resume(frame, rhs.id) {
                    if self.state(holder) == 0 {
                        self.restore_expr(rhs, holder);
                    }
                }
            }

            ExprKind::Unary { operand, .. } => {
                if let Some(frame) = self.stack.restore_for_resume(parent, expr.id) {
                    self.restore_expr(operand, frame);
                }
            }

            ExprKind::Cond {
                test,
                then_e,
                else_e,
            } => {
                let Some(frame) = self.stack.restore_for_resume(parent, expr.id) else {
                    return;
                };
                match self.state(frame) {
                    0 => self.restore_expr(test, frame),
                    1 => self.restore_expr(then_e, frame),
                    _ => self.restore_expr(else_e, frame),
                }
            }

            ExprKind::Call { name, args } => {
                let Some(frame) = self.stack.restore_for_resume(parent, expr.id) else {
                    return;
                };
                match args.get(self.state(frame) as usize) {
                    Some(arg) => self.restore_expr(arg, frame),
                    None => self.restore_dispatch(name, frame),
                }
            }

            ExprKind::Array { items } => {
                let Some(frame) = self.stack.restore_for_resume(parent, expr.id) else {
                    return;
                };
                if let Some(item) = items.get(self.state(frame) as usize) {
                    self.restore_expr(item, frame);
                }
            }
        }
    }
}
