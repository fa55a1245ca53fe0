//! Arithmetic, comparison and logical operators on runtime values

use super::errors::ErrorKind;
use super::types::{BinaryOp, Payload, TypeTag, UnaryOp, Variable};
use std::cmp::Ordering;

fn mismatch(expected: &str, found: &Variable) -> ErrorKind {
    ErrorKind::TypeMismatch {
        expected: expected.to_string(),
        found: found.ty.to_string(),
    }
}

/// Applies a binary operator. `And`/`Or` here are the non-short-circuit forms.
pub fn binary(op: BinaryOp, lhs: &Variable, rhs: &Variable) -> Result<Variable, ErrorKind> {
    use BinaryOp::*;
    match op {
        Eq => Ok(Variable::boolean(lhs.same_value(rhs))),
        Ne => Ok(Variable::boolean(!lhs.same_value(rhs))),
        And | Or => {
            let l = lhs.as_bool().ok_or_else(|| mismatch("bool", lhs))?;
            let r = rhs.as_bool().ok_or_else(|| mismatch("bool", rhs))?;
            Ok(Variable::boolean(if op == And { l && r } else { l || r }))
        }
        Add if lhs.ty == TypeTag::String || rhs.ty == TypeTag::String => {
            Ok(Variable::string(format!("{}{}", lhs.display(), rhs.display())))
        }
        Lt | Le | Gt | Ge => {
            let ord = compare(lhs, rhs)?;
            let result = match op {
                Lt => ord == Ordering::Less,
                Le => ord != Ordering::Greater,
                Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            };
            Ok(Variable::boolean(result))
        }
        Add | Sub | Mul | Div | Rem => arithmetic(op, lhs, rhs),
    }
}

fn compare(lhs: &Variable, rhs: &Variable) -> Result<Ordering, ErrorKind> {
    match (&lhs.payload, &rhs.payload) {
        (Payload::Int(a), Payload::Int(b)) => Ok(a.cmp(b)),
        (Payload::Str(a), Payload::Str(b)) => Ok(a.cmp(b)),
        _ => {
            let a = lhs.as_float().ok_or_else(|| mismatch("number", lhs))?;
            let b = rhs.as_float().ok_or_else(|| mismatch("number", rhs))?;
            Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal))
        }
    }
}

fn arithmetic(op: BinaryOp, lhs: &Variable, rhs: &Variable) -> Result<Variable, ErrorKind> {
    if let (Payload::Int(a), Payload::Int(b)) = (&lhs.payload, &rhs.payload) {
        let (a, b) = (*a, *b);
        let value = match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div if b == 0 => return Err(ErrorKind::DivisionByZero),
            BinaryOp::Div => a.wrapping_div(b),
            BinaryOp::Rem if b == 0 => return Err(ErrorKind::DivisionByZero),
            _ => a.wrapping_rem(b),
        };
        return Ok(Variable::int(value));
    }
    let a = lhs.as_float().ok_or_else(|| mismatch("number", lhs))?;
    let b = rhs.as_float().ok_or_else(|| mismatch("number", rhs))?;
    let value = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Rem if b == 0.0 => return Err(ErrorKind::DivisionByZero),
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    Ok(Variable::float(value))
}

pub fn unary(op: UnaryOp, operand: &Variable) -> Result<Variable, ErrorKind> {
    match (op, &operand.payload) {
        (UnaryOp::Neg, Payload::Int(v)) => Ok(Variable::int(v.wrapping_neg())),
        (UnaryOp::Neg, Payload::Float(v)) => Ok(Variable::float(-v)),
        (UnaryOp::Not, Payload::Bool(v)) => Ok(Variable::boolean(!v)),
        (UnaryOp::Neg, _) => Err(mismatch("number", operand)),
        (UnaryOp::Not, _) => Err(mismatch("bool", operand)),
    }
}
