//! Runtime value types
//!
//! A `Variable` is a named, typed cell. Scalar payloads are stored inline,
//! instances are shared through `ObjRef` and compared by identity, arrays own
//! their element variables.

use super::super::errors::ErrorKind;
use super::objects::ObjRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Declared type of a variable
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTag {
    #[default]
    Void,
    Bool,
    Int,
    Float,
    String,
    /// Pointer to an instance of the named class
    Pointer(String),
    Array(Box<TypeTag>),
}

impl TypeTag {
    pub fn is_pointer(&self) -> bool {
        matches!(self, TypeTag::Pointer(_))
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Void => write!(f, "void"),
            TypeTag::Bool => write!(f, "bool"),
            TypeTag::Int => write!(f, "int"),
            TypeTag::Float => write!(f, "float"),
            TypeTag::String => write!(f, "string"),
            TypeTag::Pointer(class) => write!(f, "{}", class),
            TypeTag::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum Visibility {
    #[default]
    Public = 0,
    Protected = 1,
    Private = 2,
}

impl Visibility {
    pub fn from_word(w: u16) -> Option<Self> {
        match w {
            0 => Some(Visibility::Public),
            1 => Some(Visibility::Protected),
            2 => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// Initialization status of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum InitStatus {
    /// Declared, never assigned
    Undefined = 0,
    /// Holds a value
    Declared = 1,
    /// Pointer variable holding null
    Pointer = 2,
    /// Float holding NaN
    NotANumber = 999,
}

impl InitStatus {
    pub fn from_word(w: u16) -> Option<Self> {
        match w {
            0 => Some(InitStatus::Undefined),
            1 => Some(InitStatus::Declared),
            2 => Some(InitStatus::Pointer),
            999 => Some(InitStatus::NotANumber),
            _ => None,
        }
    }
}

/// Value payload of a variable
#[derive(Debug, Clone)]
pub enum Payload {
    Void,
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
    Pointer(Option<ObjRef>),
    Array(Vec<Variable>),
}

impl Payload {
    /// Zero value for a declared type
    pub fn default_for(ty: &TypeTag) -> Payload {
        match ty {
            TypeTag::Void => Payload::Void,
            TypeTag::Bool => Payload::Bool(false),
            TypeTag::Int => Payload::Int(0),
            TypeTag::Float => Payload::Float(0.0),
            TypeTag::String => Payload::Str(String::new()),
            TypeTag::Pointer(_) => Payload::Pointer(None),
            TypeTag::Array(_) => Payload::Array(Vec::new()),
        }
    }

    /// Equality with identity semantics for instances
    pub fn same_value(&self, other: &Payload) -> bool {
        match (self, other) {
            (Payload::Void, Payload::Void) => true,
            (Payload::Bool(a), Payload::Bool(b)) => a == b,
            (Payload::Int(a), Payload::Int(b)) => a == b,
            (Payload::Float(a), Payload::Float(b)) => a == b,
            (Payload::Int(a), Payload::Float(b)) | (Payload::Float(b), Payload::Int(a)) => {
                *a as f32 == *b
            }
            (Payload::Str(a), Payload::Str(b)) => a == b,
            (Payload::Pointer(a), Payload::Pointer(b)) => match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                _ => false,
            },
            (Payload::Array(a), Payload::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_value(y))
            }
            _ => false,
        }
    }
}

/// A named, typed value cell
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub ty: TypeTag,
    pub init: InitStatus,
    pub is_static: bool,
    pub visibility: Visibility,
    /// Identity used for re-lookup; declaring node id for locals, field index for members
    pub ident: i64,
    pub payload: Payload,
}

impl Variable {
    /// A declared but unassigned variable
    pub fn declared(name: impl Into<String>, ty: TypeTag) -> Self {
        let init = if ty.is_pointer() {
            InitStatus::Pointer
        } else {
            InitStatus::Undefined
        };
        Variable {
            name: name.into(),
            payload: Payload::default_for(&ty),
            ty,
            init,
            is_static: false,
            visibility: Visibility::Public,
            ident: 0,
        }
    }

    /// An anonymous temporary holding a value
    pub fn temp(ty: TypeTag, payload: Payload) -> Self {
        let mut var = Variable::declared("", ty);
        var.set_payload(payload);
        var
    }

    pub fn int(v: i32) -> Self {
        Variable::temp(TypeTag::Int, Payload::Int(v))
    }

    pub fn float(v: f32) -> Self {
        Variable::temp(TypeTag::Float, Payload::Float(v))
    }

    pub fn boolean(v: bool) -> Self {
        Variable::temp(TypeTag::Bool, Payload::Bool(v))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Variable::temp(TypeTag::String, Payload::Str(v.into()))
    }

    pub fn pointer(class: impl Into<String>, target: Option<ObjRef>) -> Self {
        Variable::temp(TypeTag::Pointer(class.into()), Payload::Pointer(target))
    }

    pub fn array(elem: TypeTag, items: Vec<Variable>) -> Self {
        Variable::temp(TypeTag::Array(Box::new(elem)), Payload::Array(items))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_ident(mut self, ident: i64) -> Self {
        self.ident = ident;
        self
    }

    /// Replaces the payload and recomputes the init status
    pub fn set_payload(&mut self, payload: Payload) {
        self.init = match &payload {
            Payload::Pointer(None) => InitStatus::Pointer,
            Payload::Float(v) if v.is_nan() => InitStatus::NotANumber,
            _ => InitStatus::Declared,
        };
        self.payload = payload;
    }

    pub fn is_initialized(&self) -> bool {
        self.init != InitStatus::Undefined
    }

    pub fn same_value(&self, other: &Variable) -> bool {
        self.payload.same_value(&other.payload)
    }

    pub fn as_int(&self) -> Option<i32> {
        match self.payload {
            Payload::Int(v) => Some(v),
            Payload::Float(v) => Some(v as i32),
            Payload::Bool(v) => Some(v as i32),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self.payload {
            Payload::Int(v) => Some(v as f32),
            Payload::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.payload {
            Payload::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&ObjRef> {
        match &self.payload {
            Payload::Pointer(Some(obj)) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Variable]> {
        match &self.payload {
            Payload::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Assigns `src` into this cell, converting between numeric types.
    /// The name, identity and flags of `self` are preserved.
    pub fn assign_from(&mut self, src: Variable) -> Result<(), ErrorKind> {
        let payload = convert(&self.ty, src)?;
        self.set_payload(payload);
        Ok(())
    }

    /// Builds a variable of type `ty` named `name` from a computed value
    pub fn coerce(name: impl Into<String>, ty: &TypeTag, src: Variable) -> Result<Self, ErrorKind> {
        let mut var = Variable::declared(name, ty.clone());
        var.assign_from(src)?;
        Ok(var)
    }

    /// Human-readable rendering used by `print` and the CLI
    pub fn display(&self) -> String {
        match &self.payload {
            Payload::Void => "void".to_string(),
            Payload::Bool(v) => v.to_string(),
            Payload::Int(v) => v.to_string(),
            Payload::Float(v) => v.to_string(),
            Payload::Str(s) => s.clone(),
            Payload::Pointer(None) => "null".to_string(),
            Payload::Pointer(Some(obj)) => {
                let obj = obj.borrow();
                format!("{}#{}", obj.class.name, obj.ident)
            }
            Payload::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.display()).collect();
                format!("[{}]", parts.join(", "))
            }
        }
    }
}

/// Converts a value to the representation of `ty`
fn convert(ty: &TypeTag, src: Variable) -> Result<Payload, ErrorKind> {
    if !src.is_initialized() {
        return Err(ErrorKind::NotInitialized(src.name));
    }
    let mismatch = |found: &TypeTag| ErrorKind::TypeMismatch {
        expected: ty.to_string(),
        found: found.to_string(),
    };
    let Variable { ty: src_ty, payload, .. } = src;
    match (ty, payload) {
        (TypeTag::Void, _) => Ok(Payload::Void),
        (TypeTag::Bool, Payload::Bool(v)) => Ok(Payload::Bool(v)),
        (TypeTag::Int, Payload::Int(v)) => Ok(Payload::Int(v)),
        (TypeTag::Int, Payload::Float(v)) => Ok(Payload::Int(v as i32)),
        (TypeTag::Float, Payload::Float(v)) => Ok(Payload::Float(v)),
        (TypeTag::Float, Payload::Int(v)) => Ok(Payload::Float(v as f32)),
        (TypeTag::String, Payload::Str(s)) => Ok(Payload::Str(s)),
        (TypeTag::String, payload) => Ok(Payload::Str(Variable::temp(src_ty, payload).display())),
        (TypeTag::Pointer(class), Payload::Pointer(target)) => match target {
            None => Ok(Payload::Pointer(None)),
            Some(obj) if obj.borrow().class.name == *class => Ok(Payload::Pointer(Some(obj))),
            Some(_) => Err(mismatch(&src_ty)),
        },
        (TypeTag::Array(elem), Payload::Array(items)) => {
            let mut converted = Vec::with_capacity(items.len());
            for item in items {
                converted.push(Variable::coerce("", elem, item)?);
            }
            Ok(Payload::Array(converted))
        }
        (_, _) => Err(mismatch(&src_ty)),
    }
}
