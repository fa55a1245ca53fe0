//! Abstract Syntax Tree node types
//!
//! Nodes are deserialized from JSON. Every statement and expression carries a
//! source span and a `NodeId` that `Program::new` assigns after loading; frames
//! refer to nodes through that id.

use super::values::{TypeTag, Visibility};
use serde::{Deserialize, Serialize};

/// Dense identifier of a statement, expression or function inside a `Program`
pub type NodeId = u32;

/// Source position of the token a node was built from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Span { start, end }
    }
}

/* ===================== Program ===================== */

/// A complete script: class layouts plus function definitions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub classes: Vec<ClassDef>,
    pub functions: Vec<FunctionDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeTag,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub ty: TypeTag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    #[serde(skip)]
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    #[serde(default)]
    pub returns: TypeTag,
    pub body: Stmt,
    #[serde(default)]
    pub span: Span,
}

/* ===================== Statements ===================== */

/// Statement AST node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(skip)]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    #[serde(flatten)]
    pub kind: StmtKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum StmtKind {
    Block {
        body: Vec<Stmt>,
    },
    Let {
        name: String,
        ty: TypeTag,
        init: Option<Expr>,
    },
    Expr {
        expr: Expr,
    },
    If {
        test: Expr,
        then_s: Box<Stmt>,
        else_s: Option<Box<Stmt>>,
    },
    While {
        label: Option<String>,
        test: Expr,
        body: Box<Stmt>,
    },
    For {
        label: Option<String>,
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
    },
    Break {
        label: Option<String>,
    },
    Continue {
        label: Option<String>,
    },
    Return {
        value: Option<Expr>,
    },
    Throw {
        code: Expr,
    },
    Try {
        body: Box<Stmt>,
        catch_var: Option<String>,
        handler: Box<Stmt>,
    },
}

/* ===================== Expressions ===================== */

/// Expression AST node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    #[serde(skip)]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    #[serde(flatten)]
    pub kind: ExprKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum ExprKind {
    Int {
        v: i32,
    },
    Float {
        v: f32,
    },
    Bool {
        v: bool,
    },
    Str {
        v: String,
    },
    Null,
    Var {
        name: String,
        #[serde(default)]
        path: Vec<Accessor>,
    },
    Assign {
        name: String,
        #[serde(default)]
        path: Vec<Accessor>,
        #[serde(default)]
        op: AssignOp,
        value: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Cond {
        test: Box<Expr>,
        then_e: Box<Expr>,
        else_e: Box<Expr>,
    },
    Call {
        name: String,
        #[serde(default)]
        args: Vec<Expr>,
    },
    New {
        class: String,
    },
    Array {
        #[serde(default)]
        items: Vec<Expr>,
    },
}

/// One step of a member/element access chain such as `.b` or `[i]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accessor {
    #[serde(default)]
    pub span: Span,
    #[serde(flatten)]
    pub kind: AccessorKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum AccessorKind {
    Field { name: String },
    Index { index: Expr },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    #[default]
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// The binary operator a compound assignment applies, if any
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Set => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
        }
    }
}
