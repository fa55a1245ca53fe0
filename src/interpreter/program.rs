//! Loaded program
//!
//! `Program::new` numbers every function, statement and expression with a dense
//! `NodeId`, builds the class table and fingerprints the script so saved state
//! can only be restored against the program that produced it.

use super::types::{
    Accessor, AccessorKind, Class, Expr, ExprKind, FunctionDef, NodeId, Script, Span, Stmt,
    StmtKind,
};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct Program {
    script: Script,
    functions: HashMap<String, usize>,
    classes: Vec<Rc<Class>>,
    class_index: HashMap<String, usize>,
    spans: Vec<Span>,
    owners: Vec<usize>,
    fingerprint: [u8; 32],
}

impl Program {
    pub fn new(mut script: Script) -> Self {
        let bytes = serde_json::to_vec(&script).unwrap_or_default();
        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(&Sha256::digest(&bytes));

        let mut numbering = Numbering::default();
        for (index, func) in script.functions.iter_mut().enumerate() {
            numbering.owner = index;
            numbering.function(func);
        }

        let mut functions = HashMap::new();
        for (index, func) in script.functions.iter().enumerate() {
            functions.entry(func.name.clone()).or_insert(index);
        }

        let classes: Vec<Rc<Class>> = script.classes.iter().map(|c| Rc::new(Class::from_def(c))).collect();
        let class_index = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();

        Program {
            script,
            functions,
            classes,
            class_index,
            spans: numbering.spans,
            owners: numbering.owners,
            fingerprint,
        }
    }

    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        let script: Script = serde_json::from_str(source)?;
        Ok(Program::new(script))
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name).map(|&i| &self.script.functions[i])
    }

    pub fn class(&self, name: &str) -> Option<&Rc<Class>> {
        self.class_index.get(name).map(|&i| &self.classes[i])
    }

    /// Classes in declaration order
    pub fn classes(&self) -> &[Rc<Class>] {
        &self.classes
    }

    pub fn span_of(&self, id: NodeId) -> Span {
        self.spans.get(id as usize).copied().unwrap_or_default()
    }

    /// Name of the function a node belongs to
    pub fn function_of(&self, id: NodeId) -> Option<&str> {
        let owner = *self.owners.get(id as usize)?;
        self.script.functions.get(owner).map(|f| f.name.as_str())
    }

    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    pub fn node_count(&self) -> usize {
        self.spans.len()
    }
}

/* ===================== Numbering ===================== */

#[derive(Default)]
struct Numbering {
    spans: Vec<Span>,
    owners: Vec<usize>,
    owner: usize,
}

impl Numbering {
    fn next(&mut self, span: Span) -> NodeId {
        let id = self.spans.len() as NodeId;
        self.spans.push(span);
        self.owners.push(self.owner);
        id
    }

    fn function(&mut self, func: &mut FunctionDef) {
        func.id = self.next(func.span);
        self.stmt(&mut func.body);
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        stmt.id = self.next(stmt.span);
        match &mut stmt.kind {
            StmtKind::Block { body } => body.iter_mut().for_each(|s| self.stmt(s)),
            StmtKind::Let { init, .. } => {
                if let Some(e) = init {
                    self.expr(e);
                }
            }
            StmtKind::Expr { expr } => self.expr(expr),
            StmtKind::If { test, then_s, else_s } => {
                self.expr(test);
                self.stmt(then_s);
                if let Some(s) = else_s {
                    self.stmt(s);
                }
            }
            StmtKind::While { test, body, .. } => {
                self.expr(test);
                self.stmt(body);
            }
            StmtKind::For { init, test, update, body, .. } => {
                if let Some(s) = init {
                    self.stmt(s);
                }
                if let Some(e) = test {
                    self.expr(e);
                }
                if let Some(e) = update {
                    self.expr(e);
                }
                self.stmt(body);
            }
            StmtKind::Break { .. } | StmtKind::Continue { .. } => {}
            StmtKind::Return { value } => {
                if let Some(e) = value {
                    self.expr(e);
                }
            }
            StmtKind::Throw { code } => self.expr(code),
            StmtKind::Try { body, handler, .. } => {
                self.stmt(body);
                self.stmt(handler);
            }
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        expr.id = self.next(expr.span);
        match &mut expr.kind {
            ExprKind::Int { .. }
            | ExprKind::Float { .. }
            | ExprKind::Bool { .. }
            | ExprKind::Str { .. }
            | ExprKind::Null
            | ExprKind::New { .. } => {}
            ExprKind::Var { path, .. } => self.path(path),
            ExprKind::Assign { path, value, .. } => {
                self.expr(value);
                self.path(path);
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Cond { test, then_e, else_e } => {
                self.expr(test);
                self.expr(then_e);
                self.expr(else_e);
            }
            ExprKind::Call { args, .. } => args.iter_mut().for_each(|e| self.expr(e)),
            ExprKind::Array { items } => items.iter_mut().for_each(|e| self.expr(e)),
        }
    }

    fn path(&mut self, path: &mut [Accessor]) {
        for acc in path {
            if let AccessorKind::Index { index } = &mut acc.kind {
                self.expr(index);
            }
        }
    }
}
