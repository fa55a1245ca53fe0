//! Frame, variable and instance records
//!
//! Layout of one frame:
//!
//! ```text
//! word   marker        0 = no frame, 1 = frame, 2 = frame with a parallel branch
//! word   block kind
//! i32    state
//! word   step
//! vars   result        (at most one)
//! vars   locals
//! chain  parallel      (only when marker = 2)
//! chain  continuation
//! ```
//!
//! A variable list is a run of variables closed by a `0` word. Every variable
//! starts with `100 + visibility`, so the closing word can never be mistaken
//! for a header.
//!
//! A pointer value only names its target (identity and class). The bodies of
//! all referenced instances follow the statics in one flat section, each
//! written once, so long chains and cycles cost no nesting:
//!
//! ```text
//! word   1             one record per instance, closed by a 0 word
//! i64    identity
//! string class
//! word   has user handle, then i64 handle
//! word   deleted
//! vars   fields
//! ```

use super::codec::{Decoder, Encoder};
use crate::interpreter::errors::PersistError;
use crate::interpreter::program::Program;
use crate::interpreter::stack::{BlockKind, ExecStack, FrameId};
use crate::interpreter::types::{
    next_ident, InitStatus, Instance, ObjRef, Payload, Registry, TypeTag, Variable, Visibility,
};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::{Read, Write};
use std::rc::Rc;
use tracing::warn;

/// Nesting limit for array types and values, applied on both sides
const MAX_NESTING: usize = 64;

const VAR_HEADER_BASE: u16 = 100;

mod tag {
    pub const VOID: u16 = 0;
    pub const BOOL: u16 = 1;
    pub const INT: u16 = 2;
    pub const FLOAT: u16 = 3;
    pub const STRING: u16 = 4;
    pub const POINTER: u16 = 5;
    pub const ARRAY: u16 = 6;
}

mod instance {
    pub const NULL: u16 = 0;
    pub const REF: u16 = 1;
}

/* ===================== Saving ===================== */

pub struct Saver<W: Write> {
    pub enc: Encoder<W>,
    /// Identities already referenced in this save
    queued: HashSet<i64>,
    /// Referenced instances whose bodies are still to be written
    pending: VecDeque<ObjRef>,
}

impl<W: Write> Saver<W> {
    pub fn new(out: W) -> Self {
        Saver {
            enc: Encoder::new(out),
            queued: HashSet::new(),
            pending: VecDeque::new(),
        }
    }

    /// Writes the chain starting at `id`, depth first
    pub fn frame_chain(&mut self, stack: &ExecStack, id: Option<FrameId>) -> Result<(), PersistError> {
        let Some(id) = id else {
            return self.enc.word(0);
        };
        let frame = &stack[id];
        self.enc.word(if frame.parallel.is_some() { 2 } else { 1 })?;
        self.enc.word(frame.kind as u16)?;
        self.enc.int(frame.state)?;
        self.enc.word(frame.step)?;
        self.var_list(frame.result.iter())?;
        self.var_list(frame.locals.iter())?;
        if frame.parallel.is_some() {
            self.frame_chain(stack, frame.parallel)?;
        }
        self.frame_chain(stack, frame.continuation)
    }

    pub fn var_list<'v>(&mut self, vars: impl Iterator<Item = &'v Variable>) -> Result<(), PersistError> {
        self.vars(vars, 0)
    }

    /// Writes the body of every instance referenced so far, including the
    /// ones those bodies reference in turn
    pub fn instances(&mut self) -> Result<(), PersistError> {
        while let Some(obj) = self.pending.pop_front() {
            let inst = obj.borrow();
            self.enc.word(1)?;
            self.enc.long(inst.ident)?;
            self.enc.string(&inst.class.name)?;
            match inst.user {
                Some(user) => {
                    self.enc.word(1)?;
                    self.enc.long(user as i64)?;
                }
                None => self.enc.word(0)?,
            }
            self.enc.word(inst.deleted as u16)?;
            self.vars(inst.fields.iter(), 0)?;
        }
        self.enc.word(0)
    }

    fn vars<'v>(&mut self, vars: impl Iterator<Item = &'v Variable>, depth: usize) -> Result<(), PersistError> {
        if depth > MAX_NESTING {
            return Err(PersistError::TooDeep);
        }
        for var in vars {
            self.variable(var, depth)?;
        }
        self.enc.word(0)
    }

    fn variable(&mut self, var: &Variable, depth: usize) -> Result<(), PersistError> {
        self.enc.word(VAR_HEADER_BASE + var.visibility as u16)?;
        self.enc.word(var.is_static as u16)?;
        self.type_tag(&var.ty, 0)?;
        self.enc.word(var.init as u16)?;
        self.enc.string(&var.name)?;
        self.enc.long(var.ident)?;
        self.payload(&var.payload, depth)
    }

    fn type_tag(&mut self, ty: &TypeTag, depth: usize) -> Result<(), PersistError> {
        if depth > MAX_NESTING {
            return Err(PersistError::TooDeep);
        }
        match ty {
            TypeTag::Void => self.enc.word(tag::VOID),
            TypeTag::Bool => self.enc.word(tag::BOOL),
            TypeTag::Int => self.enc.word(tag::INT),
            TypeTag::Float => self.enc.word(tag::FLOAT),
            TypeTag::String => self.enc.word(tag::STRING),
            TypeTag::Pointer(class) => {
                self.enc.word(tag::POINTER)?;
                self.enc.string(class)
            }
            TypeTag::Array(elem) => {
                self.enc.word(tag::ARRAY)?;
                self.type_tag(elem, depth + 1)
            }
        }
    }

    fn payload(&mut self, payload: &Payload, depth: usize) -> Result<(), PersistError> {
        match payload {
            Payload::Void => self.enc.word(tag::VOID),
            Payload::Bool(v) => {
                self.enc.word(tag::BOOL)?;
                self.enc.word(*v as u16)
            }
            Payload::Int(v) => {
                self.enc.word(tag::INT)?;
                self.enc.int(*v)
            }
            Payload::Float(v) => {
                self.enc.word(tag::FLOAT)?;
                self.enc.float(*v)
            }
            Payload::Str(s) => {
                self.enc.word(tag::STRING)?;
                self.enc.string(s)
            }
            Payload::Pointer(target) => {
                self.enc.word(tag::POINTER)?;
                self.reference(target.as_ref())
            }
            Payload::Array(items) => {
                self.enc.word(tag::ARRAY)?;
                self.vars(items.iter(), depth + 1)
            }
        }
    }

    fn reference(&mut self, target: Option<&ObjRef>) -> Result<(), PersistError> {
        let Some(obj) = target else {
            return self.enc.word(instance::NULL);
        };
        let ident = {
            let inst = obj.borrow();
            self.enc.word(instance::REF)?;
            self.enc.long(inst.ident)?;
            self.enc.string(&inst.class.name)?;
            inst.ident
        };
        if self.queued.insert(ident) {
            self.pending.push_back(Rc::clone(obj));
        }
        Ok(())
    }
}

/* ===================== Loading ===================== */

#[derive(Debug, Clone, Copy)]
enum Link {
    Continuation,
    Parallel,
}

pub struct Loader<'p, R: Read> {
    pub dec: Decoder<R>,
    program: &'p Program,
    registry: &'p Registry,
    /// Instances met so far in this load, by saved identity
    seen: HashMap<i64, ObjRef>,
    /// Saved identities rebuilt here whose bodies have not been read yet
    unfilled: HashSet<i64>,
    /// Saved identities that converged onto a resident instance
    resident: HashSet<i64>,
    /// Instances rebuilt by this load, registered once it succeeds
    pub created: Vec<ObjRef>,
}

impl<'p, R: Read> Loader<'p, R> {
    pub fn new(input: R, program: &'p Program, registry: &'p Registry) -> Self {
        Loader {
            dec: Decoder::new(input),
            program,
            registry,
            seen: HashMap::new(),
            unfilled: HashSet::new(),
            resident: HashSet::new(),
            created: Vec::new(),
        }
    }

    /// Reads the root chain into `stack`, which is reset first
    pub fn root_chain(&mut self, stack: &mut ExecStack) -> Result<FrameId, PersistError> {
        self.frame_chain(stack, None)?
            .ok_or_else(|| PersistError::corrupt("missing root frame"))
    }

    fn frame_chain(
        &mut self,
        stack: &mut ExecStack,
        parent: Option<(FrameId, Link)>,
    ) -> Result<Option<FrameId>, PersistError> {
        let marker = self.dec.word()?;
        if marker == 0 {
            return Ok(None);
        }
        if marker > 2 {
            return Err(PersistError::corrupt(format!("bad frame marker {}", marker)));
        }
        if stack.live() > stack.capacity() + stack.guard_slots() {
            return Err(PersistError::corrupt("frame chain deeper than the stack"));
        }
        let kind_word = self.dec.word()?;
        let kind = BlockKind::from_word(kind_word)
            .ok_or_else(|| PersistError::corrupt(format!("bad block kind {}", kind_word)))?;
        let id = match parent {
            None => {
                let root = stack.allocate();
                stack[root].kind = kind;
                root
            }
            Some((p, Link::Continuation)) => stack.push(p, None, kind),
            Some((p, Link::Parallel)) => stack.push_parallel(p, kind),
        };
        stack[id].state = self.dec.int()?;
        stack[id].step = self.dec.word()?;

        let mut result = self.var_list(0)?;
        if result.len() > 1 {
            return Err(PersistError::corrupt("frame holds more than one result"));
        }
        stack[id].result = result.pop();
        stack[id].locals = self.var_list(0)?;

        if marker == 2 {
            self.frame_chain(stack, Some((id, Link::Parallel)))?;
        }
        self.frame_chain(stack, Some((id, Link::Continuation)))?;
        Ok(Some(id))
    }

    pub fn var_list(&mut self, depth: usize) -> Result<Vec<Variable>, PersistError> {
        if depth > MAX_NESTING {
            return Err(PersistError::corrupt("values nested too deeply"));
        }
        let mut vars = Vec::new();
        loop {
            let header = self.dec.word()?;
            if header == 0 {
                return Ok(vars);
            }
            vars.push(self.variable(header, depth)?);
        }
    }

    /// Reads the instance section and fills every instance referenced earlier
    pub fn instances(&mut self) -> Result<(), PersistError> {
        loop {
            match self.dec.word()? {
                0 => break,
                1 => {}
                other => return Err(PersistError::corrupt(format!("bad instance marker {}", other))),
            }
            let ident = self.dec.long()?;
            let class_name = self.dec.string()?;
            let obj = self
                .seen
                .get(&ident)
                .cloned()
                .ok_or_else(|| PersistError::corrupt(format!("body for unreferenced instance {}", ident)))?;
            if obj.borrow().class.name != class_name {
                return Err(PersistError::corrupt(format!("instance {} saved with two classes", ident)));
            }
            let user = match self.dec.word()? {
                0 => None,
                _ => Some(self.dec.long()? as u64),
            };
            let deleted = self.dec.word()? != 0;
            let fields = self.var_list(0)?;

            if self.unfilled.remove(&ident) {
                {
                    let mut inst = obj.borrow_mut();
                    inst.user = user;
                    inst.deleted = deleted;
                    inst.fields = fields;
                }
                self.created.push(obj);
            } else if !self.resident.contains(&ident) {
                return Err(PersistError::corrupt(format!("instance {} saved twice", ident)));
            }
        }
        if !self.unfilled.is_empty() {
            return Err(PersistError::corrupt(format!(
                "{} referenced instances have no saved body",
                self.unfilled.len()
            )));
        }
        Ok(())
    }

    fn variable(&mut self, header: u16, depth: usize) -> Result<Variable, PersistError> {
        let visibility = header
            .checked_sub(VAR_HEADER_BASE)
            .and_then(Visibility::from_word)
            .ok_or_else(|| PersistError::corrupt(format!("bad variable header {}", header)))?;
        let is_static = match self.dec.word()? {
            0 => false,
            1 => true,
            w => return Err(PersistError::corrupt(format!("bad static flag {}", w))),
        };
        let ty = self.type_tag(0)?;
        let init_word = self.dec.word()?;
        let init = InitStatus::from_word(init_word)
            .ok_or_else(|| PersistError::corrupt(format!("bad init status {}", init_word)))?;
        let name = self.dec.string()?;
        let ident = self.dec.long()?;
        let payload = self.payload(depth)?;
        Ok(Variable {
            name,
            ty,
            init,
            is_static,
            visibility,
            ident,
            payload,
        })
    }

    fn type_tag(&mut self, depth: usize) -> Result<TypeTag, PersistError> {
        if depth > MAX_NESTING {
            return Err(PersistError::corrupt("type nested too deeply"));
        }
        Ok(match self.dec.word()? {
            tag::VOID => TypeTag::Void,
            tag::BOOL => TypeTag::Bool,
            tag::INT => TypeTag::Int,
            tag::FLOAT => TypeTag::Float,
            tag::STRING => TypeTag::String,
            tag::POINTER => TypeTag::Pointer(self.dec.string()?),
            tag::ARRAY => TypeTag::Array(Box::new(self.type_tag(depth + 1)?)),
            other => return Err(PersistError::corrupt(format!("unknown type code {}", other))),
        })
    }

    fn payload(&mut self, depth: usize) -> Result<Payload, PersistError> {
        Ok(match self.dec.word()? {
            tag::VOID => Payload::Void,
            tag::BOOL => Payload::Bool(self.dec.word()? != 0),
            tag::INT => Payload::Int(self.dec.int()?),
            tag::FLOAT => Payload::Float(self.dec.float()?),
            tag::STRING => Payload::Str(self.dec.string()?),
            tag::POINTER => Payload::Pointer(self.reference()?),
            tag::ARRAY => Payload::Array(self.var_list(depth + 1)?),
            other => return Err(PersistError::corrupt(format!("unknown value code {}", other))),
        })
    }

    /// Resolves a pointer record. A resident instance with the same identity
    /// and class wins; one of another class keeps its identity and the saved
    /// instance is rebuilt under a fresh one.
    fn reference(&mut self) -> Result<Option<ObjRef>, PersistError> {
        match self.dec.word()? {
            instance::NULL => Ok(None),
            instance::REF => {
                let ident = self.dec.long()?;
                let class_name = self.dec.string()?;
                if let Some(obj) = self.seen.get(&ident) {
                    if obj.borrow().class.name != class_name {
                        return Err(PersistError::corrupt(format!("instance {} saved with two classes", ident)));
                    }
                    return Ok(Some(Rc::clone(obj)));
                }
                let class = self
                    .program
                    .class(&class_name)
                    .cloned()
                    .ok_or_else(|| PersistError::corrupt(format!("unknown class {}", class_name)))?;

                let obj = match self.registry.find(ident) {
                    Some(found) if found.borrow().class.name == class_name => {
                        warn!(ident, class = %class_name, "saved instance already resident, keeping resident copy");
                        self.resident.insert(ident);
                        found
                    }
                    taken => {
                        let new_ident = match taken {
                            Some(other) => {
                                let fresh = next_ident();
                                warn!(
                                    ident,
                                    saved = %class_name,
                                    resident = %other.borrow().class.name,
                                    fresh,
                                    "identity held by an instance of another class, renumbering"
                                );
                                fresh
                            }
                            None => ident,
                        };
                        self.unfilled.insert(ident);
                        Rc::new(RefCell::new(Instance {
                            class,
                            ident: new_ident,
                            deleted: false,
                            user: None,
                            fields: Vec::new(),
                        }))
                    }
                };
                self.seen.insert(ident, Rc::clone(&obj));
                Ok(Some(obj))
            }
            other => Err(PersistError::corrupt(format!("bad instance record {}", other))),
        }
    }
}
