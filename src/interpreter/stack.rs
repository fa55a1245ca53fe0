//! Execution stack
//!
//! Frames live in an arena indexed by `FrameId`. Each frame links to at most one
//! `continuation` (the nested evaluation it is waiting on) and one `parallel`
//! frame (an alternate path such as a catch handler). Links are memoized: a node
//! re-entered after a suspension gets back the frame it allocated before, with
//! its state counter and partial results intact.
//!
//! The stack also owns the cooperative step timer. Every state change spends one
//! tick; once the timer runs down the evaluation yields.

use super::types::{NodeId, Variable};
use std::ops::{Index, IndexMut};
use tracing::{trace, warn};

/* ===================== Frames ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u32);

impl FrameId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a frame stands for, which decides declaration and lookup behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum BlockKind {
    /// Transient frame of a single statement or expression; never owns declarations
    Instruction = 0,
    /// Scope-owning block
    Block = 1,
    /// Body of a called function; name lookup does not cross it
    FunctionBody = 2,
    /// Host function in progress
    ExternalCall = 3,
}

impl BlockKind {
    pub fn from_word(w: u16) -> Option<Self> {
        match w {
            0 => Some(BlockKind::Instruction),
            1 => Some(BlockKind::Block),
            2 => Some(BlockKind::FunctionBody),
            3 => Some(BlockKind::ExternalCall),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    /// Node currently evaluated in this frame
    pub instr: Option<NodeId>,
    /// Resumption point, meaningful only to the owning node
    pub state: i32,
    pub kind: BlockKind,
    /// Single-step pause counter
    pub step: u16,
    pub result: Option<Variable>,
    pub locals: Vec<Variable>,
    pub parent: Option<FrameId>,
    pub continuation: Option<FrameId>,
    pub parallel: Option<FrameId>,
    /// Allocated past the configured capacity
    pub guard: bool,
    live: bool,
}

impl Frame {
    fn new(parent: Option<FrameId>, instr: Option<NodeId>, kind: BlockKind, guard: bool) -> Self {
        Frame {
            instr,
            state: 0,
            kind,
            step: 0,
            result: None,
            locals: Vec::new(),
            parent,
            continuation: None,
            parallel: None,
            guard,
            live: true,
        }
    }

    pub fn take_result(&mut self) -> Option<Variable> {
        self.result.take()
    }
}

/* ===================== Stack ===================== */

#[derive(Debug)]
pub struct ExecStack {
    frames: Vec<Frame>,
    free: Vec<FrameId>,
    live: usize,
    capacity: usize,
    guard_slots: usize,
    root: Option<FrameId>,
    /// A frame was claimed past the guard region and nobody has reacted yet
    exhausted: bool,
    timer: i32,
    budget: i32,
}

impl ExecStack {
    pub fn new(capacity: usize, guard_slots: usize, budget: i32) -> Self {
        ExecStack {
            frames: Vec::new(),
            free: Vec::new(),
            live: 0,
            capacity,
            guard_slots,
            root: None,
            exhausted: false,
            timer: budget,
            budget,
        }
    }

    /// Empty stack with the same settings
    pub fn fresh(&self) -> Self {
        ExecStack::new(self.capacity, self.guard_slots, self.budget)
    }

    /// Resets the arena and installs the root frame
    pub fn allocate(&mut self) -> FrameId {
        self.frames.clear();
        self.free.clear();
        self.live = 0;
        self.exhausted = false;
        let root = self.claim(None, None, BlockKind::Block);
        self.root = Some(root);
        self.reset_timer();
        root
    }

    pub fn root(&self) -> Option<FrameId> {
        self.root
    }

    /// Number of frames currently allocated
    pub fn live(&self) -> usize {
        self.live
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn guard_slots(&self) -> usize {
        self.guard_slots
    }

    fn claim(&mut self, parent: Option<FrameId>, instr: Option<NodeId>, kind: BlockKind) -> FrameId {
        let guard = self.live >= self.capacity;
        if guard {
            warn!(live = self.live, capacity = self.capacity, "frame allocated in guard region");
        }
        let frame = Frame::new(parent, instr, kind, guard);
        self.live += 1;
        if self.live > self.capacity + self.guard_slots {
            self.exhausted = true;
        }
        match self.free.pop() {
            Some(id) => {
                self.frames[id.index()] = frame;
                id
            }
            None => {
                let id = FrameId(self.frames.len() as u32);
                self.frames.push(frame);
                id
            }
        }
    }

    /// Continuation frame of `parent`, allocated on first use
    pub fn push(&mut self, parent: FrameId, instr: Option<NodeId>, kind: BlockKind) -> FrameId {
        if let Some(existing) = self[parent].continuation {
            return existing;
        }
        let id = self.claim(Some(parent), instr, kind);
        trace!(parent = parent.0, frame = id.0, ?kind, "push");
        self[parent].continuation = Some(id);
        id
    }

    /// Parallel frame of `parent`, allocated on first use
    pub fn push_parallel(&mut self, parent: FrameId, kind: BlockKind) -> FrameId {
        if let Some(existing) = self[parent].parallel {
            return existing;
        }
        let instr = self[parent].instr;
        let id = self.claim(Some(parent), instr, kind);
        trace!(parent = parent.0, frame = id.0, ?kind, "push parallel");
        self[parent].parallel = Some(id);
        id
    }

    /// Moves the result of `child` into `parent` and frees everything hanging off `parent`
    pub fn unwind(&mut self, parent: FrameId, child: FrameId) {
        if parent == child {
            return;
        }
        self.unwind_keep(parent, child);
        self.release_children(parent);
    }

    /// Moves the result of `child` into `parent`, keeping the child chain
    pub fn unwind_keep(&mut self, parent: FrameId, child: FrameId) {
        if parent == child {
            return;
        }
        let result = self[child].result.take();
        self[parent].result = result;
    }

    /// Frees both chains hanging off `id`
    pub fn release_children(&mut self, id: FrameId) {
        self.release_continuation(id);
        if let Some(p) = self[id].parallel.take() {
            self.release(p);
        }
    }

    /// Frees the continuation chain of `id`, keeping `id` itself
    pub fn release_continuation(&mut self, id: FrameId) {
        if let Some(c) = self[id].continuation.take() {
            self.release(c);
        }
    }

    /// Frees `id` and everything reachable from it
    pub fn release(&mut self, id: FrameId) {
        if let Some(parent) = self[id].parent {
            let p = &mut self[parent];
            if p.continuation == Some(id) {
                p.continuation = None;
            }
            if p.parallel == Some(id) {
                p.parallel = None;
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
        let mut pending = vec![id];
        while let Some(cur) = pending.pop() {
            let frame = &mut self.frames[cur.index()];
            if !frame.live {
                continue;
            }
            frame.live = false;
            frame.locals.clear();
            frame.result = None;
            pending.extend(frame.continuation.take());
            pending.extend(frame.parallel.take());
            self.free.push(cur);
            self.live -= 1;
        }
    }

    /// Re-attaches the instruction of an existing continuation after a reload
    pub fn restore_for_resume(&mut self, parent: FrameId, instr: NodeId) -> Option<FrameId> {
        let child = self[parent].continuation?;
        self[child].instr = Some(instr);
        Some(child)
    }

    /// Same for the parallel link
    pub fn restore_parallel(&mut self, parent: FrameId, instr: NodeId) -> Option<FrameId> {
        let child = self[parent].parallel?;
        self[child].instr = Some(instr);
        Some(child)
    }

    pub fn is_overflowed(&self, id: FrameId) -> bool {
        self[id].guard
    }

    /// Reports, once, that a frame was claimed past the guard region
    pub fn take_exhausted(&mut self) -> bool {
        std::mem::take(&mut self.exhausted)
    }

    /* ===================== Timer ===================== */

    pub fn set_budget(&mut self, budget: i32) {
        self.budget = budget;
        self.timer = budget;
    }

    pub fn budget(&self) -> i32 {
        self.budget
    }

    pub fn reset_timer(&mut self) {
        self.timer = self.budget;
    }

    pub fn timer(&self) -> i32 {
        self.timer
    }

    /// Sets the state of `id` and spends one tick. False means yield now.
    pub fn advance_state(&mut self, id: FrameId, next: i32, limit: i32) -> bool {
        self[id].state = next;
        self.timer -= 1;
        self.timer > limit
    }

    /// Bumps the state of `id` and spends one tick. False means yield now.
    pub fn increment_state(&mut self, id: FrameId, limit: i32) -> bool {
        let next = self[id].state + 1;
        self.advance_state(id, next, limit)
    }

    /// In single-step mode, true the first time a frame is entered
    pub fn if_step(&mut self, id: FrameId, single_step: bool) -> bool {
        if !single_step {
            return false;
        }
        let frame = &mut self[id];
        if frame.step > 0 {
            return false;
        }
        frame.step += 1;
        true
    }

    /* ===================== Scopes ===================== */

    /// Nearest frame at or above `from` that owns declarations
    pub fn scope_owner(&self, from: FrameId) -> FrameId {
        let mut cur = from;
        while self[cur].kind == BlockKind::Instruction {
            match self[cur].parent {
                Some(p) => cur = p,
                None => break,
            }
        }
        cur
    }

    /// Adds `var` to the nearest scope-owning frame. A variable with the same
    /// name and identity, left by an earlier pass over the same declaration,
    /// is replaced.
    pub fn declare(&mut self, from: FrameId, var: Variable) -> (FrameId, usize) {
        let owner = self.scope_owner(from);
        let locals = &mut self[owner].locals;
        if let Some(slot) = locals.iter().position(|v| v.name == var.name && v.ident == var.ident) {
            locals[slot] = var;
            return (owner, slot);
        }
        locals.push(var);
        (owner, locals.len() - 1)
    }

    /// Finds a variable by name, innermost first. The search jumps from a
    /// function body straight to the root frame.
    pub fn lookup(&self, from: FrameId, name: &str) -> Option<(FrameId, usize)> {
        self.find_with(from, |v| v.name == name)
    }

    /// Finds a variable by identity
    pub fn lookup_ident(&self, from: FrameId, ident: i64) -> Option<(FrameId, usize)> {
        self.find_with(from, |v| !v.name.is_empty() && v.ident == ident)
    }

    fn find_with(&self, from: FrameId, pred: impl Fn(&Variable) -> bool) -> Option<(FrameId, usize)> {
        let mut cur = Some(from);
        while let Some(id) = cur {
            let frame = &self[id];
            if let Some(slot) = frame.locals.iter().position(&pred) {
                return Some((id, slot));
            }
            cur = if frame.kind == BlockKind::FunctionBody {
                self.root.filter(|r| *r != id)
            } else {
                frame.parent
            };
        }
        None
    }

    pub fn set_result(&mut self, id: FrameId, value: Option<Variable>) {
        self[id].result = value;
    }

    /* ===================== Walking ===================== */

    /// Frames from `from` down to the innermost active one. A frame without a
    /// continuation continues through its parallel branch.
    pub fn active_chain(&self, from: FrameId) -> Vec<FrameId> {
        let mut chain = vec![from];
        let mut cur = from;
        while let Some(next) = self[cur].continuation.or(self[cur].parallel) {
            chain.push(next);
            cur = next;
        }
        chain
    }
}

impl Index<FrameId> for ExecStack {
    type Output = Frame;

    fn index(&self, id: FrameId) -> &Frame {
        &self.frames[id.index()]
    }
}

impl IndexMut<FrameId> for ExecStack {
    fn index_mut(&mut self, id: FrameId) -> &mut Frame {
        &mut self.frames[id.index()]
    }
}
