//! Saving and restoring execution state
//!
//! ```text
//! bytes[4]   magic "STPW"
//! word       format version
//! bytes[32]  program fingerprint
//! string     entry function ("" when idle)
//! chain      root frame and everything hanging off it
//! word       number of classes, then per class: name, static members
//! section    bodies of every instance referenced above
//! ```
//!
//! Loading builds a complete new stack before anything is committed, so a
//! corrupt or truncated stream leaves the running execution untouched.

pub mod codec;
pub mod records;

use super::errors::PersistError;
use super::program::Program;
use super::stack::ExecStack;
use super::types::{Class, ObjRef, Registry, Variable};
use records::{Loader, Saver};
use std::io::{Read, Write};
use std::rc::Rc;

pub const MAGIC: &[u8; 4] = b"STPW";
pub const FORMAT_VERSION: u16 = 2;

/// Writes the header, the frame chain and the class statics
pub fn save_state<W: Write>(
    out: W,
    program: &Program,
    stack: &ExecStack,
    entry: Option<&str>,
) -> Result<(), PersistError> {
    let mut saver = Saver::new(out);
    saver.enc.bytes(MAGIC)?;
    saver.enc.word(FORMAT_VERSION)?;
    saver.enc.bytes(program.fingerprint())?;
    saver.enc.string(entry.unwrap_or(""))?;

    saver.frame_chain(stack, stack.root())?;

    let classes = program.classes();
    let count = u16::try_from(classes.len()).map_err(|_| PersistError::corrupt("too many classes"))?;
    saver.enc.word(count)?;
    for class in classes {
        saver.enc.string(&class.name)?;
        saver.var_list(class.statics.borrow().iter())?;
    }
    saver.instances()?;
    saver.enc.flush()
}

/// State read back from a stream, not yet applied
pub struct LoadedState {
    pub stack: ExecStack,
    pub entry: Option<String>,
    pub statics: Vec<(Rc<Class>, Vec<Variable>)>,
    /// Instances the stream introduced; resident ones were reused instead
    pub created: Vec<ObjRef>,
}

/// Reads a stream produced by `save_state`. `template` supplies the stack settings.
pub fn load_state<R: Read>(
    input: R,
    program: &Program,
    registry: &Registry,
    template: &ExecStack,
) -> Result<LoadedState, PersistError> {
    let mut loader = Loader::new(input, program, registry);

    let mut magic = [0u8; 4];
    loader.dec.fill(&mut magic)?;
    if &magic != MAGIC {
        return Err(PersistError::corrupt("bad magic"));
    }
    let version = loader.dec.word()?;
    if version != FORMAT_VERSION {
        return Err(PersistError::corrupt(format!("unsupported format version {}", version)));
    }
    let mut fingerprint = [0u8; 32];
    loader.dec.fill(&mut fingerprint)?;
    if &fingerprint != program.fingerprint() {
        return Err(PersistError::ProgramMismatch);
    }
    let entry = loader.dec.string()?;
    let entry = if entry.is_empty() { None } else { Some(entry) };
    if let Some(name) = &entry {
        if program.function(name).is_none() {
            return Err(PersistError::corrupt(format!("unknown entry function {}", name)));
        }
    }

    let mut stack = template.fresh();
    let root = loader.root_chain(&mut stack)?;
    if entry.is_some() && stack[root].continuation.is_none() {
        return Err(PersistError::corrupt("running state without a call frame"));
    }

    let count = loader.dec.word()?;
    let mut statics = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = loader.dec.string()?;
        let class = program
            .class(&name)
            .cloned()
            .ok_or_else(|| PersistError::corrupt(format!("unknown class {}", name)))?;
        let vars = loader.var_list(0)?;
        statics.push((class, vars));
    }
    loader.instances()?;

    Ok(LoadedState {
        stack,
        entry,
        statics,
        created: loader.created,
    })
}
