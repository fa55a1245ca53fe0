//! Object model: class layouts, shared instances and the identity registry

use super::ast::{ClassDef, FieldDef};
use super::values::Variable;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicI64, Ordering};

/// Shared handle to a live instance
pub type ObjRef = Rc<RefCell<Instance>>;

/* ===================== Classes ===================== */

/// Layout of a class. Static members are stored once, here.
#[derive(Debug)]
pub struct Class {
    pub name: String,
    /// Instance members, in declaration order. A member's numeric id is its index.
    pub fields: Vec<FieldDef>,
    pub statics: RefCell<Vec<Variable>>,
}

impl Class {
    pub fn from_def(def: &ClassDef) -> Self {
        let fields = def.fields.iter().filter(|f| !f.is_static).cloned().collect();
        let statics = def
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_static)
            .map(|(i, f)| {
                let mut var = Variable::declared(&f.name, f.ty.clone()).with_ident(i as i64);
                var.is_static = true;
                var.visibility = f.visibility;
                var
            })
            .collect();
        Class {
            name: def.name.clone(),
            fields,
            statics: RefCell::new(statics),
        }
    }

    /// Numeric id of an instance member
    pub fn field_id(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Slot of a static member
    pub fn static_slot(&self, name: &str) -> Option<usize> {
        self.statics.borrow().iter().position(|v| v.name == name)
    }

    /// Fresh member variables for a new instance
    pub fn fresh_fields(&self) -> Vec<Variable> {
        self.fields
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let mut var = Variable::declared(&f.name, f.ty.clone()).with_ident(i as i64);
                var.visibility = f.visibility;
                var
            })
            .collect()
    }
}

/* ===================== Instances ===================== */

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    /// Stable identity, preserved across save/load
    pub ident: i64,
    /// Set by the host when the backing object is destroyed; distinct from null
    pub deleted: bool,
    /// Opaque host handle
    pub user: Option<u64>,
    pub fields: Vec<Variable>,
}

impl Instance {
    /// Member by name
    pub fn member(&self, name: &str) -> Option<&Variable> {
        self.fields.iter().find(|v| v.name == name)
    }

    /// Member by numeric id
    pub fn member_by_id(&self, id: i64) -> Option<&Variable> {
        self.fields.iter().find(|v| v.ident == id)
    }

    pub fn member_slot(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|v| v.name == name)
    }
}

/// Hook letting the embedding application refresh an instance before it is read
pub trait ObjectHost {
    fn refresh(&self, _instance: &mut Instance) {}
}

/// Host that never touches instances
#[derive(Debug, Default)]
pub struct NoHost;

impl ObjectHost for NoHost {}

/* ===================== Registry ===================== */

/// Identities are unique across every execution in the process
static NEXT_IDENT: AtomicI64 = AtomicI64::new(1);

/// Allocates a process-wide unique instance identity
pub fn next_ident() -> i64 {
    NEXT_IDENT.fetch_add(1, Ordering::Relaxed)
}

/// Identity to instance map of one execution
#[derive(Debug, Default)]
pub struct Registry {
    live: HashMap<i64, Weak<RefCell<Instance>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Resident instance with the given identity, if still alive
    pub fn find(&self, ident: i64) -> Option<ObjRef> {
        self.live.get(&ident).and_then(Weak::upgrade)
    }

    /// Creates and registers a fresh instance of `class`
    pub fn instantiate(&mut self, class: Rc<Class>) -> ObjRef {
        let ident = next_ident();
        let fields = class.fresh_fields();
        let obj = Rc::new(RefCell::new(Instance {
            class,
            ident,
            deleted: false,
            user: None,
            fields,
        }));
        self.live.insert(ident, Rc::downgrade(&obj));
        obj
    }

    /// Registers an instance rebuilt from saved state; later identities stay above it
    pub fn register(&mut self, obj: &ObjRef) {
        let ident = obj.borrow().ident;
        NEXT_IDENT.fetch_max(ident + 1, Ordering::Relaxed);
        self.live.insert(ident, Rc::downgrade(obj));
    }

    /// Drops entries whose instances are gone
    pub fn prune(&mut self) {
        self.live.retain(|_, w| w.strong_count() > 0);
    }

    pub fn len(&self) -> usize {
        self.live.values().filter(|w| w.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
