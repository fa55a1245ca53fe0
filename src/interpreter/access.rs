//! Variable and member access
//!
//! A `Place` names a storage cell: a local in some frame, a member of an
//! instance, or a class static, optionally followed by array element indices.
//! Chains such as `a.b[i].c` resolve left to right; every field step checks the
//! pointer it goes through, so a null or deleted link fails at the accessor
//! that tried to cross it.

use super::errors::ErrorKind;
use super::exec_loop::Interp;
use super::stack::FrameId;
use super::types::{Accessor, AccessorKind, Class, Interrupt, ObjRef, Payload, Span, Variable};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum PlaceRoot {
    Local { frame: FrameId, slot: usize },
    Field { object: ObjRef, slot: usize },
    Static { class: Rc<Class>, slot: usize },
}

#[derive(Debug, Clone)]
pub struct Place {
    pub root: PlaceRoot,
    /// Array element indices applied after the root
    pub elements: Vec<usize>,
}

impl Place {
    fn new(root: PlaceRoot) -> Self {
        Place {
            root,
            elements: Vec::new(),
        }
    }
}

fn descend<'v>(var: &'v mut Variable, path: &[usize]) -> Option<&'v mut Variable> {
    match path.split_first() {
        None => Some(var),
        Some((&index, rest)) => match &mut var.payload {
            Payload::Array(items) => descend(items.get_mut(index)?, rest),
            _ => None,
        },
    }
}

impl<'a> Interp<'a> {
    /// Runs `f` on the cell named by `place`
    pub fn with_place<R>(&mut self, place: &Place, f: impl FnOnce(&mut Variable) -> R) -> Option<R> {
        match &place.root {
            PlaceRoot::Local { frame, slot } => {
                let var = self.stack[*frame].locals.get_mut(*slot)?;
                descend(var, &place.elements).map(f)
            }
            PlaceRoot::Field { object, slot } => {
                let mut obj = object.borrow_mut();
                let result = descend(obj.fields.get_mut(*slot)?, &place.elements).map(f);
                result
            }
            PlaceRoot::Static { class, slot } => {
                let mut statics = class.statics.borrow_mut();
                let result = descend(statics.get_mut(*slot)?, &place.elements).map(f);
                result
            }
        }
    }

    /// Anonymous copy of the value stored at `place`
    pub fn read_place(&mut self, place: &Place, span: Span) -> Result<Variable, Interrupt> {
        let Some(var) = self.with_place(place, |v| v.clone()) else {
            return self.fail(ErrorKind::UndefinedItem(String::new()), span);
        };
        if !var.is_initialized() {
            return self.fail(ErrorKind::NotInitialized(var.name), span);
        }
        // temporaries parked in instruction frames must not shadow the variable
        Ok(Variable {
            name: String::new(),
            ident: 0,
            is_static: false,
            ..var
        })
    }

    /// Converts `value` to the declared type of `place` and stores it.
    /// Returns the stored value.
    pub fn write_place(&mut self, place: &Place, value: Variable, span: Span) -> Result<Variable, Interrupt> {
        let Some(ty) = self.with_place(place, |v| v.ty.clone()) else {
            return self.fail(ErrorKind::UndefinedItem(String::new()), span);
        };
        // conversion may borrow the assigned instance, so it runs outside the cell borrow
        let stored = Variable::coerce("", &ty, value).map_err(|k| k.at(span))?;
        let payload = stored.payload.clone();
        self.with_place(place, move |v| v.set_payload(payload));
        Ok(stored)
    }

    /// Resolves `name` followed by `path`, starting the lookup at `frame`.
    /// Index values were evaluated into `frame`'s locals starting at `first_index`.
    pub fn resolve_place(
        &mut self,
        name: &str,
        path: &[Accessor],
        frame: FrameId,
        first_index: usize,
        span: Span,
    ) -> Result<Place, Interrupt> {
        let Some((owner, slot)) = self.stack.lookup(frame, name) else {
            return self.fail(ErrorKind::UndefinedVariable(name.to_string()), span);
        };
        let mut place = Place::new(PlaceRoot::Local { frame: owner, slot });
        let mut next_index = first_index;

        for acc in path {
            match &acc.kind {
                AccessorKind::Field { name: member } => {
                    let object = self.deref_pointer(&place, acc.span)?;
                    place = self.member_place(object, member, acc.span)?;
                }
                AccessorKind::Index { .. } => {
                    let index = self.stack[frame].locals.get(next_index).and_then(Variable::as_int);
                    next_index += 1;
                    let len = self.with_place(&place, |v| v.as_array().map(<[Variable]>::len)).flatten();
                    match (index, len) {
                        (Some(i), Some(len)) if i >= 0 && (i as usize) < len => {
                            place.elements.push(i as usize);
                        }
                        (Some(i), Some(len)) => {
                            return self.fail(ErrorKind::OutOfBounds { index: i, len }, acc.span);
                        }
                        (None, _) => {
                            return self.fail(
                                ErrorKind::TypeMismatch {
                                    expected: "int".to_string(),
                                    found: "non-int index".to_string(),
                                },
                                acc.span,
                            );
                        }
                        (_, None) => {
                            let found = self.place_type(&place);
                            return self.fail(
                                ErrorKind::TypeMismatch {
                                    expected: "array".to_string(),
                                    found,
                                },
                                acc.span,
                            );
                        }
                    }
                }
            }
        }
        Ok(place)
    }

    fn place_type(&mut self, place: &Place) -> String {
        self.with_place(place, |v| v.ty.to_string()).unwrap_or_default()
    }

    /// Instance the pointer stored at `place` refers to
    fn deref_pointer(&mut self, place: &Place, span: Span) -> Result<ObjRef, Interrupt> {
        let target = self.with_place(place, |v| match &v.payload {
            Payload::Pointer(target) => Ok(target.clone()),
            _ => Err(v.ty.to_string()),
        });
        match target {
            Some(Ok(Some(object))) => {
                if object.borrow().deleted {
                    return self.fail(ErrorKind::DeletedPointer, span);
                }
                Ok(object)
            }
            Some(Ok(None)) => self.fail(ErrorKind::NullPointer, span),
            Some(Err(found)) => self.fail(
                ErrorKind::TypeMismatch {
                    expected: "pointer".to_string(),
                    found,
                },
                span,
            ),
            None => self.fail(ErrorKind::UndefinedItem(String::new()), span),
        }
    }

    /// Member `name` of `object`: an instance field, else a class static
    fn member_place(&mut self, object: ObjRef, name: &str, span: Span) -> Result<Place, Interrupt> {
        let (slot, class) = {
            let obj = object.borrow();
            (obj.member_slot(name), obj.class.clone())
        };
        self.ctx.host.refresh(&mut object.borrow_mut());
        if let Some(slot) = slot {
            return Ok(Place::new(PlaceRoot::Field { object, slot }));
        }
        match class.static_slot(name) {
            Some(slot) => Ok(Place::new(PlaceRoot::Static { class, slot })),
            None => self.fail(ErrorKind::UndefinedItem(name.to_string()), span),
        }
    }
}
