//! Lexical scopes.
//!
//! Every scope of one evaluation lives in a shared arena and refers to its
//! parent by index, so a child never owns its parent.  [`Scope`] is a cheap
//! handle (arena + index); cloning it does not copy any bindings.
//!
//! Declared functions keep their defining scope reachable through a
//! [`WeakScope`].  Downgrading pins the scope and all of its ancestors so
//! that [`Scope::release`] leaves them in place once the call that created
//! them returns.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::error::EvalError;
use super::value::{Captured, Closure, Function, Map, Value};

/// One named slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub constant: bool,
    pub value: Value,
}

#[derive(Debug)]
struct Record {
    parent: Option<usize>,
    vars: IndexMap<String, Binding>,
    pinned: bool,
}

#[derive(Debug, Default)]
struct Arena {
    records: Vec<Option<Record>>,
    free: Vec<usize>,
}

impl Arena {
    fn alloc(&mut self, parent: Option<usize>) -> usize {
        let record = Record {
            parent,
            vars: IndexMap::new(),
            pinned: false,
        };
        match self.free.pop() {
            Some(id) => {
                self.records[id] = Some(record);
                id
            }
            None => {
                self.records.push(Some(record));
                self.records.len() - 1
            }
        }
    }

    fn record(&self, id: usize) -> Option<&Record> {
        self.records.get(id).and_then(Option::as_ref)
    }

    fn record_mut(&mut self, id: usize) -> Option<&mut Record> {
        self.records.get_mut(id).and_then(Option::as_mut)
    }

    /// Nearest scope, starting at `id`, that owns `name`.
    fn owner(&self, mut id: usize, name: &str) -> Option<usize> {
        loop {
            let record = self.record(id)?;
            if record.vars.contains_key(name) {
                return Some(id);
            }
            id = record.parent?;
        }
    }
}

// ── Scope ─────────────────────────────────────────────────────────────────────

/// Handle to one scope record.
#[derive(Clone)]
pub struct Scope {
    arena: Rc<RefCell<Arena>>,
    id: usize,
}

/// Non-owning handle held by declared closures.
#[derive(Clone)]
pub struct WeakScope {
    arena: Weak<RefCell<Arena>>,
    id: usize,
}

impl WeakScope {
    /// `None` once the evaluation that created the scope has been dropped.
    pub fn upgrade(&self) -> Option<Scope> {
        let arena = self.arena.upgrade()?;
        let alive = arena.borrow().record(self.id).is_some();
        alive.then_some(Scope { arena, id: self.id })
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Fresh root scope with no bindings.
    pub fn new() -> Self {
        let mut arena = Arena::default();
        let id = arena.alloc(None);
        Scope {
            arena: Rc::new(RefCell::new(arena)),
            id,
        }
    }

    /// Root scope seeded with one non-constant binding per entry.
    pub fn from_bindings(bindings: &Map) -> Self {
        let scope = Scope::new();
        scope.seed(bindings);
        scope
    }

    /// Add one non-constant binding per entry to this scope, replacing any
    /// binding of the same name.
    pub fn seed(&self, bindings: &Map) {
        let mut arena = self.arena.borrow_mut();
        if let Some(record) = arena.record_mut(self.id) {
            record.vars.extend(bindings.iter().map(|(k, v)| {
                (
                    k.clone(),
                    Binding {
                        constant: false,
                        value: v.clone(),
                    },
                )
            }));
        }
    }

    /// New scope whose parent is `self`.
    pub fn child(&self) -> Scope {
        let id = self.arena.borrow_mut().alloc(Some(self.id));
        Scope {
            arena: Rc::clone(&self.arena),
            id,
        }
    }

    /// Create the binding `name` in this scope, initialised to `undefined`.
    pub fn declare(&self, name: &str, constant: bool) -> Result<(), EvalError> {
        let mut arena = self.arena.borrow_mut();
        let Some(record) = arena.record_mut(self.id) else {
            return Err(EvalError::UnboundAssignment(name.to_owned()));
        };
        if record.vars.contains_key(name) {
            return Err(EvalError::DuplicateBinding(name.to_owned()));
        }
        record.vars.insert(
            name.to_owned(),
            Binding {
                constant,
                value: Value::Undefined,
            },
        );
        Ok(())
    }

    /// Value of the nearest binding for `name`, or `undefined`.
    pub fn get(&self, name: &str) -> Value {
        let arena = self.arena.borrow();
        arena
            .owner(self.id, name)
            .and_then(|id| arena.record(id))
            .and_then(|r| r.vars.get(name))
            .map(|b| b.value.clone())
            .unwrap_or_default()
    }

    /// Overwrite the nearest binding for `name`.  Constants may only be
    /// written with `is_declaration` set.
    pub fn set(&self, name: &str, value: Value, is_declaration: bool) -> Result<Value, EvalError> {
        let mut arena = self.arena.borrow_mut();
        let owner = arena
            .owner(self.id, name)
            .ok_or_else(|| EvalError::UnboundAssignment(name.to_owned()))?;
        let binding = arena
            .record_mut(owner)
            .and_then(|r| r.vars.get_mut(name))
            .ok_or_else(|| EvalError::UnboundAssignment(name.to_owned()))?;
        if binding.constant && !is_declaration {
            return Err(EvalError::ConstAssignment(name.to_owned()));
        }
        binding.value = value.clone();
        Ok(value)
    }

    pub fn has(&self, name: &str) -> bool {
        self.arena.borrow().owner(self.id, name).is_some()
    }

    /// Delete the nearest binding for `name`.
    pub fn remove(&self, name: &str) -> Result<(), EvalError> {
        let mut arena = self.arena.borrow_mut();
        let owner = arena
            .owner(self.id, name)
            .ok_or_else(|| EvalError::UnboundAssignment(name.to_owned()))?;
        if let Some(record) = arena.record_mut(owner) {
            record.vars.shift_remove(name);
        }
        Ok(())
    }

    /// This scope's own binding for `name`; parents are not consulted.
    pub fn binding(&self, name: &str) -> Option<Binding> {
        self.arena
            .borrow()
            .record(self.id)
            .and_then(|r| r.vars.get(name).cloned())
    }

    /// Names declared directly in this scope, in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.arena
            .borrow()
            .record(self.id)
            .map(|r| r.vars.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every visible binding, inner scopes shadowing outer ones.
    pub fn flatten(&self) -> Map {
        let arena = self.arena.borrow();
        let mut chain = Vec::new();
        let mut cursor = Some(self.id);
        while let Some(id) = cursor {
            let Some(record) = arena.record(id) else { break };
            chain.push(record);
            cursor = record.parent;
        }
        let mut out = Map::new();
        for record in chain.into_iter().rev() {
            for (name, binding) in &record.vars {
                out.insert(name.clone(), binding.value.clone());
            }
        }
        out
    }

    /// Mirror this scope's bindings into `backing`: every binding is written
    /// back and every key without a binding is removed.
    ///
    /// Declared functions are detached from the scope tree on the way out so
    /// they stay callable after the evaluation is dropped.
    pub fn finalize(&self, backing: &mut Map) {
        let own: Vec<(String, Value)> = {
            let arena = self.arena.borrow();
            arena
                .record(self.id)
                .map(|r| {
                    r.vars
                        .iter()
                        .map(|(k, b)| (k.clone(), b.value.clone()))
                        .collect()
                })
                .unwrap_or_default()
        };
        for (name, value) in &own {
            backing.insert(name.clone(), detach(value, self));
        }
        backing.retain(|key, _| own.iter().any(|(name, _)| name == key));
    }

    /// Weak handle for a closure.  Pins this scope and its ancestors.
    pub fn downgrade(&self) -> WeakScope {
        let mut arena = self.arena.borrow_mut();
        let mut cursor = Some(self.id);
        while let Some(id) = cursor {
            let Some(record) = arena.record_mut(id) else { break };
            record.pinned = true;
            cursor = record.parent;
        }
        WeakScope {
            arena: Rc::downgrade(&self.arena),
            id: self.id,
        }
    }

    /// Drop this scope's record unless a closure pinned it.  Used for call
    /// scopes once the call has returned.
    pub fn release(self) {
        let mut arena = self.arena.borrow_mut();
        let pinned = arena.record(self.id).is_some_and(|r| r.pinned);
        if !pinned && self.id < arena.records.len() {
            arena.records[self.id] = None;
            arena.free.push(self.id);
        }
    }
}

/// A closure over a live scope of `home`'s arena becomes a closure over a
/// snapshot of that scope.
///
/// Arrays and objects are searched too and their slots rewritten in place,
/// so a declared function stored in a composite stays callable once the
/// arena is gone.  Snapshot values are detached the same way.
pub(crate) fn detach(value: &Value, home: &Scope) -> Value {
    Detacher {
        arena: Rc::as_ptr(&home.arena),
        seen: HashSet::new(),
        closures: HashMap::new(),
    }
    .value(value)
}

struct Detacher {
    arena: *const RefCell<Arena>,
    /// Composites already visited.
    seen: HashSet<*const ()>,
    /// Closures being detached, mapped to their result once done.
    closures: HashMap<*const Closure, Option<Value>>,
}

impl Detacher {
    fn value(&mut self, value: &Value) -> Value {
        match value {
            Value::Function(Function::Closure(c)) => self.closure(c).unwrap_or_else(|| value.clone()),
            Value::Array(items) => {
                if self.seen.insert(Rc::as_ptr(items).cast()) {
                    let len = items.borrow().len();
                    for i in 0..len {
                        let Some(item) = items.borrow().get(i).cloned() else { break };
                        let out = self.value(&item);
                        if let Some(slot) = items.borrow_mut().get_mut(i) {
                            *slot = out;
                        }
                    }
                }
                value.clone()
            }
            Value::Object(map) => {
                if self.seen.insert(Rc::as_ptr(map).cast()) {
                    let entries: Vec<(String, Value)> = map
                        .borrow()
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    for (key, item) in entries {
                        let out = self.value(&item);
                        if let Some(slot) = map.borrow_mut().get_mut(&key) {
                            *slot = out;
                        }
                    }
                }
                value.clone()
            }
            _ => value.clone(),
        }
    }

    /// `None` leaves the closure as it is: it is not over a live scope, or
    /// it refers to itself through its own snapshot.
    fn closure(&mut self, closure: &Rc<Closure>) -> Option<Value> {
        let key = Rc::as_ptr(closure);
        if let Some(done) = self.closures.get(&key) {
            return done.clone();
        }
        let Captured::Scope(weak) = &closure.env else {
            return None;
        };
        if !std::ptr::eq(weak.arena.as_ptr(), self.arena) {
            return None;
        }
        let scope = weak.upgrade()?;
        self.closures.insert(key, None);
        let mut snapshot = scope.flatten();
        for slot in snapshot.values_mut() {
            *slot = self.value(slot);
        }
        let out = Value::Function(Function::Closure(Rc::new(Closure {
            def: Rc::clone(&closure.def),
            env: Captured::Snapshot(snapshot),
        })));
        self.closures.insert(key, Some(out.clone()));
        Some(out)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("vars", &self.names())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
