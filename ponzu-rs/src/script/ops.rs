//! Operator dispatch.
//!
//! Host types take part in arithmetic by registering an [`OperatorTable`]
//! for their Rust type.  For a binary operator the left operand's table is
//! consulted first, then the right operand's, and only then the default rule
//! applies, so a type may overload `scalar / vector` as well as
//! `vector / scalar`.
//!
//! ```rust
//! use ponzu::script::{OperatorTable, Interpreter, Value};
//!
//! struct Meters(f64);
//! # impl ponzu::script::HostObject for Meters {
//! #     fn type_name(&self) -> &str { "Meters" }
//! #     fn as_any(&self) -> &dyn std::any::Any { self }
//! #     fn to_number(&self) -> f64 { self.0 }
//! # }
//! let mut interp = Interpreter::new();
//! interp.operators_mut().register::<Meters>(
//!     OperatorTable::new().with_add(|a, b| Value::from(a.to_number() + b.to_number())),
//! );
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::value::{Map, Value};

pub type BinaryHandler = Rc<dyn Fn(&Value, &Value) -> Value>;
pub type UnaryHandler = Rc<dyn Fn(&Value) -> Value>;

/// Binary operators a host type may overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    And,
    Or,
}

/// Unary operators a host type may overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
    /// Unary `+`.
    Approve,
}

// ── OperatorTable ─────────────────────────────────────────────────────────────

/// Optional handler per overloadable operator.
#[derive(Clone, Default)]
pub struct OperatorTable {
    pub add: Option<BinaryHandler>,
    pub subtract: Option<BinaryHandler>,
    pub multiply: Option<BinaryHandler>,
    pub divide: Option<BinaryHandler>,
    pub modulo: Option<BinaryHandler>,
    pub power: Option<BinaryHandler>,
    pub and: Option<BinaryHandler>,
    pub or: Option<BinaryHandler>,
    pub negate: Option<UnaryHandler>,
    pub not: Option<UnaryHandler>,
    pub approve: Option<UnaryHandler>,
}

macro_rules! binary_setter {
    ($name:ident, $field:ident) => {
        pub fn $name(mut self, f: impl Fn(&Value, &Value) -> Value + 'static) -> Self {
            self.$field = Some(Rc::new(f));
            self
        }
    };
}

macro_rules! unary_setter {
    ($name:ident, $field:ident) => {
        pub fn $name(mut self, f: impl Fn(&Value) -> Value + 'static) -> Self {
            self.$field = Some(Rc::new(f));
            self
        }
    };
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    binary_setter!(with_add, add);
    binary_setter!(with_subtract, subtract);
    binary_setter!(with_multiply, multiply);
    binary_setter!(with_divide, divide);
    binary_setter!(with_modulo, modulo);
    binary_setter!(with_power, power);
    binary_setter!(with_and, and);
    binary_setter!(with_or, or);
    unary_setter!(with_negate, negate);
    unary_setter!(with_not, not);
    unary_setter!(with_approve, approve);

    fn binary(&self, op: BinaryOp) -> Option<&BinaryHandler> {
        match op {
            BinaryOp::Add => self.add.as_ref(),
            BinaryOp::Subtract => self.subtract.as_ref(),
            BinaryOp::Multiply => self.multiply.as_ref(),
            BinaryOp::Divide => self.divide.as_ref(),
            BinaryOp::Modulo => self.modulo.as_ref(),
            BinaryOp::Power => self.power.as_ref(),
            BinaryOp::And => self.and.as_ref(),
            BinaryOp::Or => self.or.as_ref(),
        }
    }

    fn unary(&self, op: UnaryOp) -> Option<&UnaryHandler> {
        match op {
            UnaryOp::Negate => self.negate.as_ref(),
            UnaryOp::Not => self.not.as_ref(),
            UnaryOp::Approve => self.approve.as_ref(),
        }
    }
}

impl fmt::Debug for OperatorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = [
            ("add", self.add.is_some()),
            ("subtract", self.subtract.is_some()),
            ("multiply", self.multiply.is_some()),
            ("divide", self.divide.is_some()),
            ("modulo", self.modulo.is_some()),
            ("power", self.power.is_some()),
            ("and", self.and.is_some()),
            ("or", self.or.is_some()),
            ("negate", self.negate.is_some()),
            ("not", self.not.is_some()),
            ("approve", self.approve.is_some()),
        ];
        f.debug_list()
            .entries(slots.iter().filter(|(_, set)| *set).map(|(name, _)| name))
            .finish()
    }
}

// ── OperatorRegistry ──────────────────────────────────────────────────────────

/// Handler tables keyed by host type.
#[derive(Clone, Default, Debug)]
pub struct OperatorRegistry {
    tables: HashMap<TypeId, OperatorTable>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the handlers for host type `T`.
    pub fn register<T: 'static>(&mut self, table: OperatorTable) {
        self.tables.insert(TypeId::of::<T>(), table);
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.tables.contains_key(&TypeId::of::<T>())
    }

    fn table(&self, value: &Value) -> Option<&OperatorTable> {
        match value {
            Value::Host(h) => self.tables.get(&h.as_any().type_id()),
            _ => None,
        }
    }

    fn binary_handler(&self, op: BinaryOp, value: &Value) -> Option<&BinaryHandler> {
        self.table(value).and_then(|t| t.binary(op))
    }

    fn unary_handler(&self, op: UnaryOp, value: &Value) -> Option<&UnaryHandler> {
        self.table(value).and_then(|t| t.unary(op))
    }

    /// Apply `op`: left handler, right handler, then the default rule.
    pub fn binary(&self, op: BinaryOp, left: &Value, right: &Value) -> Value {
        if let Some(h) = self
            .binary_handler(op, left)
            .or_else(|| self.binary_handler(op, right))
        {
            return h(left, right);
        }
        match op {
            BinaryOp::Add => default_add(left, right),
            BinaryOp::Subtract => match self.unary_handler(UnaryOp::Negate, right) {
                Some(negate) => self.binary(BinaryOp::Add, left, &negate(right)),
                None => Value::Number(left.to_number() - right.to_number()),
            },
            BinaryOp::Multiply => Value::Number(left.to_number() * right.to_number()),
            BinaryOp::Divide => Value::Number(left.to_number() / right.to_number()),
            BinaryOp::Modulo => Value::Number(left.to_number() % right.to_number()),
            BinaryOp::Power => Value::Number(power(left.to_number(), right.to_number())),
            BinaryOp::And => {
                if left.truthy() {
                    right.clone()
                } else {
                    left.clone()
                }
            }
            BinaryOp::Or => {
                if left.truthy() {
                    left.clone()
                } else {
                    right.clone()
                }
            }
        }
    }

    /// Apply a unary `op`: the operand's handler, then the default rule.
    pub fn unary(&self, op: UnaryOp, value: &Value) -> Value {
        if let Some(h) = self.unary_handler(op, value) {
            return h(value);
        }
        match op {
            UnaryOp::Negate => Value::Number(-value.to_number()),
            UnaryOp::Not => Value::Bool(!value.truthy()),
            UnaryOp::Approve => match value {
                Value::Host(h) => h.duplicate().map_or_else(|| value.clone(), Value::Host),
                other => other.deep_clone(),
            },
        }
    }
}

// ── Default rules ─────────────────────────────────────────────────────────────

/// `+` without handlers: composites merge, equal types use native addition
/// (dates excluded), anything else adds numerically.
fn default_add(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Object(a), _) => {
            let mut merged: Map = a.borrow().clone();
            match right {
                Value::Object(b) => {
                    for (k, v) in b.borrow().iter() {
                        merged.insert(k.clone(), v.clone());
                    }
                }
                Value::Array(b) => {
                    for (i, v) in b.borrow().iter().enumerate() {
                        merged.insert(i.to_string(), v.clone());
                    }
                }
                _ => {}
            }
            Value::object(merged)
        }
        (Value::Array(a), _) => {
            let mut merged = a.borrow().clone();
            if let Value::Array(b) = right {
                for (i, v) in b.borrow().iter().enumerate() {
                    match merged.get_mut(i) {
                        Some(slot) => *slot = v.clone(),
                        None => merged.push(v.clone()),
                    }
                }
            }
            Value::array(merged)
        }
        (Value::Str(a), Value::Str(b)) => Value::Str(format!("{a}{b}")),
        (Value::Host(a), Value::Host(b))
            if a.as_any().type_id() == b.as_any().type_id() && !a.is_date() =>
        {
            Value::Str(format!("{left}{right}"))
        }
        (Value::Function(_), Value::Function(_)) | (Value::Regex(_), Value::Regex(_)) => {
            Value::Str(format!("{left}{right}"))
        }
        _ => Value::Number(left.to_number() + right.to_number()),
    }
}

/// `**` with JavaScript's NaN rules.
pub fn power(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
