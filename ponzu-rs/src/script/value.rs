//! Runtime value type for the script language.
//!
//! The language is dynamically typed with JavaScript-flavoured coercions:
//! every operator that needs a number, a string, or a boolean converts its
//! operands on the fly.  Arrays and objects are shared by reference, so a
//! mutation through one binding is visible through every other binding that
//! holds the same composite.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use regex::Regex;

use super::ast::FunctionDef;
use super::error::EvalError;
use super::host::HostObject;
use super::scope::WeakScope;
use super::walker::Interpreter;

/// Insertion-ordered name → value mapping used for objects and bindings.
pub type Map = IndexMap<String, Value>;

/// Longest array a write past the end may grow.
pub const MAX_ARRAY_LENGTH: usize = 1 << 22;

/// Longest string, in characters, that `repeat` and `padStart`/`padEnd`
/// may build.
pub const MAX_STRING_LENGTH: usize = 1 << 26;

/// A runtime value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<Map>>),
    Regex(Rc<JsRegex>),
    Function(Function),
    Host(Rc<dyn HostObject>),
}

// ── Callables ─────────────────────────────────────────────────────────────────

/// Signature of a host-supplied function.
pub type NativeFn = dyn Fn(&Interpreter, &[Value]) -> Result<Value, EvalError>;

/// Either a host-native function or an interpreted closure.
#[derive(Clone)]
pub enum Function {
    Native(Rc<NativeFunction>),
    Closure(Rc<Closure>),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Native(n) => &n.name,
            Function::Closure(c) => c.def.name.as_deref().unwrap_or(""),
        }
    }

    pub fn ptr_eq(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Native(a), Function::Native(b)) => Rc::ptr_eq(a, b),
            (Function::Closure(a), Function::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

pub struct NativeFunction {
    pub name: String,
    pub body: Box<NativeFn>,
}

/// An interpreted function together with the environment it closes over.
pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub env: Captured,
}

/// How a closure sees the bindings around its definition.
pub enum Captured {
    /// Copy of every visible binding taken when an inline function or arrow
    /// literal was evaluated.  Later rebindings are not observed.
    Snapshot(Map),
    /// The live scope a function declaration was made in.
    Scope(WeakScope),
}

// ── Regex ─────────────────────────────────────────────────────────────────────

/// A regex literal (`/pattern/flags`).
#[derive(Debug)]
pub struct JsRegex {
    pub source: String,
    pub flags: String,
    pub regex: Regex,
}

impl JsRegex {
    /// Compile `source` honouring the `i`, `m` and `s` flags.  The `g` flag is
    /// kept for `replace` and otherwise ignored.
    pub fn new(source: &str, flags: &str) -> Result<Self, regex::Error> {
        let inline: String = flags.chars().filter(|c| matches!(c, 'i' | 'm' | 's')).collect();
        let pattern = if inline.is_empty() {
            source.to_owned()
        } else {
            format!("(?{inline}){source}")
        };
        Ok(JsRegex {
            source: source.to_owned(),
            flags: flags.to_owned(),
            regex: Regex::new(&pattern)?,
        })
    }

    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }
}

// ── Construction ──────────────────────────────────────────────────────────────

impl Value {
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(map: Map) -> Value {
        Value::Object(Rc::new(RefCell::new(map)))
    }

    pub fn host<T: HostObject + 'static>(host: T) -> Value {
        Value::Host(Rc::new(host))
    }

    /// Wrap a Rust closure as a callable value.
    pub fn native<F>(name: &str, body: F) -> Value
    where
        F: Fn(&Interpreter, &[Value]) -> Result<Value, EvalError> + 'static,
    {
        Value::Function(Function::Native(Rc::new(NativeFunction {
            name: name.to_owned(),
            body: Box::new(body),
        })))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Number(x)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::object(map)
    }
}

// ── Coercions ─────────────────────────────────────────────────────────────────

impl Value {
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Arrays, objects and host objects.
    pub fn is_composite(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_) | Value::Host(_))
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Value::Host(h) if h.is_date())
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// JS truthiness: `undefined`, `null`, `false`, `0`, `NaN` and `""` are
    /// falsy; everything else is truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// `ToNumber`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => parse_number(s),
            Value::Array(items) => {
                let items = items.borrow();
                match items.as_slice() {
                    [] => 0.0,
                    [only] => only.to_number(),
                    _ => f64::NAN,
                }
            }
            Value::Host(h) => h.to_number(),
            Value::Object(_) | Value::Regex(_) | Value::Function(_) => f64::NAN,
        }
    }

    /// `ToInt32`.
    pub fn to_int32(&self) -> i32 {
        self.to_uint32() as i32
    }

    /// `ToUint32`.
    pub fn to_uint32(&self) -> u32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        n.trunc().rem_euclid(4_294_967_296.0) as u32
    }

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Regex(_) | Value::Host(_) => {
                "object"
            }
        }
    }

    /// Recursive copy of arrays and objects.  Host objects, functions and
    /// regexes are shared.
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Array(items) => {
                Value::array(items.borrow().iter().map(Value::deep_clone).collect())
            }
            Value::Object(map) => Value::object(
                map.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    // ── Equality and ordering ─────────────────────────────────────────────────

    /// `===`.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Regex(a), Value::Regex(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Host(a), Value::Host(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `==`.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Number(_), Value::Str(_)) | (Value::Str(_), Value::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_eq(other),
            (_, Value::Bool(_)) => self.loose_eq(&Value::Number(other.to_number())),
            (Value::Number(_) | Value::Str(_), b) if b.is_composite() => {
                self.loose_eq(&Value::Str(other.to_string()))
            }
            (a, Value::Number(_) | Value::Str(_)) if a.is_composite() => {
                Value::Str(self.to_string()).loose_eq(other)
            }
            _ => self.strict_eq(other),
        }
    }

    /// Ordering used by `<`, `<=`, `>` and `>=`.  Two strings compare by
    /// code point; anything else compares numerically.  `None` when either
    /// side is `NaN`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => self.to_number().partial_cmp(&other.to_number()),
        }
    }
}

/// `ToNumber` applied to a string.
pub fn parse_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = t.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix).map_or(f64::NAN, |n| n as f64);
        }
    }
    if t.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
        t.parse().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

/// `ToString` applied to a number.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if n == 0.0 {
        return "0".into();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        let s = format!("{n:e}");
        return match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => s,
        };
    }
    if n.fract() == 0.0 {
        format!("{n:.0}")
    } else {
        format!("{n}")
    }
}

// ── Display / Debug ───────────────────────────────────────────────────────────

impl fmt::Display for Value {
    /// `ToString`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => f.write_str(s),
            Value::Array(items) => {
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Regex(r) => write!(f, "/{}/{}", r.source, r.flags),
            Value::Function(func) => write!(f, "function {}() {{ [code] }}", func.name()),
            Value::Host(h) => f.write_str(&h.display()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Object(map) => f.debug_map().entries(map.borrow().iter()).finish(),
            Value::Regex(r) => write!(f, "Regex(/{}/{})", r.source, r.flags),
            Value::Function(func) => write!(f, "Function({})", func.name()),
            Value::Host(h) => write!(f, "Host({}: {})", h.type_name(), h.display()),
        }
    }
}

/// Structural equality: composites compare by content (object key order is
/// ignored), functions and host objects by identity or host-defined equality.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Object(a), Value::Object(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v == w))
            }
            (Value::Regex(a), Value::Regex(b)) => a.source == b.source && a.flags == b.flags,
            (Value::Host(a), Value::Host(b)) => Rc::ptr_eq(a, b) || a.equals(b.as_ref()),
            _ => self.strict_eq(other),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_numbers() {
        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(Value::from(-7.0).to_string(), "-7");
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from(-0.0).to_string(), "0");
        assert_eq!(Value::from(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::from(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(Value::from(1e21).to_string(), "1e+21");
    }

    #[test]
    fn display_composites() {
        let arr = Value::array(vec![1.into(), Value::Null, "x".into()]);
        assert_eq!(arr.to_string(), "1,,x");
        assert_eq!(Value::object(Map::new()).to_string(), "[object Object]");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::from(0).truthy());
        assert!(!Value::from(f64::NAN).truthy());
        assert!(!Value::from("").truthy());
        assert!(Value::from("0").truthy());
        assert!(Value::from(-1).truthy());
        assert!(Value::array(vec![]).truthy());
    }

    #[test]
    fn to_number_coercions() {
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::Null.to_number(), 0.0);
        assert_eq!(Value::from(true).to_number(), 1.0);
        assert_eq!(Value::from("  12.5 ").to_number(), 12.5);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert_eq!(Value::from("0x1F").to_number(), 31.0);
        assert!(Value::from("abc").to_number().is_nan());
        assert!(Value::from("inf").to_number().is_nan());
        assert_eq!(Value::array(vec![]).to_number(), 0.0);
        assert_eq!(Value::array(vec!["4".into()]).to_number(), 4.0);
    }

    #[test]
    fn int32_conversions() {
        assert_eq!(Value::from(-5).to_uint32(), 4_294_967_291);
        assert_eq!(Value::from(4_294_967_297.0).to_int32(), 1);
        assert_eq!(Value::from(2_147_483_648.0).to_int32(), -2_147_483_648);
        assert_eq!(Value::from(f64::NAN).to_int32(), 0);
    }

    #[test]
    fn loose_and_strict_equality() {
        assert!(Value::from(1).loose_eq(&"1".into()));
        assert!(!Value::from(1).strict_eq(&"1".into()));
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.strict_eq(&Value::Undefined));
        assert!(Value::from(true).loose_eq(&1.into()));
        assert!(!Value::from(0).loose_eq(&Value::Null));
        let arr = Value::array(vec![1.into()]);
        assert!(arr.strict_eq(&arr.clone()));
        assert!(!arr.strict_eq(&Value::array(vec![1.into()])));
    }

    #[test]
    fn relational_compare() {
        assert_eq!(Value::from("b").compare(&"a".into()), Some(Ordering::Greater));
        assert_eq!(Value::from("10").compare(&9.into()), Some(Ordering::Greater));
        assert_eq!(Value::Undefined.compare(&1.into()), None);
    }

    #[test]
    fn structural_eq_ignores_key_order() {
        let mut a = Map::new();
        a.insert("x".into(), 1.into());
        a.insert("y".into(), 2.into());
        let mut b = Map::new();
        b.insert("y".into(), 2.into());
        b.insert("x".into(), 1.into());
        assert_eq!(Value::object(a), Value::object(b));
        assert_ne!(Value::from(f64::NAN), Value::from(f64::NAN));
    }

    #[test]
    fn deep_clone_detaches_composites() {
        let inner = Value::array(vec![1.into()]);
        let outer = Value::array(vec![inner.clone()]);
        let copy = outer.deep_clone();
        if let Value::Array(items) = &inner {
            items.borrow_mut().push(2.into());
        }
        assert_eq!(copy, Value::array(vec![Value::array(vec![1.into()])]));
        assert_ne!(copy, outer);
    }

    #[test]
    fn regex_flags() {
        let re = JsRegex::new("ab+", "gi").unwrap();
        assert!(re.regex.is_match("xABBy"));
        assert!(re.is_global());
    }
}
