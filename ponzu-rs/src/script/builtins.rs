//! Built-in methods.
//!
//! Two families live here.  The *helpers* (`map`, `filterSrc`,
//! `allowIndexes`, …) are the whitelisted collection functions a script may
//! call on any array, object or string: `obj.map(fn)` runs as
//! `map(obj, fn)`.  The *intrinsics* are the everyday methods of the value
//! kinds themselves (`"a,b".split(",")`, `[1, 2].join("-")`, `re.test(s)`).
//!
//! Both dispatchers return `None` when the name is not theirs, so the walker
//! can fall through to the next resolution step.

use super::error::EvalError;
use super::value::{format_number, Function, JsRegex, Value, MAX_STRING_LENGTH};
use super::walker::{Eval, Interpreter};

/// Names callable as `receiver.name(...)` on any array, object or string.
pub const HELPERS: &[&str] = &[
    "map",
    "mapSrc",
    "mapRight",
    "mapRightSrc",
    "allowIndexes",
    "allowIndexesSrc",
    "denyIndexes",
    "denyIndexesSrc",
    "every",
    "filter",
    "filterSrc",
    "forEach",
    "forEachRight",
];

pub fn is_helper(name: &str) -> bool {
    HELPERS.contains(&name)
}

// ── Collections ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Array,
    Object,
    Str,
}

/// A collection flattened to `(key, item)` pairs.  Array keys are indexes,
/// object keys are property names and string items are single characters.
struct Items {
    shape: Shape,
    entries: Vec<(Value, Value)>,
}

impl Items {
    fn of(value: &Value) -> Option<Items> {
        let (shape, entries) = match value {
            Value::Array(a) => (
                Shape::Array,
                a.borrow()
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (Value::from(i), v.clone()))
                    .collect(),
            ),
            Value::Object(o) => (
                Shape::Object,
                o.borrow()
                    .iter()
                    .map(|(k, v)| (Value::Str(k.clone()), v.clone()))
                    .collect(),
            ),
            Value::Str(s) => (
                Shape::Str,
                s.chars()
                    .enumerate()
                    .map(|(i, c)| (Value::from(i), Value::Str(c.to_string())))
                    .collect(),
            ),
            _ => return None,
        };
        Some(Items { shape, entries })
    }
}

/// Reassemble `entries` in the receiver's own shape.
fn rebuild(shape: Shape, entries: Vec<(Value, Value)>) -> Value {
    match shape {
        Shape::Array => Value::array(entries.into_iter().map(|(_, v)| v).collect()),
        Shape::Object => Value::object(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        ),
        Shape::Str => Value::Str(entries.into_iter().map(|(_, v)| v.to_string()).collect()),
    }
}

/// `*Src` helpers keep the receiver's shape; the others always yield an array.
fn finish(name: &str, shape: Shape, entries: Vec<(Value, Value)>) -> Value {
    if name.ends_with("Src") {
        rebuild(shape, entries)
    } else {
        Value::array(entries.into_iter().map(|(_, v)| v).collect())
    }
}

/// Keys named by an `allowIndexes`/`denyIndexes` argument, as strings.
fn index_keys(arg: Option<&Value>) -> Vec<String> {
    match arg {
        None | Some(Value::Undefined) => Vec::new(),
        Some(Value::Array(a)) => a.borrow().iter().map(Value::to_string).collect(),
        Some(other) => vec![other.to_string()],
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Run the whitelisted helper `name` over `receiver`.
///
/// `None` if `name` is not a helper or the receiver is not a collection.
pub fn call_helper(
    interp: &Interpreter,
    name: &str,
    receiver: &Value,
    args: &[Value],
) -> Option<Result<Eval, EvalError>> {
    if !is_helper(name) {
        return None;
    }
    let items = Items::of(receiver)?;
    Some(run_helper(interp, name, receiver, items, args))
}

fn run_helper(
    interp: &Interpreter,
    name: &str,
    receiver: &Value,
    items: Items,
    args: &[Value],
) -> Result<Eval, EvalError> {
    let Items { shape, mut entries } = items;

    if let Some(allow) = name
        .strip_suffix("Src")
        .unwrap_or(name)
        .strip_suffix("Indexes")
        .map(|verb| verb == "allow")
    {
        let keys = index_keys(args.first());
        entries.retain(|(k, _)| keys.contains(&k.to_string()) == allow);
        return Ok(Eval::Value(finish(name, shape, entries)));
    }

    let Some(callback) = args.first().and_then(Value::as_function) else {
        interp.warn(&format!("{name} expects a function argument"));
        return Ok(Eval::Failed);
    };
    if name.contains("Right") {
        entries.reverse();
    }
    let visit = |key: &Value, item: &Value| -> Result<Value, EvalError> {
        interp
            .call_function(callback, None, &[item.clone(), key.clone(), receiver.clone()])
            .map(Eval::into_value)
    };

    let out = match name {
        "map" | "mapSrc" | "mapRight" | "mapRightSrc" => {
            let mut mapped = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                let out = visit(&k, &v)?;
                mapped.push((k, out));
            }
            finish(name, shape, mapped)
        }
        "filter" | "filterSrc" => {
            let mut kept = Vec::new();
            for (k, v) in entries {
                if visit(&k, &v)?.truthy() {
                    kept.push((k, v));
                }
            }
            finish(name, shape, kept)
        }
        "every" => {
            for (k, v) in &entries {
                if !visit(k, v)?.truthy() {
                    return Ok(Eval::Value(Value::Bool(false)));
                }
            }
            Value::Bool(true)
        }
        "forEach" | "forEachRight" => {
            for (k, v) in &entries {
                visit(k, v)?;
            }
            Value::Undefined
        }
        _ => {
            interp.warn(&format!("unknown helper {name}"));
            return Ok(Eval::Failed);
        }
    };
    Ok(Eval::Value(out))
}

// ── Intrinsic methods ─────────────────────────────────────────────────────────

/// Call the built-in method `name` of `receiver`.
///
/// `None` means the receiver's kind has no such method.
pub fn call_method(
    interp: &Interpreter,
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Option<Result<Eval, EvalError>> {
    match receiver {
        Value::Str(s) => string_method(interp, s, name, args),
        Value::Array(_) => array_method(interp, receiver, name, args),
        Value::Number(n) => number_method(*n, name, args).map(|r| r.map(Eval::Value)),
        Value::Bool(b) => (name == "toString").then(|| Ok(Eval::Value(Value::Str(b.to_string())))),
        Value::Regex(re) => match name {
            "test" => {
                let subject = arg(args, 0).to_string();
                Some(Ok(Eval::Value(Value::Bool(re.regex.is_match(&subject)))))
            }
            "toString" => Some(Ok(Eval::Value(Value::Str(receiver.to_string())))),
            _ => None,
        },
        Value::Object(o) => match name {
            "hasOwnProperty" => {
                let key = arg(args, 0).to_string();
                Some(Ok(Eval::Value(Value::Bool(o.borrow().contains_key(&key)))))
            }
            _ => None,
        },
        Value::Host(h) => h
            .call_method(interp, name, args)
            .map(|r| r.map(Eval::Value)),
        _ => None,
    }
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

/// Resolve a possibly negative position against `len`, clamped to `0..=len`.
fn relative(v: Option<&Value>, len: usize, default: usize) -> usize {
    match v {
        None | Some(Value::Undefined) => default,
        Some(v) => {
            let n = v.to_number().trunc();
            if n.is_nan() {
                0
            } else if n < 0.0 {
                (len as f64 + n).max(0.0) as usize
            } else {
                (n as usize).min(len)
            }
        }
    }
}

/// Clamp for `substring`: negatives and NaN become 0.
fn clamped(v: Option<&Value>, len: usize, default: usize) -> usize {
    match v {
        None | Some(Value::Undefined) => default,
        Some(v) => {
            let n = v.to_number();
            if n.is_nan() || n <= 0.0 {
                0
            } else {
                (n as usize).min(len)
            }
        }
    }
}

fn char_index(haystack: &str, byte: usize) -> usize {
    haystack[..byte].chars().count()
}

fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_eq(b),
    }
}

fn expects_function(interp: &Interpreter, name: &str) -> Option<Result<Eval, EvalError>> {
    interp.warn(&format!("{name} expects a function argument"));
    Some(Ok(Eval::Failed))
}

// ── Strings ───────────────────────────────────────────────────────────────────

fn string_method(
    interp: &Interpreter,
    s: &str,
    name: &str,
    args: &[Value],
) -> Option<Result<Eval, EvalError>> {
    fn inner(
        interp: &Interpreter,
        s: &str,
        name: &str,
        args: &[Value],
    ) -> Result<Option<Value>, EvalError> {
        let chars = || s.chars().collect::<Vec<char>>();
        Ok(Some(match name {
            "toUpperCase" => Value::Str(s.to_uppercase()),
            "toLowerCase" => Value::Str(s.to_lowercase()),
            "trim" => Value::Str(s.trim().to_owned()),
            "trimStart" => Value::Str(s.trim_start().to_owned()),
            "trimEnd" => Value::Str(s.trim_end().to_owned()),
            "toString" | "valueOf" => Value::Str(s.to_owned()),
            "split" => {
                let limit = match args.get(1) {
                    None | Some(Value::Undefined) => usize::MAX,
                    Some(v) => v.to_uint32() as usize,
                };
                let parts: Vec<Value> = match args.first() {
                    None | Some(Value::Undefined) => vec![Value::Str(s.to_owned())],
                    Some(Value::Regex(re)) => re.regex.split(s).map(Value::from).collect(),
                    Some(sep) => {
                        let sep = sep.to_string();
                        if sep.is_empty() {
                            s.chars().map(|c| Value::Str(c.to_string())).collect()
                        } else {
                            s.split(sep.as_str()).map(Value::from).collect()
                        }
                    }
                };
                Value::array(parts.into_iter().take(limit).collect())
            }
            "includes" => Value::Bool(s.contains(arg(args, 0).to_string().as_str())),
            "startsWith" => Value::Bool(s.starts_with(arg(args, 0).to_string().as_str())),
            "endsWith" => Value::Bool(s.ends_with(arg(args, 0).to_string().as_str())),
            "indexOf" => {
                let needle = arg(args, 0).to_string();
                match s.find(&needle) {
                    Some(b) => Value::from(char_index(s, b)),
                    None => Value::Number(-1.0),
                }
            }
            "charAt" => {
                let i = arg(args, 0).to_number();
                let c = if i >= 0.0 { s.chars().nth(i as usize) } else { None };
                Value::Str(c.map(String::from).unwrap_or_default())
            }
            "at" => {
                let cs = chars();
                let i = arg(args, 0).to_number().trunc();
                let idx = if i < 0.0 { cs.len() as f64 + i } else { i };
                match (idx >= 0.0).then(|| cs.get(idx as usize)).flatten() {
                    Some(c) => Value::Str(c.to_string()),
                    None => Value::Undefined,
                }
            }
            "slice" => {
                let cs = chars();
                let start = relative(args.first(), cs.len(), 0);
                let end = relative(args.get(1), cs.len(), cs.len());
                Value::Str(if start < end {
                    cs[start..end].iter().collect()
                } else {
                    String::new()
                })
            }
            "substring" => {
                let cs = chars();
                let a = clamped(args.first(), cs.len(), 0);
                let b = clamped(args.get(1), cs.len(), cs.len());
                let (start, end) = if a <= b { (a, b) } else { (b, a) };
                Value::Str(cs[start..end].iter().collect())
            }
            "repeat" => {
                let n = arg(args, 0).to_number();
                if !(0.0..=f64::from(u32::MAX)).contains(&n) {
                    return Err(EvalError::native("repeat", format!("invalid count {n}")));
                }
                let n = n as usize;
                if s.chars().count().saturating_mul(n) > MAX_STRING_LENGTH {
                    return Err(EvalError::native("repeat", "Invalid string length"));
                }
                Value::Str(s.repeat(n))
            }
            "padStart" | "padEnd" => {
                let target = arg(args, 0).to_number();
                let fill = match args.get(1) {
                    None | Some(Value::Undefined) => " ".to_owned(),
                    Some(v) => v.to_string(),
                };
                let len = s.chars().count();
                if target > MAX_STRING_LENGTH as f64 {
                    return Err(EvalError::native(name, "Invalid string length"));
                }
                if target.is_nan() || target as usize <= len || fill.is_empty() {
                    Value::Str(s.to_owned())
                } else {
                    let pad: String = fill.chars().cycle().take(target as usize - len).collect();
                    Value::Str(if name == "padStart" {
                        format!("{pad}{s}")
                    } else {
                        format!("{s}{pad}")
                    })
                }
            }
            "concat" => {
                let mut out = s.to_owned();
                for a in args {
                    out.push_str(&a.to_string());
                }
                Value::Str(out)
            }
            "replace" | "replaceAll" => {
                let all = name == "replaceAll";
                return match args.first() {
                    Some(Value::Regex(re)) => {
                        let global = all || re.is_global();
                        replace_regex(interp, s, re, global, &arg(args, 1)).map(Some)
                    }
                    _ => {
                        let pattern = arg(args, 0).to_string();
                        replace_str(interp, s, &pattern, all, &arg(args, 1)).map(Some)
                    }
                };
            }
            _ => return Ok(None),
        }))
    }
    inner(interp, s, name, args)
        .transpose()
        .map(|r| r.map(Eval::Value))
}

/// `$&` is the whole match in a replacement template; the regex crate
/// spells it `${0}`.
fn replacement_template(template: &str) -> String {
    template.replace("$&", "${0}")
}

fn replace_regex(
    interp: &Interpreter,
    s: &str,
    re: &JsRegex,
    global: bool,
    replacement: &Value,
) -> Result<Value, EvalError> {
    let limit = if global { usize::MAX } else { 1 };
    let template = replacement_template(&replacement.to_string());
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for caps in re.regex.captures_iter(s).take(limit) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&s[last..whole.start()]);
        match replacement.as_function() {
            Some(f) => {
                let mut call_args: Vec<Value> = caps
                    .iter()
                    .map(|m| m.map_or(Value::Undefined, |m| Value::from(m.as_str())))
                    .collect();
                call_args.push(Value::from(char_index(s, whole.start())));
                call_args.push(Value::from(s));
                let v = interp.call_function(f, None, &call_args)?.into_value();
                out.push_str(&v.to_string());
            }
            None => caps.expand(&template, &mut out),
        }
        last = whole.end();
    }
    out.push_str(&s[last..]);
    Ok(Value::Str(out))
}

fn replace_str(
    interp: &Interpreter,
    s: &str,
    pattern: &str,
    all: bool,
    replacement: &Value,
) -> Result<Value, EvalError> {
    let limit = if all { usize::MAX } else { 1 };
    let mut out = String::with_capacity(s.len());
    let mut last = 0;
    for (start, matched) in s.match_indices(pattern).take(limit) {
        out.push_str(&s[last..start]);
        let piece = match replacement.as_function() {
            Some(f) => interp
                .call_function(
                    f,
                    None,
                    &[
                        Value::from(matched),
                        Value::from(char_index(s, start)),
                        Value::from(s),
                    ],
                )?
                .into_value()
                .to_string(),
            None => replacement.to_string().replace("$&", matched),
        };
        out.push_str(&piece);
        last = start + matched.len();
    }
    out.push_str(&s[last..]);
    Ok(Value::Str(out))
}

// ── Arrays ────────────────────────────────────────────────────────────────────

fn array_method(
    interp: &Interpreter,
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Option<Result<Eval, EvalError>> {
    let Value::Array(cell) = receiver else {
        return None;
    };
    // Callbacks may touch the array, so they see a copy.
    let items = || cell.borrow().clone();
    let value = |v: Value| Some(Ok(Eval::Value(v)));

    match name {
        "join" | "toString" => {
            let sep = match args.first() {
                Some(v) if name == "join" && !matches!(v, Value::Undefined) => v.to_string(),
                _ => ",".to_owned(),
            };
            value(Value::Str(join(&items(), &sep)))
        }
        "includes" => {
            let needle = arg(args, 0);
            value(Value::Bool(items().iter().any(|v| same_value_zero(v, &needle))))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            value(match items().iter().position(|v| v.strict_eq(&needle)) {
                Some(i) => Value::from(i),
                None => Value::Number(-1.0),
            })
        }
        "at" => {
            let all = items();
            let i = arg(args, 0).to_number().trunc();
            let idx = if i < 0.0 { all.len() as f64 + i } else { i };
            value(
                (idx >= 0.0)
                    .then(|| all.get(idx as usize).cloned())
                    .flatten()
                    .unwrap_or_default(),
            )
        }
        "push" => {
            let mut a = cell.borrow_mut();
            a.extend(args.iter().cloned());
            value(Value::from(a.len()))
        }
        "pop" => value(cell.borrow_mut().pop().unwrap_or_default()),
        "shift" => {
            let mut a = cell.borrow_mut();
            value(if a.is_empty() {
                Value::Undefined
            } else {
                a.remove(0)
            })
        }
        "slice" => {
            let all = items();
            let start = relative(args.first(), all.len(), 0);
            let end = relative(args.get(1), all.len(), all.len());
            value(Value::array(if start < end {
                all[start..end].to_vec()
            } else {
                Vec::new()
            }))
        }
        "concat" => {
            let mut out = items();
            for a in args {
                match a {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            value(Value::array(out))
        }
        "reverse" => {
            cell.borrow_mut().reverse();
            value(receiver.clone())
        }
        "some" | "find" | "findIndex" => {
            let Some(f) = args.first().and_then(Value::as_function) else {
                return expects_function(interp, name);
            };
            Some(search(interp, f, receiver, items(), name))
        }
        "reduce" => {
            let Some(f) = args.first().and_then(Value::as_function) else {
                return expects_function(interp, name);
            };
            Some(reduce(interp, f, receiver, items(), args.get(1)))
        }
        _ => None,
    }
}

fn join(items: &[Value], sep: &str) -> String {
    items
        .iter()
        .map(|v| match v {
            Value::Undefined | Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(sep)
}

fn search(
    interp: &Interpreter,
    f: &Function,
    receiver: &Value,
    items: Vec<Value>,
    name: &str,
) -> Result<Eval, EvalError> {
    for (i, item) in items.into_iter().enumerate() {
        let hit = interp
            .call_function(f, None, &[item.clone(), Value::from(i), receiver.clone()])?
            .into_value()
            .truthy();
        if hit {
            return Ok(Eval::Value(match name {
                "some" => Value::Bool(true),
                "findIndex" => Value::from(i),
                _ => item,
            }));
        }
    }
    Ok(Eval::Value(match name {
        "some" => Value::Bool(false),
        "findIndex" => Value::Number(-1.0),
        _ => Value::Undefined,
    }))
}

fn reduce(
    interp: &Interpreter,
    f: &Function,
    receiver: &Value,
    items: Vec<Value>,
    init: Option<&Value>,
) -> Result<Eval, EvalError> {
    let mut iter = items.into_iter().enumerate();
    let mut acc = match init {
        Some(v) => v.clone(),
        None => match iter.next() {
            Some((_, first)) => first,
            None => {
                return Err(EvalError::native(
                    "reduce",
                    "reduce of empty array with no initial value",
                ))
            }
        },
    };
    for (i, item) in iter {
        acc = interp
            .call_function(f, None, &[acc, item, Value::from(i), receiver.clone()])?
            .into_value();
    }
    Ok(Eval::Value(acc))
}

// ── Numbers ───────────────────────────────────────────────────────────────────

fn number_method(n: f64, name: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0.0 } else { digits.trunc() };
            if !(0.0..=100.0).contains(&digits) {
                return Some(Err(EvalError::native(
                    "toFixed",
                    format!("digits argument {digits} out of range"),
                )));
            }
            Some(Ok(Value::Str(if n.is_finite() && n.abs() < 1e21 {
                format!("{n:.*}", digits as usize)
            } else {
                format_number(n)
            })))
        }
        "toString" => {
            let radix = match args.first() {
                None | Some(Value::Undefined) => 10.0,
                Some(v) => v.to_number().trunc(),
            };
            if !(2.0..=36.0).contains(&radix) {
                return Some(Err(EvalError::native(
                    "toString",
                    format!("radix {radix} out of range"),
                )));
            }
            Some(Ok(Value::Str(to_radix(n, radix as u32))))
        }
        "valueOf" => Some(Ok(Value::Number(n))),
        _ => None,
    }
}

/// Integral values print in `radix`; everything else falls back to decimal.
fn to_radix(n: f64, radix: u32) -> String {
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 || n.abs() >= 9.007_199_254_740_992e15 {
        return format_number(n);
    }
    let mut magnitude = n.abs() as u64;
    if magnitude == 0 {
        return "0".to_owned();
    }
    let mut digits = Vec::new();
    while magnitude > 0 {
        let d = (magnitude % u64::from(radix)) as u32;
        digits.push(char::from_digit(d, radix).unwrap_or('?'));
        magnitude /= u64::from(radix);
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
