//! Object paths: `a.b[0].c`.
//!
//! A path is a dotted list of keys where `[n]` addresses an array slot.
//! [`tokens`] keeps the raw pieces (`"[0]"`, `"a"`); [`segments`] types them.

use crate::script::value::MAX_ARRAY_LENGTH;
use crate::script::Value;

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

/// Raw path tokens: `"[0].a[1].b"` → `["[0]", "a", "[1]", "b"]`.
/// A bracket group other than `[digits]` reads as a plain key.
pub fn tokens(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut key = String::new();
    let mut chars = path.chars().peekable();
    let flush = |key: &mut String, out: &mut Vec<String>| {
        if !key.is_empty() {
            out.push(std::mem::take(key));
        }
    };
    while let Some(c) = chars.next() {
        match c {
            '.' | ']' => flush(&mut key, &mut out),
            '[' => {
                flush(&mut key, &mut out);
                let mut digits = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    digits.push(d);
                    chars.next();
                }
                if !digits.is_empty() && chars.peek() == Some(&']') {
                    chars.next();
                    out.push(format!("[{digits}]"));
                } else {
                    key = digits;
                }
            }
            other => key.push(other),
        }
    }
    flush(&mut key, &mut out);
    out
}

pub fn segments(path: &str) -> Vec<PathSegment> {
    tokens(path)
        .into_iter()
        .map(|t| {
            t.strip_prefix('[')
                .and_then(|s| s.strip_suffix(']'))
                .and_then(|n| n.parse().ok())
                .map_or_else(|| PathSegment::Key(t.clone()), PathSegment::Index)
        })
        .collect()
}

fn child(node: &Value, seg: &PathSegment) -> Value {
    match (node, seg) {
        (Value::Array(items), PathSegment::Index(i)) => {
            items.borrow().get(*i).cloned().unwrap_or_default()
        }
        (Value::Object(map), PathSegment::Index(i)) => {
            map.borrow().get(&i.to_string()).cloned().unwrap_or_default()
        }
        (Value::Object(map), PathSegment::Key(k)) => map.borrow().get(k).cloned().unwrap_or_default(),
        (Value::Array(items), PathSegment::Key(k)) => match k.parse::<usize>() {
            Ok(i) => items.borrow().get(i).cloned().unwrap_or_default(),
            Err(_) => Value::Undefined,
        },
        _ => Value::Undefined,
    }
}

/// Value at `path` inside `root`; `undefined` when any step is missing.
/// The empty path is `root` itself.
pub fn get_at_path(root: &Value, path: &str) -> Value {
    segments(path)
        .iter()
        .fold(root.clone(), |node, seg| child(&node, seg))
}

fn put(node: &Value, seg: &PathSegment, value: Value) -> bool {
    match (node, seg) {
        (Value::Array(items), PathSegment::Index(i)) => {
            let mut items = items.borrow_mut();
            if *i >= items.len() {
                items.resize(i + 1, Value::Undefined);
            }
            items[*i] = value;
            true
        }
        (Value::Object(map), PathSegment::Index(i)) => {
            map.borrow_mut().insert(i.to_string(), value);
            true
        }
        (Value::Object(map), PathSegment::Key(k)) => {
            map.borrow_mut().insert(k.clone(), value);
            true
        }
        _ => false,
    }
}

/// Write `value` at `path` inside `root`, creating missing intermediate
/// containers: an array when the next step is an index, an object otherwise.
///
/// Scalars met on the way are replaced.  Returns `false` for an empty path,
/// a root that cannot hold the first step, or an index at or past
/// [`MAX_ARRAY_LENGTH`]; nothing is written then.
pub fn set_at_path_mut(root: &Value, path: &str, value: Value) -> bool {
    let segs = segments(path);
    let Some((last, init)) = segs.split_last() else {
        return false;
    };
    if segs
        .iter()
        .any(|s| matches!(s, PathSegment::Index(i) if *i >= MAX_ARRAY_LENGTH))
    {
        return false;
    }
    let mut node = root.clone();
    for (i, seg) in init.iter().enumerate() {
        let mut next = child(&node, seg);
        if !next.is_composite() {
            next = match segs[i + 1] {
                PathSegment::Index(_) => Value::array(Vec::new()),
                PathSegment::Key(_) => Value::object(Default::default()),
            };
            if !put(&node, seg, next.clone()) {
                return false;
            }
        }
        node = next;
    }
    put(&node, last, value)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
