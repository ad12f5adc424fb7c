//! Declarative object transformation.
//!
//! A *transformation* is a template value.  [`transform`] copies it and
//! replaces every string leaf that starts with `@` by the result of
//! evaluating the rest of the string as a script, with the source object's
//! fields, the context and `$` (an untouched copy of the source) in scope.
//! `@@` escapes a literal `@`.
//!
//! ```rust
//! use ponzu::json::{from_json, to_json};
//! use ponzu::script::{Interpreter, Map};
//! use ponzu::transform::transform;
//! use serde_json::json;
//!
//! let interp = Interpreter::new();
//! let source = from_json(&json!({"name": "Ada", "age": 36}));
//! let template = from_json(&json!({"who": "@name", "next": "@age + 1", "tag": "@@me"}));
//! let out = transform(&interp, &source, &template, &Map::new()).unwrap();
//! assert_eq!(to_json(&out), json!({"who": "Ada", "next": 37, "tag": "@me"}));
//! ```
//!
//! A result object may carry an `__apply__` list of directives
//! `{ "pipe": [names…], "paths": [paths…] }`.  The named context functions
//! are composed left to right and applied to the whole result, or to each
//! path within it.  The directives still see the key; it is dropped from
//! the final result.

mod transformer;

pub use transformer::{
    Condition, ConditionalTransformer, SwitchTransformer, Transform, Transformer,
    TwoWaysTransformer,
};

use tracing::debug;

use crate::path::{get_at_path, set_at_path_mut};
use crate::script::{EvalError, Function, Interpreter, Map, Value};

/// Reserved result key holding post-processing directives.
pub const APPLY_FIELD: &str = "__apply__";

/// Bindings a template expression sees: `{...source, ...context, $: source}`.
pub fn bindings_for(source: &Value, context: &Map) -> Map {
    let mut bindings = Map::new();
    if let Value::Object(fields) = source {
        bindings.extend(fields.borrow().iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    bindings.extend(context.iter().map(|(k, v)| (k.clone(), v.clone())));
    bindings.insert("$".into(), source.deep_clone());
    bindings
}

/// Instantiate `template` against `source` and `context`.
pub fn transform(
    interp: &Interpreter,
    source: &Value,
    template: &Value,
    context: &Map,
) -> Result<Value, EvalError> {
    debug!(target: "ponzu::transform", "transforming");
    let result = substitute(interp, template.deep_clone(), source, context)?;
    apply_directives(interp, result, context)
}

fn substitute(
    interp: &Interpreter,
    node: Value,
    source: &Value,
    context: &Map,
) -> Result<Value, EvalError> {
    match &node {
        Value::Array(items) => {
            let len = items.borrow().len();
            for i in 0..len {
                let item = items.borrow()[i].clone();
                let out = substitute(interp, item, source, context)?;
                items.borrow_mut()[i] = out;
            }
        }
        Value::Object(fields) => {
            let keys: Vec<String> = fields.borrow().keys().cloned().collect();
            for key in keys {
                let item = fields.borrow().get(&key).cloned().unwrap_or_default();
                let out = substitute(interp, item, source, context)?;
                fields.borrow_mut().insert(key, out);
            }
        }
        Value::Str(s) => {
            if let Some(rest) = s.strip_prefix("@@") {
                return Ok(Value::Str(format!("@{rest}")));
            }
            if let Some(expr) = s.strip_prefix('@') {
                let mut bindings = bindings_for(source, context);
                return interp.eval(expr, &mut bindings);
            }
        }
        _ => {}
    }
    Ok(node)
}

fn apply_directives(
    interp: &Interpreter,
    mut result: Value,
    context: &Map,
) -> Result<Value, EvalError> {
    let directives = match &result {
        Value::Object(fields) => match fields.borrow().get(APPLY_FIELD).cloned() {
            Some(Value::Array(list)) => list.borrow().clone(),
            Some(single @ Value::Object(_)) => vec![single],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    for directive in &directives {
        let Value::Object(fields) = directive else {
            continue;
        };
        let (pipe, paths) = {
            let fields = fields.borrow();
            (
                fields.get("pipe").cloned().unwrap_or_default(),
                fields.get("paths").cloned(),
            )
        };
        let fns = resolve_pipe(&pipe, context);
        if fns.is_empty() {
            continue;
        }
        match paths {
            Some(Value::Array(paths)) => {
                for path in paths.borrow().iter().map(Value::to_string) {
                    let current = get_at_path(&result, &path);
                    let out = run_pipe(interp, &fns, current)?;
                    set_at_path_mut(&result, &path, out);
                }
            }
            _ => result = run_pipe(interp, &fns, result)?,
        }
    }

    if let Value::Object(fields) = &result {
        fields.borrow_mut().shift_remove(APPLY_FIELD);
    }
    Ok(result)
}

/// Context functions named by `pipe`; unknown names and non-functions are
/// skipped.
fn resolve_pipe(pipe: &Value, context: &Map) -> Vec<Function> {
    let names: Vec<String> = match pipe {
        Value::Array(names) => names.borrow().iter().map(Value::to_string).collect(),
        Value::Str(name) => vec![name.clone()],
        _ => Vec::new(),
    };
    names
        .iter()
        .filter_map(|name| context.get(name).and_then(Value::as_function).cloned())
        .collect()
}

fn run_pipe(interp: &Interpreter, fns: &[Function], input: Value) -> Result<Value, EvalError> {
    fns.iter().try_fold(input, |acc, f| -> Result<Value, EvalError> {
        Ok(interp.call_function(f, None, &[acc])?.into_value())
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
