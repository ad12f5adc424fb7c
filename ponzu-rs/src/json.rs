//! Conversion between script values and `serde_json` values.
//!
//! JSON has no `undefined`, functions or regexes.  Going out, `undefined`
//! and functions are dropped from objects and become `null` inside arrays,
//! regexes print as their literal, and host objects use
//! [`HostObject::to_json`](crate::script::HostObject::to_json).  Integral
//! numbers are written as JSON integers.

use serde_json::Value as Json;

use crate::script::{Map, Value};

pub fn from_json(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        Json::String(s) => Value::Str(s.clone()),
        Json::Array(items) => Value::array(items.iter().map(from_json).collect()),
        Json::Object(map) => Value::object(
            map.iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect(),
        ),
    }
}

/// A JSON object as a binding map; any other JSON yields `None`.
pub fn map_from_json(json: &Json) -> Option<Map> {
    match from_json(json) {
        Value::Object(map) => Some(map.borrow().clone()),
        _ => None,
    }
}

fn skipped(v: &Value) -> bool {
    matches!(v, Value::Undefined | Value::Function(_))
}

pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Undefined | Value::Null | Value::Function(_) => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => number(*n),
        Value::Str(s) => Json::String(s.clone()),
        Value::Array(items) => Json::Array(items.borrow().iter().map(to_json).collect()),
        Value::Object(map) => Json::Object(
            map.borrow()
                .iter()
                .filter(|(_, v)| !skipped(v))
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
        Value::Regex(_) => Json::String(value.to_string()),
        Value::Host(h) => h.to_json(),
    }
}

fn number(n: f64) -> Json {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE {
        return Json::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(Json::Null, Json::Number)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_numbers_stay_integers() {
        assert_eq!(to_json(&Value::from(45)), json!(45));
        assert_eq!(to_json(&Value::from(45.4)), json!(45.4));
        assert_eq!(to_json(&Value::Number(f64::NAN)), Json::Null);
        assert_eq!(to_json(&Value::Number(-0.0)), json!(0));
    }

    #[test]
    fn undefined_is_dropped_from_objects_only() {
        let mut map = Map::new();
        map.insert("a".into(), Value::Undefined);
        map.insert("b".into(), Value::array(vec![Value::Undefined, 1.into()]));
        assert_eq!(to_json(&Value::object(map)), json!({"b": [null, 1]}));
    }

    #[test]
    fn objects_keep_key_order() {
        let v = from_json(&json!({"z": 1, "a": 2}));
        let Value::Object(map) = &v else {
            panic!("expected object")
        };
        let keys: Vec<String> = map.borrow().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
        assert_eq!(to_json(&v).to_string(), r#"{"z":1,"a":2}"#);
    }

    #[test]
    fn map_from_json_requires_object() {
        assert!(map_from_json(&json!([1])).is_none());
        assert_eq!(map_from_json(&json!({"a": 1})).map(|m| m.len()), Some(1));
    }
}
