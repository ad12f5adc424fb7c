//! Host objects: opaque values supplied by the embedding program.
//!
//! A host type implements [`HostObject`] to expose properties and methods to
//! scripts, and may register operator handlers with the
//! [`OperatorRegistry`](super::ops::OperatorRegistry) to take part in
//! arithmetic.  [`Date`] is the one host type the crate ships itself.

use std::any::Any;
use std::rc::Rc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Timelike, Utc};

use super::error::EvalError;
use super::value::{Map, Value};
use super::walker::Interpreter;

/// Behaviour a host-supplied value exposes to the interpreter.
///
/// Everything but [`type_name`](Self::type_name) and [`as_any`](Self::as_any)
/// has a default, so a type only overrides what it supports.
pub trait HostObject {
    /// Name used in diagnostics and `Debug` output.
    fn type_name(&self) -> &str;

    /// Type identity; the operator registry keys handler tables on
    /// `as_any().type_id()`.
    fn as_any(&self) -> &dyn Any;

    /// Property read (`obj.key`, `obj[key]`).
    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    /// Property write.  Returns `false` when the property cannot be set.
    fn set(&self, _key: &str, _value: Value) -> bool {
        false
    }

    /// Method call (`obj.name(args)`).  `None` means no such method.
    fn call_method(
        &self,
        _interp: &Interpreter,
        _name: &str,
        _args: &[Value],
    ) -> Option<Result<Value, EvalError>> {
        None
    }

    fn to_number(&self) -> f64 {
        f64::NAN
    }

    /// Date/time values opt out of native `+`/`-` between equal types.
    fn is_date(&self) -> bool {
        false
    }

    /// Copy used by unary `+` when the type registers no approve handler.
    fn duplicate(&self) -> Option<Rc<dyn HostObject>> {
        None
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::String(self.display())
    }

    fn display(&self) -> String {
        format!("[object {}]", self.type_name())
    }

    fn equals(&self, _other: &dyn HostObject) -> bool {
        false
    }
}

// ── Date ──────────────────────────────────────────────────────────────────────

/// Point in time, UTC.  `None` is an invalid date.
#[derive(Debug, Clone, PartialEq)]
pub struct Date {
    time: Option<DateTime<Utc>>,
}

impl Date {
    pub fn now() -> Self {
        Date { time: Some(Utc::now()) }
    }

    pub fn from_millis(ms: f64) -> Self {
        let time = if ms.is_finite() {
            Utc.timestamp_millis_opt(ms.trunc() as i64).single()
        } else {
            None
        };
        Date { time }
    }

    /// Parse an RFC 3339 timestamp, a bare `YYYY-MM-DD` date, or a
    /// `YYYY-MM-DDTHH:MM:SS` local time (read as UTC).
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        let time = DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|t| t.and_utc())
            })
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|t| t.and_utc())
            });
        Date { time }
    }

    /// Build from the arguments of `new Date(...)`.
    pub fn construct(args: &[Value]) -> Self {
        match args.first() {
            None => Date::now(),
            Some(Value::Str(s)) => Date::parse(s),
            Some(Value::Host(h)) => match h.as_any().downcast_ref::<Date>() {
                Some(d) => d.clone(),
                None => Date::from_millis(h.to_number()),
            },
            Some(other) => Date::from_millis(other.to_number()),
        }
    }

    pub fn millis(&self) -> f64 {
        self.time.map_or(f64::NAN, |t| t.timestamp_millis() as f64)
    }

    pub fn to_iso_string(&self) -> Option<String> {
        self.time
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    fn field(&self, f: impl Fn(&DateTime<Utc>) -> f64) -> Value {
        Value::Number(self.time.as_ref().map_or(f64::NAN, f))
    }
}

impl HostObject for Date {
    fn type_name(&self) -> &str {
        "Date"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn call_method(
        &self,
        _interp: &Interpreter,
        name: &str,
        _args: &[Value],
    ) -> Option<Result<Value, EvalError>> {
        let value = match name {
            "getTime" | "valueOf" => Value::Number(self.millis()),
            "toISOString" | "toJSON" => match self.to_iso_string() {
                Some(s) => Value::Str(s),
                None => return Some(Err(EvalError::native("toISOString", "Invalid time value"))),
            },
            "toString" => Value::Str(self.display()),
            "getFullYear" => self.field(|t| f64::from(t.year())),
            "getMonth" => self.field(|t| f64::from(t.month0())),
            "getDate" => self.field(|t| f64::from(t.day())),
            "getDay" => self.field(|t| f64::from(t.weekday().num_days_from_sunday())),
            "getHours" => self.field(|t| f64::from(t.hour())),
            _ => return None,
        };
        Some(Ok(value))
    }

    fn to_number(&self) -> f64 {
        self.millis()
    }

    fn is_date(&self) -> bool {
        true
    }

    fn duplicate(&self) -> Option<Rc<dyn HostObject>> {
        Some(Rc::new(self.clone()))
    }

    fn to_json(&self) -> serde_json::Value {
        self.to_iso_string()
            .map_or(serde_json::Value::Null, serde_json::Value::String)
    }

    fn display(&self) -> String {
        self.to_iso_string()
            .unwrap_or_else(|| "Invalid Date".to_owned())
    }

    fn equals(&self, other: &dyn HostObject) -> bool {
        other
            .as_any()
            .downcast_ref::<Date>()
            .is_some_and(|d| d == self)
    }
}

// ── Prelude ───────────────────────────────────────────────────────────────────

/// Bindings every script may rely on: currently the `Date` constructor.
pub fn prelude() -> Map {
    let mut map = Map::new();
    map.insert(
        "Date".into(),
        Value::native("Date", |_, args| Ok(Value::host(Date::construct(args)))),
    );
    map
}

// ── Tests ─────────────────────────────────────────────────────────────────────
