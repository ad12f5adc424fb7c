//! Reusable transformers built on [`transform`](super::transform).

use std::fmt;
use std::rc::Rc;

use super::{bindings_for, transform};
use crate::script::{EvalError, Interpreter, Map, Value};

/// Anything that maps a source object to a new value.
pub trait Transform {
    fn transform(&self, interp: &Interpreter, source: &Value, context: &Map)
        -> Result<Value, EvalError>;
}

// ── Transformer ───────────────────────────────────────────────────────────────

/// A transformation with a default context.  Call-site context entries win
/// over the defaults.
#[derive(Debug, Clone)]
pub struct Transformer {
    pub transformation: Value,
    pub default_context: Map,
}

impl Default for Transformer {
    fn default() -> Self {
        Transformer::new(Value::object(Map::new()))
    }
}

impl Transformer {
    pub fn new(transformation: Value) -> Self {
        Transformer {
            transformation,
            default_context: Map::new(),
        }
    }

    pub fn with_default_context(mut self, context: Map) -> Self {
        self.default_context = context;
        self
    }

    fn context(&self, context: &Map) -> Map {
        let mut merged = self.default_context.clone();
        merged.extend(context.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }
}

impl Transform for Transformer {
    fn transform(
        &self,
        interp: &Interpreter,
        source: &Value,
        context: &Map,
    ) -> Result<Value, EvalError> {
        transform(interp, source, &self.transformation, &self.context(context))
    }
}

// ── Conditions ────────────────────────────────────────────────────────────────

pub type Predicate = Rc<dyn Fn(&Value, &Map) -> bool>;

/// When a [`ConditionalTransformer`] applies.
#[derive(Clone, Default)]
pub enum Condition {
    #[default]
    Always,
    /// Host-side test of `(source, context)`.
    Predicate(Predicate),
    /// Script evaluated against the same bindings template expressions see;
    /// the condition holds when the result is truthy.
    Expression(String),
}

impl Condition {
    pub fn predicate(f: impl Fn(&Value, &Map) -> bool + 'static) -> Self {
        Condition::Predicate(Rc::new(f))
    }

    pub fn expression(src: impl Into<String>) -> Self {
        Condition::Expression(src.into())
    }

    pub fn matches(
        &self,
        interp: &Interpreter,
        source: &Value,
        context: &Map,
    ) -> Result<bool, EvalError> {
        Ok(match self {
            Condition::Always => true,
            Condition::Predicate(f) => f(source, context),
            Condition::Expression(src) => {
                let mut bindings = bindings_for(source, context);
                interp.eval(src, &mut bindings)?.truthy()
            }
        })
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => f.write_str("Always"),
            Condition::Predicate(_) => f.write_str("Predicate(..)"),
            Condition::Expression(src) => f.debug_tuple("Expression").field(src).finish(),
        }
    }
}

// ── ConditionalTransformer ────────────────────────────────────────────────────

/// Applies its transformer only when the condition holds; otherwise the
/// result is a deep copy of the source.
#[derive(Debug, Clone, Default)]
pub struct ConditionalTransformer {
    pub condition: Condition,
    pub transformer: Transformer,
}

impl ConditionalTransformer {
    pub fn new(condition: Condition, transformer: Transformer) -> Self {
        ConditionalTransformer {
            condition,
            transformer,
        }
    }

    pub fn matches(
        &self,
        interp: &Interpreter,
        source: &Value,
        context: &Map,
    ) -> Result<bool, EvalError> {
        self.condition.matches(interp, source, context)
    }
}

impl Transform for ConditionalTransformer {
    fn transform(
        &self,
        interp: &Interpreter,
        source: &Value,
        context: &Map,
    ) -> Result<Value, EvalError> {
        if self.matches(interp, source, context)? {
            self.transformer.transform(interp, source, context)
        } else {
            Ok(source.deep_clone())
        }
    }
}

// ── SwitchTransformer ─────────────────────────────────────────────────────────

/// Ordered options; the first whose condition holds transforms the source.
/// With no match the fallback runs, and without a fallback the source is
/// copied.
#[derive(Debug, Clone, Default)]
pub struct SwitchTransformer {
    options: Vec<ConditionalTransformer>,
    fallback: Option<Transformer>,
}

impl SwitchTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(mut self, fallback: Transformer) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn add_option(
        &mut self,
        condition: Condition,
        transformation: Value,
        default_context: Map,
    ) -> &mut Self {
        self.options.push(ConditionalTransformer::new(
            condition,
            Transformer::new(transformation).with_default_context(default_context),
        ));
        self
    }

    pub fn options(&self) -> &[ConditionalTransformer] {
        &self.options
    }

    pub fn fallback(&self) -> Option<&Transformer> {
        self.fallback.as_ref()
    }
}

impl Transform for SwitchTransformer {
    fn transform(
        &self,
        interp: &Interpreter,
        source: &Value,
        context: &Map,
    ) -> Result<Value, EvalError> {
        for (i, option) in self.options.iter().enumerate() {
            if option.matches(interp, source, context)? {
                tracing::trace!(target: "ponzu::transform", option = i, "option matched");
                return option.transformer.transform(interp, source, context);
            }
        }
        match &self.fallback {
            Some(fallback) => fallback.transform(interp, source, context),
            None => Ok(source.deep_clone()),
        }
    }
}

// ── TwoWaysTransformer ────────────────────────────────────────────────────────

/// A pair of transformers for the two directions of a mapping.
#[derive(Debug, Clone, Default)]
pub struct TwoWaysTransformer<I, O> {
    pub inbound: I,
    pub outbound: O,
}

impl<I: Transform, O: Transform> TwoWaysTransformer<I, O> {
    pub fn new(inbound: I, outbound: O) -> Self {
        TwoWaysTransformer { inbound, outbound }
    }

    pub fn transform_in(
        &self,
        interp: &Interpreter,
        source: &Value,
        context: &Map,
    ) -> Result<Value, EvalError> {
        self.inbound.transform(interp, source, context)
    }

    pub fn transform_out(
        &self,
        interp: &Interpreter,
        source: &Value,
        context: &Map,
    ) -> Result<Value, EvalError> {
        self.outbound.transform(interp, source, context)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
