//! Tree-walking evaluator.
//!
//! [`Interpreter::eval`] parses a script, seeds a scope from a caller-owned
//! [`Map`], walks every statement and writes the final bindings back into
//! the map.  The value of the script is the value of its last statement.
//!
//! Nodes that cannot be applied (a member of `null`, a call of a non-function,
//! an unsupported operator) do not raise.  They yield [`Eval::Failed`],
//! report through the interpreter's [`Diagnostics`] sink and let the
//! evaluation continue; the enclosing statement then counts as `undefined`.
//! Only binding violations, parse errors and native failures abort with an
//! [`EvalError`].

use std::cell::Cell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use super::ast::{
    Argument, ArrayItem, AssignOp, AssignTarget, BinaryOp, DeclKind, Declarator, Expr,
    FunctionBody, Literal, LogicalOp, MemberProp, Pattern, PatternElem, PropKey, Property, Stmt,
    UnaryOp,
};
use super::builtins;
use super::diag::{Diagnostics, TracingDiagnostics};
use super::error::EvalError;
use super::host::prelude;
use super::ops::{self, OperatorRegistry};
use super::parser::parse;
use super::scope::{detach, Scope};
use super::stack::ensure_sufficient_stack;
use super::value::{Captured, Closure, Function, JsRegex, Map, Value, MAX_ARRAY_LENGTH};

/// Calls nested deeper than this abort the evaluation.
pub const MAX_CALL_DEPTH: usize = 100;

/// Result of walking one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Eval {
    Value(Value),
    /// The node could not be applied; a diagnostic has been reported.
    Failed,
}

impl Eval {
    /// The value, with a failure read as `undefined`.
    pub fn into_value(self) -> Value {
        match self {
            Eval::Value(v) => v,
            Eval::Failed => Value::Undefined,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Eval::Failed)
    }
}

impl From<Value> for Eval {
    fn from(v: Value) -> Self {
        Eval::Value(v)
    }
}

/// Statement completion.
enum Flow {
    Normal(Eval),
    Return(Eval),
}

/// Member/call chain link.  `Short` is an optional link that met a nullish
/// base; the rest of the chain is skipped and the chain reads `undefined`.
enum Link {
    Value(Value),
    Failed,
    Short,
}

impl From<Eval> for Link {
    fn from(e: Eval) -> Self {
        match e {
            Eval::Value(v) => Link::Value(v),
            Eval::Failed => Link::Failed,
        }
    }
}

impl Link {
    fn into_eval(self) -> Eval {
        match self {
            Link::Value(v) => Eval::Value(v),
            Link::Failed => Eval::Failed,
            Link::Short => Eval::Value(Value::Undefined),
        }
    }
}

/// Assignable location.
enum Place<'a> {
    Name(&'a str),
    Property(Value, Value),
}

/// Unwrap an [`Eval`], returning `Ok(Eval::Failed)` from the enclosing
/// function on failure.
macro_rules! value {
    ($e:expr) => {
        match $e {
            Eval::Value(v) => v,
            Eval::Failed => return Ok(Eval::Failed),
        }
    };
}

// ── Interpreter ───────────────────────────────────────────────────────────────

/// Evaluator state shared by every script run through it: the operator
/// registry, the global bindings (`Date`, host functions) and the
/// diagnostics sink.
pub struct Interpreter {
    registry: OperatorRegistry,
    globals: Map,
    diagnostics: Rc<dyn Diagnostics>,
    depth: Cell<usize>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("registry", &self.registry)
            .field("globals", &self.globals.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Interpreter {
    /// Interpreter reporting soft failures through `tracing`.
    pub fn new() -> Self {
        Self::with_diagnostics(Rc::new(TracingDiagnostics))
    }

    pub fn with_diagnostics(diagnostics: Rc<dyn Diagnostics>) -> Self {
        Interpreter {
            registry: OperatorRegistry::new(),
            globals: prelude(),
            diagnostics,
            depth: Cell::new(0),
        }
    }

    pub fn operators(&self) -> &OperatorRegistry {
        &self.registry
    }

    pub fn operators_mut(&mut self) -> &mut OperatorRegistry {
        &mut self.registry
    }

    /// Bindings visible to every script without being written back to the
    /// caller's map.
    pub fn globals(&self) -> &Map {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut Map {
        &mut self.globals
    }

    /// Report a soft failure.
    pub fn warn(&self, message: &str) {
        self.diagnostics.warn(message);
    }

    /// Fresh scope whose parent holds the globals.  Keep it across several
    /// [`eval_scope`](Self::eval_scope) calls to share bindings between them.
    pub fn global_scope(&self) -> Scope {
        Scope::from_bindings(&self.globals).child()
    }

    /// Run `src` against `bindings`.
    ///
    /// On success the map mirrors the script's top-level bindings: new
    /// declarations are added and updated values written back.  On error
    /// the map keeps its previous entries.
    pub fn eval(&self, src: &str, bindings: &mut Map) -> Result<Value, EvalError> {
        let scope = self.global_scope();
        scope.seed(bindings);
        let value = self.eval_scope(src, &scope)?;
        scope.finalize(bindings);
        Ok(value)
    }

    /// Run `src` in an existing scope.
    pub fn eval_scope(&self, src: &str, scope: &Scope) -> Result<Value, EvalError> {
        let program = parse(src)?;
        debug!(target: "ponzu::walk", statements = program.len(), "evaluating script");
        let mut last = Value::Undefined;
        for stmt in &program {
            match self.exec(stmt, scope)? {
                Flow::Normal(e) => last = e.into_value(),
                Flow::Return(e) => {
                    last = e.into_value();
                    break;
                }
            }
        }
        Ok(detach(&last, scope))
    }

    /// Call `f` with `this` bound to `this` (ignored by arrows and natives).
    pub fn call_function(
        &self,
        f: &Function,
        this: Option<Value>,
        args: &[Value],
    ) -> Result<Eval, EvalError> {
        let depth = self.depth.get();
        if depth >= MAX_CALL_DEPTH {
            return Err(EvalError::CallDepth(MAX_CALL_DEPTH));
        }
        self.depth.set(depth + 1);
        let result = ensure_sufficient_stack(|| match f {
            Function::Native(n) => (n.body)(self, args).map(Eval::Value),
            Function::Closure(c) => self.invoke(c, this, args).map(|flow| match flow {
                Flow::Normal(e) | Flow::Return(e) => e,
            }),
        });
        self.depth.set(depth);
        result
    }

    /// Call any value; a non-function reports and yields `undefined`.
    pub fn call_value(&self, callee: &Value, args: &[Value]) -> Result<Value, EvalError> {
        match callee.as_function() {
            Some(f) => Ok(self.call_function(f, None, args)?.into_value()),
            None => {
                self.warn(&format!("{} is not a function", callee.type_of()));
                Ok(Value::Undefined)
            }
        }
    }

    fn invoke(&self, c: &Closure, this: Option<Value>, args: &[Value]) -> Result<Flow, EvalError> {
        let (scope, live) = match &c.env {
            Captured::Snapshot(bindings) => (Scope::from_bindings(bindings).child(), false),
            Captured::Scope(weak) => match weak.upgrade() {
                Some(s) => (s.child(), true),
                None => {
                    self.warn(&format!(
                        "function {} outlived the scope it was declared in",
                        c.def.name.as_deref().unwrap_or("<anonymous>")
                    ));
                    return Ok(Flow::Normal(Eval::Failed));
                }
            },
        };
        trace!(target: "ponzu::walk", name = ?c.def.name, args = args.len(), "call");

        if let Some(this) = this.filter(|_| !c.def.is_arrow) {
            scope.declare("this", true)?;
            scope.set("this", this, true)?;
        }
        for (i, param) in c.def.params.iter().enumerate() {
            let mut arg = if param.rest {
                Value::array(args.get(i..).map(<[Value]>::to_vec).unwrap_or_default())
            } else {
                args.get(i).cloned().unwrap_or_default()
            };
            if let (Value::Undefined, Some(default)) = (&arg, &param.default) {
                match self.walk(default, &scope)? {
                    Eval::Value(v) => arg = v,
                    Eval::Failed => return Ok(Flow::Normal(Eval::Failed)),
                }
            }
            scope.declare(&param.name, false)?;
            scope.set(&param.name, arg, true)?;
        }

        let flow = match &c.def.body {
            FunctionBody::Expr(e) => Flow::Return(self.walk(e, &scope)?),
            FunctionBody::Block(body) => self.run_body(body, &scope)?,
        };
        if live {
            scope.release();
            return Ok(flow);
        }
        // The snapshot arena dies with `scope`; functions declared inside
        // the call must not keep pointing into it.
        let out = |e: Eval| match e {
            Eval::Value(v) => Eval::Value(detach(&v, &scope)),
            Eval::Failed => Eval::Failed,
        };
        Ok(match flow {
            Flow::Normal(e) => Flow::Normal(out(e)),
            Flow::Return(e) => Flow::Return(out(e)),
        })
    }

    /// Function body: stops at `return` or at the first failed statement.
    fn run_body(&self, body: &[Stmt], scope: &Scope) -> Result<Flow, EvalError> {
        let mut last = Eval::Value(Value::Undefined);
        for stmt in body {
            match self.exec(stmt, scope)? {
                Flow::Normal(Eval::Failed) => return Ok(Flow::Normal(Eval::Failed)),
                Flow::Normal(e) => last = e,
                ret @ Flow::Return(_) => return Ok(ret),
            }
        }
        Ok(Flow::Normal(last))
    }

    // ── Statements ────────────────────────────────────────────────────────────

    fn exec(&self, stmt: &Stmt, scope: &Scope) -> Result<Flow, EvalError> {
        ensure_sufficient_stack(|| self.exec_stmt(stmt, scope))
    }

    fn exec_stmt(&self, stmt: &Stmt, scope: &Scope) -> Result<Flow, EvalError> {
        let eval = match stmt {
            Stmt::Expr(e) => self.walk(e, scope)?,
            Stmt::VarDecl { kind, declarators } => {
                let constant = *kind == DeclKind::Const;
                let mut last = Eval::Value(Value::Undefined);
                for d in declarators {
                    last = self.declare(d, constant, scope)?;
                }
                last
            }
            Stmt::Function(def) => {
                let name = def.name.as_deref().unwrap_or_default();
                scope.declare(name, false)?;
                let f = Value::Function(Function::Closure(Rc::new(Closure {
                    def: Rc::clone(def),
                    env: Captured::Scope(scope.downgrade()),
                })));
                scope.set(name, f, true)?;
                Eval::Value(Value::Undefined)
            }
            Stmt::Return(arg) => {
                let e = match arg {
                    Some(e) => self.walk(e, scope)?,
                    None => Eval::Value(Value::Undefined),
                };
                return Ok(Flow::Return(e));
            }
            Stmt::If {
                test,
                consequent,
                alternate,
            } => match self.walk(test, scope)? {
                Eval::Failed => Eval::Failed,
                Eval::Value(v) if v.truthy() => return self.exec(consequent, scope),
                Eval::Value(_) => match alternate {
                    Some(alt) => return self.exec(alt, scope),
                    None => Eval::Value(Value::Undefined),
                },
            },
            Stmt::Block(body) => {
                let mut last = Eval::Value(Value::Undefined);
                for s in body {
                    match self.exec(s, scope)? {
                        Flow::Normal(e) => last = e,
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
                last
            }
            Stmt::Empty => Eval::Value(Value::Undefined),
        };
        Ok(Flow::Normal(eval))
    }

    fn declare(&self, d: &Declarator, constant: bool, scope: &Scope) -> Result<Eval, EvalError> {
        match &d.target {
            Pattern::Ident(name) => {
                scope.declare(name, constant)?;
                let Some(init) = &d.init else {
                    return Ok(Eval::Value(Value::Undefined));
                };
                let v = value!(self.walk(init, scope)?);
                Ok(Eval::Value(scope.set(name, v, true)?))
            }
            Pattern::Array(elems) => {
                for elem in elems.iter().flatten() {
                    let (PatternElem::Ident(name) | PatternElem::Rest(name)) = elem;
                    scope.declare(name, constant)?;
                }
                let Some(init) = &d.init else {
                    return Ok(Eval::Value(Value::Undefined));
                };
                let v = value!(self.walk(init, scope)?);
                self.destructure(elems, &v, scope, true)
            }
        }
    }

    /// Bind positions of `value` to the names in `elems`.  The result has one
    /// entry per position; elided positions read `null`.
    fn destructure(
        &self,
        elems: &[Option<PatternElem>],
        value: &Value,
        scope: &Scope,
        declaration: bool,
    ) -> Result<Eval, EvalError> {
        let items: Vec<Value> = match value {
            Value::Array(a) => a.borrow().clone(),
            Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            other => {
                self.warn(&format!("Cannot destructure a value of type {}", other.type_of()));
                return Ok(Eval::Failed);
            }
        };
        let mut out = Vec::with_capacity(elems.len());
        for (i, elem) in elems.iter().enumerate() {
            let (name, v) = match elem {
                None => {
                    out.push(Value::Null);
                    continue;
                }
                Some(PatternElem::Ident(name)) => (name, items.get(i).cloned().unwrap_or_default()),
                Some(PatternElem::Rest(name)) => (
                    name,
                    Value::array(items.get(i..).map(<[Value]>::to_vec).unwrap_or_default()),
                ),
            };
            if declaration {
                scope.set(name, v.clone(), true)?;
            } else {
                self.assign_name(name, v.clone(), scope)?;
            }
            out.push(v);
        }
        Ok(Eval::Value(Value::array(out)))
    }

    // ── Names ─────────────────────────────────────────────────────────────────

    /// Read `name`, declaring it as `undefined` in `scope` when no scope in
    /// the chain has it.
    fn lookup(&self, name: &str, scope: &Scope) -> Result<Value, EvalError> {
        if !scope.has(name) {
            scope.declare(name, false)?;
        }
        Ok(scope.get(name))
    }

    fn assign_name(&self, name: &str, v: Value, scope: &Scope) -> Result<Value, EvalError> {
        if !scope.has(name) {
            scope.declare(name, false)?;
        }
        scope.set(name, v, false)
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn walk(&self, expr: &Expr, scope: &Scope) -> Result<Eval, EvalError> {
        ensure_sufficient_stack(|| self.walk_expr(expr, scope))
    }

    fn walk_expr(&self, expr: &Expr, scope: &Scope) -> Result<Eval, EvalError> {
        match expr {
            Expr::Literal(lit) => Ok(Eval::Value(match lit {
                Literal::Undefined => Value::Undefined,
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Num(n) => Value::Number(*n),
                Literal::Str(s) => Value::Str(s.clone()),
            })),
            Expr::Regex { pattern, flags } => match JsRegex::new(pattern, flags) {
                Ok(re) => Ok(Eval::Value(Value::Regex(Rc::new(re)))),
                Err(e) => {
                    self.warn(&format!("Invalid regular expression /{pattern}/: {e}"));
                    Ok(Eval::Failed)
                }
            },
            Expr::Ident(name) => Ok(Eval::Value(self.lookup(name, scope)?)),
            Expr::This => Ok(Eval::Value(scope.get("this"))),
            Expr::Array(items) => self.walk_array(items, scope),
            Expr::Object(props) => self.walk_object(props, scope),
            Expr::Function(def) => Ok(Eval::Value(Value::Function(Function::Closure(Rc::new(
                Closure {
                    def: Rc::clone(def),
                    env: Captured::Snapshot(scope.flatten()),
                },
            ))))),
            Expr::Unary { op, arg } => self.walk_unary(*op, arg, scope),
            Expr::Update {
                increment,
                prefix,
                target,
            } => self.walk_update(*increment, *prefix, target, scope),
            Expr::Binary { op, left, right } => {
                let l = value!(self.walk(left, scope)?);
                let r = value!(self.walk(right, scope)?);
                Ok(self.binary(*op, &l, &r))
            }
            Expr::Logical { op, left, right } => self.walk_logical(*op, left, right, scope),
            Expr::Assign { op, target, value } => self.walk_assign(*op, target, value, scope),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if value!(self.walk(test, scope)?).truthy() {
                    self.walk(consequent, scope)
                } else {
                    self.walk(alternate, scope)
                }
            }
            Expr::Member { .. } | Expr::Call { .. } => Ok(self.link(expr, scope)?.into_eval()),
            Expr::New { callee, args } => self.walk_new(callee, args, scope),
            Expr::Template { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi);
                    if let Some(e) = exprs.get(i) {
                        out.push_str(&value!(self.walk(e, scope)?).to_string());
                    }
                }
                Ok(Eval::Value(Value::Str(out)))
            }
            Expr::TaggedTemplate { tag, quasis, exprs } => {
                let tag = value!(self.walk(tag, scope)?);
                let mut args = vec![Value::array(
                    quasis.iter().map(|q| Value::Str(q.clone())).collect(),
                )];
                for e in exprs {
                    args.push(value!(self.walk(e, scope)?));
                }
                match tag.as_function() {
                    Some(f) => self.call_function(f, None, &args),
                    None => {
                        self.warn("Failed to walk tagged template, tag is not a function");
                        Ok(Eval::Failed)
                    }
                }
            }
            Expr::Sequence(exprs) => {
                let mut last = Eval::Value(Value::Undefined);
                for e in exprs {
                    last = Eval::Value(value!(self.walk(e, scope)?));
                }
                Ok(last)
            }
            // Calls complete synchronously, so awaiting is a no-op.
            Expr::Await(inner) | Expr::Chain(inner) => self.walk(inner, scope),
        }
    }

    fn walk_array(&self, items: &[ArrayItem], scope: &Scope) -> Result<Eval, EvalError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                ArrayItem::Expr(e) => out.push(value!(self.walk(e, scope)?)),
                ArrayItem::Spread(e) => {
                    let v = value!(self.walk(e, scope)?);
                    match spread_items(&v) {
                        Some(vs) => out.extend(vs),
                        None => {
                            self.warn(&format!("Cannot spread a value of type {}", v.type_of()));
                            return Ok(Eval::Failed);
                        }
                    }
                }
                ArrayItem::Hole => out.push(Value::Undefined),
            }
        }
        Ok(Eval::Value(Value::array(out)))
    }

    fn walk_object(&self, props: &[Property], scope: &Scope) -> Result<Eval, EvalError> {
        let mut map = Map::new();
        for prop in props {
            match prop {
                Property::KeyValue { key, value } => {
                    let key = match key {
                        PropKey::Static(s) => s.clone(),
                        PropKey::Computed(e) => value!(self.walk(e, scope)?).to_string(),
                    };
                    let v = value!(self.walk(value, scope)?);
                    map.insert(key, v);
                }
                Property::Spread(e) => match value!(self.walk(e, scope)?) {
                    Value::Object(o) => {
                        map.extend(o.borrow().iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                    other => {
                        for (i, v) in spread_items(&other).unwrap_or_default().into_iter().enumerate() {
                            map.insert(i.to_string(), v);
                        }
                    }
                },
            }
        }
        Ok(Eval::Value(Value::object(map)))
    }

    fn walk_unary(&self, op: UnaryOp, arg: &Expr, scope: &Scope) -> Result<Eval, EvalError> {
        if op == UnaryOp::Delete {
            self.warn("Unsupported unary operator delete");
            return Ok(Eval::Failed);
        }
        let v = value!(self.walk(arg, scope)?);
        let reg = &self.registry;
        Ok(Eval::Value(match op {
            UnaryOp::Plus => reg.unary(ops::UnaryOp::Approve, &v),
            UnaryOp::Minus => reg.unary(ops::UnaryOp::Negate, &v),
            UnaryOp::Not => reg.unary(ops::UnaryOp::Not, &v),
            UnaryOp::BitNot => Value::Number(f64::from(!v.to_int32())),
            UnaryOp::Typeof => Value::Str(v.type_of().to_owned()),
            UnaryOp::Void | UnaryOp::Delete => Value::Undefined,
        }))
    }

    fn walk_update(
        &self,
        increment: bool,
        prefix: bool,
        target: &AssignTarget,
        scope: &Scope,
    ) -> Result<Eval, EvalError> {
        let Some(place) = self.place(target, scope)? else {
            return Ok(Eval::Failed);
        };
        let old = self.read(&place, scope)?.to_number();
        let new = if increment { old + 1.0 } else { old - 1.0 };
        if !self.write(&place, Value::Number(new), scope)? {
            return Ok(Eval::Failed);
        }
        Ok(Eval::Value(Value::Number(if prefix { new } else { old })))
    }

    fn binary(&self, op: BinaryOp, l: &Value, r: &Value) -> Eval {
        let reg = &self.registry;
        let shift = || r.to_uint32() & 31;
        Eval::Value(match op {
            BinaryOp::Eq => Value::Bool(l.loose_eq(r)),
            BinaryOp::NotEq => Value::Bool(!l.loose_eq(r)),
            BinaryOp::StrictEq => Value::Bool(l.strict_eq(r)),
            BinaryOp::StrictNotEq => Value::Bool(!l.strict_eq(r)),
            BinaryOp::Lt => Value::Bool(l.compare(r) == Some(Ordering::Less)),
            BinaryOp::Le => Value::Bool(matches!(l.compare(r), Some(Ordering::Less | Ordering::Equal))),
            BinaryOp::Gt => Value::Bool(l.compare(r) == Some(Ordering::Greater)),
            BinaryOp::Ge => Value::Bool(matches!(
                l.compare(r),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            BinaryOp::Add => reg.binary(ops::BinaryOp::Add, l, r),
            BinaryOp::Sub => reg.binary(ops::BinaryOp::Subtract, l, r),
            BinaryOp::Mul => reg.binary(ops::BinaryOp::Multiply, l, r),
            BinaryOp::Div => reg.binary(ops::BinaryOp::Divide, l, r),
            BinaryOp::Mod => reg.binary(ops::BinaryOp::Modulo, l, r),
            BinaryOp::Pow => reg.binary(ops::BinaryOp::Power, l, r),
            BinaryOp::BitOr => Value::Number(f64::from(l.to_int32() | r.to_int32())),
            BinaryOp::BitAnd => Value::Number(f64::from(l.to_int32() & r.to_int32())),
            BinaryOp::BitXor => Value::Number(f64::from(l.to_int32() ^ r.to_int32())),
            BinaryOp::Shl => Value::Number(f64::from(l.to_int32().wrapping_shl(shift()))),
            BinaryOp::Shr => Value::Number(f64::from(l.to_int32() >> shift())),
            BinaryOp::UShr => Value::Number(f64::from(l.to_uint32() >> shift())),
            BinaryOp::In | BinaryOp::Instanceof => {
                self.warn(&format!("Unsupported binary operator {op:?}"));
                return Eval::Failed;
            }
        })
    }

    fn walk_logical(
        &self,
        op: LogicalOp,
        left: &Expr,
        right: &Expr,
        scope: &Scope,
    ) -> Result<Eval, EvalError> {
        let l = value!(self.walk(left, scope)?);
        match op {
            LogicalOp::And if !l.truthy() => return Ok(Eval::Value(Value::Bool(false))),
            LogicalOp::Or if l.truthy() => return Ok(Eval::Value(l)),
            LogicalOp::Nullish if !l.is_nullish() => return Ok(Eval::Value(l)),
            _ => {}
        }
        let r = value!(self.walk(right, scope)?);
        Ok(Eval::Value(match op {
            LogicalOp::And => self.registry.binary(ops::BinaryOp::And, &l, &r),
            LogicalOp::Or => self.registry.binary(ops::BinaryOp::Or, &l, &r),
            LogicalOp::Nullish => r,
        }))
    }

    fn walk_assign(
        &self,
        op: AssignOp,
        target: &AssignTarget,
        value: &Expr,
        scope: &Scope,
    ) -> Result<Eval, EvalError> {
        if let AssignTarget::Pattern(elems) = target {
            let v = value!(self.walk(value, scope)?);
            return self.destructure(elems, &v, scope, false);
        }
        let Some(place) = self.place(target, scope)? else {
            return Ok(Eval::Failed);
        };
        let result = match op {
            AssignOp::Assign => value!(self.walk(value, scope)?),
            AssignOp::Compound(bin) => {
                let current = self.read(&place, scope)?;
                let rhs = value!(self.walk(value, scope)?);
                value!(self.binary(bin, &current, &rhs))
            }
            AssignOp::Logical(lop) => {
                let current = self.read(&place, scope)?;
                let short = match lop {
                    LogicalOp::And => !current.truthy(),
                    LogicalOp::Or => current.truthy(),
                    LogicalOp::Nullish => !current.is_nullish(),
                };
                if short {
                    return Ok(Eval::Value(current));
                }
                value!(self.walk(value, scope)?)
            }
        };
        if !self.write(&place, result.clone(), scope)? {
            return Ok(Eval::Failed);
        }
        Ok(Eval::Value(result))
    }

    // ── Places ────────────────────────────────────────────────────────────────

    fn place<'a>(
        &self,
        target: &'a AssignTarget,
        scope: &Scope,
    ) -> Result<Option<Place<'a>>, EvalError> {
        match target {
            AssignTarget::Ident(name) => Ok(Some(Place::Name(name))),
            AssignTarget::Member { object, property } => {
                let base = match self.walk(object, scope)? {
                    Eval::Value(v) => v,
                    Eval::Failed => return Ok(None),
                };
                if base.is_callable() {
                    self.warn("Failed to walk set member object, object type is function");
                    return Ok(None);
                }
                if base.is_nullish() {
                    self.warn("Failed to walk set member object, object is null");
                    return Ok(None);
                }
                Ok(self.property_key(property, scope)?.map(|key| Place::Property(base, key)))
            }
            AssignTarget::Pattern(_) => {
                self.warn("Invalid update target");
                Ok(None)
            }
        }
    }

    fn read(&self, place: &Place<'_>, scope: &Scope) -> Result<Value, EvalError> {
        match place {
            Place::Name(name) => self.lookup(name, scope),
            Place::Property(base, key) => Ok(get_property(base, key)),
        }
    }

    /// `false` when the base does not accept the write.
    fn write(&self, place: &Place<'_>, v: Value, scope: &Scope) -> Result<bool, EvalError> {
        match place {
            Place::Name(name) => {
                self.assign_name(name, v, scope)?;
                Ok(true)
            }
            Place::Property(base, key) => {
                let ok = set_property(base, key, v);
                if !ok {
                    self.warn(&format!(
                        "Cannot set property {key} of a value of type {}",
                        base.type_of()
                    ));
                }
                Ok(ok)
            }
        }
    }

    fn property_key(&self, property: &MemberProp, scope: &Scope) -> Result<Option<Value>, EvalError> {
        Ok(match property {
            MemberProp::Name(name) => Some(Value::Str(name.clone())),
            MemberProp::Computed(e) => match self.walk(e, scope)? {
                Eval::Value(v) => Some(v),
                Eval::Failed => None,
            },
        })
    }

    // ── Member and call chains ────────────────────────────────────────────────

    fn link(&self, expr: &Expr, scope: &Scope) -> Result<Link, EvalError> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let base = match self.base(object, *optional, scope)? {
                    Link::Value(v) => v,
                    other => return Ok(other),
                };
                Ok(match self.property_key(property, scope)? {
                    Some(key) => Link::Value(get_property(&base, &key)),
                    None => Link::Failed,
                })
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => self.call_link(callee, args, *optional, scope),
            other => Ok(self.walk(other, scope)?.into()),
        }
    }

    /// Object of a member access.  Functions have no members; a nullish
    /// object short-circuits an optional access and fails any other.
    fn base(&self, object: &Expr, optional: bool, scope: &Scope) -> Result<Link, EvalError> {
        let base = match self.link(object, scope)? {
            Link::Value(v) => v,
            other => return Ok(other),
        };
        if base.is_callable() {
            self.warn("Failed to walk member object, object type is function");
            return Ok(Link::Failed);
        }
        if base.is_nullish() {
            if optional {
                return Ok(Link::Short);
            }
            self.warn("Failed to walk member object, object is null");
            return Ok(Link::Failed);
        }
        Ok(Link::Value(base))
    }

    fn call_link(
        &self,
        callee: &Expr,
        args: &[Argument],
        optional: bool,
        scope: &Scope,
    ) -> Result<Link, EvalError> {
        if let Expr::Member {
            object,
            property,
            optional: member_optional,
        } = callee
        {
            let base = match self.base(object, *member_optional, scope)? {
                Link::Value(v) => v,
                other => return Ok(other),
            };
            let Some(key) = self.property_key(property, scope)? else {
                return Ok(Link::Failed);
            };
            let Some(args) = self.walk_args(args, scope)? else {
                return Ok(Link::Failed);
            };
            return self.call_method(&base, &key, &args, optional);
        }

        let f = match self.link(callee, scope)? {
            Link::Value(v) => v,
            other => return Ok(other),
        };
        if optional && f.is_nullish() {
            return Ok(Link::Short);
        }
        let Some(args) = self.walk_args(args, scope)? else {
            return Ok(Link::Failed);
        };
        match f.as_function() {
            Some(func) => Ok(self.call_function(func, None, &args)?.into()),
            None => {
                self.warn("Failed to walk call callee");
                Ok(Link::Failed)
            }
        }
    }

    /// `base.key(args)`: an own callable property first, then the
    /// whitelisted helpers, then the receiver kind's built-in methods.
    fn call_method(
        &self,
        base: &Value,
        key: &Value,
        args: &[Value],
        optional: bool,
    ) -> Result<Link, EvalError> {
        let prop = get_property(base, key);
        if let Some(f) = prop.as_function() {
            return Ok(self.call_function(f, Some(base.clone()), args)?.into());
        }
        let name = key.to_string();
        if !prop.truthy() {
            if let Some(r) = builtins::call_helper(self, &name, base, args)
                .or_else(|| builtins::call_method(self, base, &name, args))
            {
                return Ok(r?.into());
            }
            if optional {
                return Ok(Link::Short);
            }
        }
        self.warn(&format!("Failed to walk call callee, {name} is not a function"));
        Ok(Link::Failed)
    }

    fn walk_args(&self, args: &[Argument], scope: &Scope) -> Result<Option<Vec<Value>>, EvalError> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Argument::Expr(e) => match self.walk(e, scope)? {
                    Eval::Value(v) => out.push(v),
                    Eval::Failed => return Ok(None),
                },
                Argument::Spread(e) => {
                    let v = match self.walk(e, scope)? {
                        Eval::Value(v) => v,
                        Eval::Failed => return Ok(None),
                    };
                    match spread_items(&v) {
                        Some(vs) => out.extend(vs),
                        None => {
                            self.warn(&format!("Cannot spread a value of type {}", v.type_of()));
                            return Ok(None);
                        }
                    }
                }
            }
        }
        Ok(Some(out))
    }

    /// `new C(args)`.  A native constructor is a factory; a closure runs with
    /// a fresh object as `this` and yields it unless it returns a composite.
    fn walk_new(&self, callee: &Expr, args: &[Argument], scope: &Scope) -> Result<Eval, EvalError> {
        let ctor = value!(self.walk(callee, scope)?);
        let Some(args) = self.walk_args(args, scope)? else {
            return Ok(Eval::Failed);
        };
        match ctor.as_function() {
            Some(f @ Function::Native(_)) => self.call_function(f, None, &args),
            Some(Function::Closure(c)) => {
                let this = Value::object(Map::new());
                match self.invoke(c, Some(this.clone()), &args)? {
                    Flow::Return(Eval::Value(v)) if v.is_composite() => Ok(Eval::Value(v)),
                    Flow::Normal(Eval::Failed) | Flow::Return(Eval::Failed) => Ok(Eval::Failed),
                    _ => Ok(Eval::Value(this)),
                }
            }
            None => {
                self.warn(&format!("{} is not a constructor", ctor.type_of()));
                Ok(Eval::Failed)
            }
        }
    }
}

/// Run `src` against `bindings` with a default [`Interpreter`].
pub fn evaluate(src: &str, bindings: &mut Map) -> Result<Value, EvalError> {
    Interpreter::new().eval(src, bindings)
}

// ── Properties ────────────────────────────────────────────────────────────────

fn spread_items(v: &Value) -> Option<Vec<Value>> {
    match v {
        Value::Array(a) => Some(a.borrow().clone()),
        Value::Str(s) => Some(s.chars().map(|c| Value::Str(c.to_string())).collect()),
        _ => None,
    }
}

/// Canonical array index named by `key`: `2` and `"2"` but not `"02"`.
fn array_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && n.is_finite() => Some(*n as usize),
        Value::Str(s) if s == "0" || (!s.starts_with(['0', '+'])) => s.parse().ok(),
        _ => None,
    }
}

/// Property read.  Missing properties read `undefined`.
pub fn get_property(base: &Value, key: &Value) -> Value {
    match base {
        Value::Array(items) => {
            let items = items.borrow();
            match array_index(key) {
                Some(i) => items.get(i).cloned().unwrap_or_default(),
                None if key.as_str() == Some("length") => Value::from(items.len()),
                None => Value::Undefined,
            }
        }
        Value::Str(s) => match array_index(key) {
            Some(i) => s
                .chars()
                .nth(i)
                .map_or(Value::Undefined, |c| Value::Str(c.to_string())),
            None if key.as_str() == Some("length") => Value::from(s.chars().count()),
            None => Value::Undefined,
        },
        Value::Object(map) => map
            .borrow()
            .get(&key.to_string())
            .cloned()
            .unwrap_or_default(),
        Value::Host(h) => h.get(&key.to_string()).unwrap_or_default(),
        Value::Regex(re) => match key.as_str() {
            Some("source") => Value::Str(re.source.clone()),
            Some("flags") => Value::Str(re.flags.clone()),
            Some("global") => Value::Bool(re.is_global()),
            _ => Value::Undefined,
        },
        _ => Value::Undefined,
    }
}

/// Property write.  `false` when the base does not accept it, or when the
/// write would grow an array past [`MAX_ARRAY_LENGTH`].
pub fn set_property(base: &Value, key: &Value, v: Value) -> bool {
    match base {
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            if let Some(i) = array_index(key) {
                if i >= MAX_ARRAY_LENGTH {
                    return false;
                }
                if i >= items.len() {
                    items.resize(i + 1, Value::Undefined);
                }
                items[i] = v;
                return true;
            }
            if key.as_str() == Some("length") {
                let n = v.to_number();
                if n >= 0.0 && n.fract() == 0.0 && n <= MAX_ARRAY_LENGTH as f64 {
                    items.resize(n as usize, Value::Undefined);
                    return true;
                }
            }
            false
        }
        Value::Object(map) => {
            map.borrow_mut().insert(key.to_string(), v);
            true
        }
        Value::Host(h) => h.set(&key.to_string(), v),
        _ => false,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
