//! Sandboxed expression language.
//!
//! A tree-walking interpreter for a small JavaScript subset, covering:
//!
//! - `let` / `const` / `var` declarations with array destructuring
//! - arithmetic, comparison, bitwise and logical operators, with
//!   per-type overloads through the [`OperatorRegistry`]
//! - arrow and `function` closures, `if` / `else`, `return`
//! - member access, optional chaining, template literals
//! - whitelisted collection helpers (`map`, `filterSrc`, `allowIndexes`, …)
//!   and the common string / array / number methods
//!
//! Scripts only see the bindings they are handed plus a small prelude
//! (`Date`); there is no ambient global object, no I/O and no module loader.
//!
//! # Quick start
//!
//! ```rust
//! use ponzu::script::{Interpreter, Map, Value};
//!
//! let interp = Interpreter::new();
//! let mut bindings = Map::new();
//! bindings.insert("x".into(), Value::from(6));
//! let v = interp.eval("let y = x * 7; y", &mut bindings).unwrap();
//! assert_eq!(v, Value::from(42));
//! assert_eq!(bindings["y"], Value::from(42));
//! ```

pub mod ast;
pub mod builtins;
pub mod diag;
pub mod error;
pub mod host;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod scope;
mod stack;
pub mod value;
pub mod walker;

// Re-exports for convenience.
pub use diag::{CollectedDiagnostics, Diagnostics, TracingDiagnostics};
pub use error::{EvalError, ParseError};
pub use host::{prelude, Date, HostObject};
pub use ops::{OperatorRegistry, OperatorTable};
pub use parser::{parse, parse_expression};
pub use scope::{Binding, Scope};
pub use value::{Function, JsRegex, Map, Value};
pub use walker::{evaluate, Eval, Interpreter};
