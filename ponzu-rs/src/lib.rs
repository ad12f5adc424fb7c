//! Sandboxed JavaScript-subset interpreter and declarative object
//! transformer.
//!
//! - [`script`]: lexer, parser and tree-walking interpreter
//! - [`transform`]: `@expr` templates and the transformer family
//! - [`config`]: JSON transformer configuration files
//! - [`json`], [`path`]: value conversion and object-path helpers

pub mod cli;
pub mod config;
pub mod json;
pub mod path;
pub mod script;
pub mod transform;
