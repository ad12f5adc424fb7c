//! Transformer configuration files.
//!
//! A config file is JSON describing a [`SwitchTransformer`]:
//!
//! ```json
//! {
//!   "transformation": { "kind": "other" },
//!   "defaultContext": { "unit": "kg" },
//!   "options": [
//!     { "when": "weight > 100", "transformation": { "kind": "heavy", "w": "@weight + unit" } }
//!   ]
//! }
//! ```
//!
//! Each option's `when` is a script expression evaluated against the same
//! bindings template expressions see; an option without `when` always
//! matches.  The top-level `transformation` is the fallback, used with the
//! top-level `defaultContext`.  Option contexts are layered on top of the
//! top-level one.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value as Json;
use thiserror::Error;

use crate::json::{from_json, map_from_json};
use crate::script::{parse, Map, ParseError, Value};
use crate::transform::{Condition, SwitchTransformer, Transformer};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid condition `{when}`: {source}")]
    Parse {
        when: String,
        #[source]
        source: ParseError,
    },
    #[error("{field} must be a JSON object")]
    NotAnObject { field: &'static str },
}

// ── File format ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformerConfig {
    #[serde(default)]
    pub transformation: Option<Json>,
    #[serde(default)]
    pub default_context: Option<Json>,
    #[serde(default)]
    pub options: Vec<OptionConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionConfig {
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub transformation: Option<Json>,
    #[serde(default)]
    pub default_context: Option<Json>,
}

fn context_of(json: Option<&Json>, field: &'static str) -> Result<Map, ConfigError> {
    match json {
        None | Some(Json::Null) => Ok(Map::new()),
        Some(json) => map_from_json(json).ok_or(ConfigError::NotAnObject { field }),
    }
}

fn transformation_of(json: Option<&Json>) -> Value {
    json.map_or_else(|| from_json(&Json::Object(Default::default())), from_json)
}

impl FromStr for TransformerConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }
}

impl TransformerConfig {
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_str(&text)
    }

    /// Build the transformer.  `when` expressions are parsed here so a bad
    /// condition is reported at load time rather than per record.
    pub fn build(&self) -> Result<SwitchTransformer, ConfigError> {
        let base = context_of(self.default_context.as_ref(), "defaultContext")?;
        let fallback = Transformer::new(transformation_of(self.transformation.as_ref()))
            .with_default_context(base.clone());
        let mut switch = SwitchTransformer::new().with_fallback(fallback);

        for option in &self.options {
            let condition = match &option.when {
                None => Condition::Always,
                Some(when) => {
                    parse(when).map_err(|source| ConfigError::Parse {
                        when: when.clone(),
                        source,
                    })?;
                    Condition::expression(when.as_str())
                }
            };
            let mut context = base.clone();
            context.extend(context_of(option.default_context.as_ref(), "options[].defaultContext")?);
            switch.add_option(
                condition,
                transformation_of(option.transformation.as_ref()),
                context,
            );
        }
        Ok(switch)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
