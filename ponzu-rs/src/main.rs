use std::path::{Path, PathBuf};

use ponzu::cli::{self, Mode, Script};
use ponzu::config::{ConfigError, TransformerConfig};
use ponzu::json::{from_json, map_from_json, to_json};
use ponzu::script::{EvalError, Interpreter, Map, Value};
use ponzu::transform::{SwitchTransformer, Transform};
use serde_json::Value as Json;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum RunError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stdin: {0}")]
    Stdin(#[source] std::io::Error),
    #[error("{what}: {source}")]
    Json {
        what: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} must contain a JSON object")]
    NotAnObject(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

#[tokio::main]
async fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("ponzu: {e}");
            eprintln!("{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    install_tracing(args.debug);

    if let Err(e) = run(args.mode).await {
        eprintln!("ponzu: {e}");
        std::process::exit(1);
    }
}

fn install_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("PONZU_LOG").unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

async fn run(mode: Mode) -> Result<(), RunError> {
    match mode {
        Mode::Eval {
            script,
            bindings,
            print_bindings,
        } => run_eval(script, bindings.as_deref(), print_bindings).await,
        Mode::Transform {
            config,
            context,
            source,
        } => run_transform(&config, context.as_deref(), source.as_deref()).await,
    }
}

// ── File helpers ──────────────────────────────────────────────────────────────

async fn read_file(path: &Path) -> Result<String, RunError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| RunError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn parse_json(text: &str, what: &str) -> Result<Json, RunError> {
    serde_json::from_str(text).map_err(|source| RunError::Json {
        what: what.to_owned(),
        source,
    })
}

/// A JSON object file as bindings; no file means no bindings.
async fn load_map(path: Option<&Path>) -> Result<Map, RunError> {
    let Some(path) = path else {
        return Ok(Map::new());
    };
    let what = path.display().to_string();
    let json = parse_json(&read_file(path).await?, &what)?;
    map_from_json(&json).ok_or(RunError::NotAnObject(what))
}

// ── Modes ─────────────────────────────────────────────────────────────────────

async fn run_eval(
    script: Script,
    bindings: Option<&Path>,
    print_bindings: bool,
) -> Result<(), RunError> {
    let src = match script {
        Script::Inline(src) => src,
        Script::File(path) => read_file(&path).await?,
    };
    let mut bindings = load_map(bindings).await?;

    let interp = Interpreter::new();
    let result = interp.eval(&src, &mut bindings)?;
    println!("{}", to_json(&result));
    if print_bindings {
        println!("{}", to_json(&Value::object(bindings)));
    }
    Ok(())
}

async fn run_transform(
    config: &Path,
    context: Option<&Path>,
    source: Option<&Path>,
) -> Result<(), RunError> {
    let transformer = load_transformer(config).await?;
    let context = load_map(context).await?;
    let interp = Interpreter::new();

    if let Some(path) = source {
        let json = parse_json(&read_file(path).await?, &path.display().to_string())?;
        let out = transformer.transform(&interp, &from_json(&json), &context)?;
        println!("{}", to_json(&out));
        return Ok(());
    }

    // One JSON document per stdin line.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut lineno = 0usize;
    while let Some(line) = lines.next_line().await.map_err(RunError::Stdin)? {
        lineno += 1;
        if line.trim().is_empty() {
            continue;
        }
        let json = parse_json(&line, &format!("stdin line {lineno}"))?;
        let out = transformer.transform(&interp, &from_json(&json), &context)?;
        println!("{}", to_json(&out));
    }
    Ok(())
}

async fn load_transformer(path: &Path) -> Result<SwitchTransformer, RunError> {
    Ok(TransformerConfig::load(path).await?.build()?)
}
