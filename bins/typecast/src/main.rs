use clap::Parser;

use typecast_api::{ConversionContext, Value};
use typecast_engine::{Engine, EngineConfig, EngineError};

#[derive(Parser)]
#[command(name = "typecast", about = "Convert a value to a target type")]
struct Cli {
    /// Target type expression, e.g. `List<Integer>` or `Map<String, long[]>`.
    #[arg(long, short)]
    target: String,

    /// Path to TOML configuration file.
    #[arg(long, env = "TYPECAST_CONFIG")]
    config: Option<String>,

    /// Value source reported in error messages.
    #[arg(long)]
    source: Option<String>,

    /// Treat VALUE as a plain string instead of JSON.
    #[arg(long)]
    raw: bool,

    /// Value to convert (JSON unless --raw).
    value: String,
}

/// No converter applies to the value.
const EXIT_NOT_FOUND: i32 = 2;

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            tracing::info!(config = %path, "loading configuration");
            match EngineConfig::load(path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, "failed to load config");
                    std::process::exit(1);
                }
            }
        }
        None => EngineConfig::default(),
    };

    let engine = match Engine::bootstrap(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "failed to bootstrap engine");
            std::process::exit(1);
        }
    };

    let value = if cli.raw {
        Value::str(cli.value.as_str())
    } else {
        match serde_json::from_str::<serde_json::Value>(&cli.value) {
            Ok(json) => Value::from_json(json),
            Err(e) => {
                tracing::error!(error = %e, "VALUE is not valid JSON (use --raw for plain strings)");
                std::process::exit(1);
            }
        }
    };

    let ctx = match cli.source {
        Some(source) => ConversionContext::with_source(source),
        None => ConversionContext::with_source("command line"),
    };

    match convert(&engine, value, &cli.target, &ctx) {
        Ok(Some(out)) => println!("{out}"),
        Ok(None) => {
            tracing::error!(target_type = %cli.target, "no converter applies");
            std::process::exit(EXIT_NOT_FOUND);
        }
        Err(e) => {
            tracing::error!(error = %e, "conversion failed");
            std::process::exit(1);
        }
    }
}

/// Convert `value` and render the result as JSON.
///
/// A JSON `null` is already absent and prints as `null`; the target
/// expression is still checked.
fn convert(
    engine: &Engine,
    value: Value,
    target: &str,
    ctx: &ConversionContext,
) -> Result<Option<serde_json::Value>, EngineError> {
    let absent = value.is_null();
    match engine.convert_expr(Some(value), target, ctx)? {
        Some(out) => Ok(Some(out.to_json())),
        None if absent => Ok(Some(serde_json::Value::Null)),
        None => Ok(None),
    }
}
