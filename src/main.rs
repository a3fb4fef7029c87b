use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use feature_flag_rules::{Configuration, Context, Flags, RuleRegistry};
use serde_json::{Map, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Evaluate feature flags from a JSON configuration file.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the JSON flag configuration.
    config: PathBuf,
    /// Context attributes as a JSON object.
    #[arg(long, short)]
    context: Option<String>,
    /// Flag to check; repeatable. Without it every configured flag is listed.
    #[arg(long = "flag", short)]
    flags: Vec<String>,
    /// List disabled flags instead of enabled ones.
    #[arg(long)]
    disabled: bool,
    /// Only load `feature_`-prefixed keys from the file, stripping the prefix.
    #[arg(long)]
    prefixed: bool,
    /// Start from an empty rule registry instead of the built-in rules.
    #[arg(long)]
    no_builtins: bool,
    /// Debug logging on stderr.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if args.verbose {
        EnvFilter::new("feature_flag_rules=debug,ffr=debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading {}", args.config.display()))?;
    let raw: Value = serde_json::from_str(&raw).context("config is not valid JSON")?;
    let config = if args.prefixed {
        Configuration::from_prefixed(raw)?
    } else {
        Configuration::from_value(raw)?
    };
    debug!(flags = config.len(), "loaded configuration");

    let ctx = match args.context.as_deref() {
        Some(json) => {
            let value: Value = serde_json::from_str(json).context("context is not valid JSON")?;
            Context::from_value(value)?
        }
        None => Context::default(),
    };

    let rules = if args.no_builtins {
        RuleRegistry::new()
    } else {
        RuleRegistry::with_builtins()
    };
    let flags = Flags::with_parts(config, rules, ctx);

    let out = if args.flags.is_empty() {
        let names = if args.disabled {
            flags.all_disabled()?
        } else {
            flags.all_enabled()?
        };
        Value::from(names)
    } else {
        let mut states = Map::new();
        for name in &args.flags {
            states.insert(name.clone(), Value::Bool(flags.enabled(name)?));
        }
        Value::Object(states)
    };

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
