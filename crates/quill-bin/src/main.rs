//! Quill entrypoint: replays an edit script against a rich-text model.
use anyhow::{Context, Result};
use clap::Parser;
use core_config::load_from;
use core_model::RichTextModel;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

mod script;

use script::Interpreter;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "quill", version, about = "Rich-text undo/redo script runner")]
struct Args {
    /// Edit script to replay, one command per line.
    pub script: PathBuf,
    /// Optional configuration file path (overrides discovery of `quill.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Write logs to this file instead of stderr.
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
    /// Initial document text.
    #[arg(long = "text", default_value = "")]
    pub text: String,
}

fn configure_logging(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let Some(path) = log_file else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
        return None;
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .map_or_else(|| "quill.log".into(), |n| n.to_os_string());
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(nb_writer)
        .try_init()
    {
        Ok(_) => Some(guard),
        // Global subscriber already installed; dropping the guard stops the writer.
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn run(args: Args) -> Result<()> {
    let config_override = args.config.is_some();
    let config = load_from(args.config)?;
    let name = args
        .script
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("script")
        .to_string();
    let script = std::fs::read_to_string(&args.script)
        .with_context(|| format!("reading {}", args.script.display()))?;
    info!(
        target: "cli",
        script = name.as_str(),
        lines = script.lines().count(),
        config_override,
        undo_levels = config.undo_levels(),
        "startup"
    );

    let model = RichTextModel::from_config(&name, &args.text, &config)?;
    let stdout = std::io::stdout();
    let mut interpreter = Interpreter::new(model, stdout.lock());
    interpreter.run(&script)?;
    interpreter.print()?;

    let (model, mut out) = interpreter.into_parts();
    out.flush()?;
    let engine = model.undo_engine();
    info!(
        target: "cli",
        undo_depth = engine.undo_depth(),
        redo_depth = engine.redo_depth(),
        merged = engine.merged_operations(),
        dropped = engine.dropped_operations(),
        evicted = engine.evicted_transactions(),
        "shutdown"
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging(args.log_file.as_deref());
    install_panic_hook();
    if let Err(err) = run(args) {
        error!(target: "cli", error = %err, "script_failed");
        return Err(err);
    }
    Ok(())
}
