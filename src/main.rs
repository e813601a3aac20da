//! `shape-replay`: replay a recorded editing script and print the stored
//! changes as JSON lines.
//!
//! Usage: `shape-replay <script.json> [--config <config.json>] [--output <changes.jsonl>]`

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use shape_annotator::{EditorConfig, EditorError, JsonLinesStore, ReplayScript, replay};

struct Args {
    script: PathBuf,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut script = None;
    let mut config = None;
    let mut output = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => config = Some(args.next().ok_or("--config needs a path")?.into()),
            "--output" => output = Some(args.next().ok_or("--output needs a path")?.into()),
            "-h" | "--help" => return Err(usage()),
            _ if script.is_none() => script = Some(PathBuf::from(arg)),
            _ => return Err(format!("unexpected argument '{arg}'\n{}", usage())),
        }
    }

    Ok(Args {
        script: script.ok_or_else(usage)?,
        config,
        output,
    })
}

fn usage() -> String {
    "usage: shape-replay <script.json> [--config <config.json>] [--output <changes.jsonl>]"
        .to_string()
}

fn load_config(path: Option<&PathBuf>) -> Result<EditorConfig, EditorError> {
    match path {
        Some(path) => Ok(EditorConfig::load(path)?),
        None => Ok(EditorConfig::load_from_default_path().unwrap_or_default()),
    }
}

fn run(args: &Args) -> Result<(), EditorError> {
    let config = load_config(args.config.as_ref())?;
    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();

    let script = ReplayScript::load(&args.script)?;
    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    let mut store = JsonLinesStore::new(writer);

    let report = replay::run(&script, config, &mut store)?;
    log::info!(
        "Replay finished on item '{}': {} committed, {} rejected, {} object(s), {} change(s) pending",
        report.item_id,
        report.committed.len(),
        report.rejected,
        report.objects.len(),
        report.flush.pending
    );
    if let Some(e) = report.flush.error {
        log::error!("Changes left unsaved: {}", e);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Replay error: {}", e);
            ExitCode::FAILURE
        }
    }
}
