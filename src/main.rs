//! Process optimization report generator.
//!
//! Usage:
//!   process-report [--mock | <input.json>] [--out <dir>] [--per-section] [--offline]
//!
//! Configuration comes from the environment (GEMINI_API_KEY, GEMINI_MODEL,
//! REPORT_OUT_DIR, ...). `--offline` replaces the narrative service with text
//! derived from the aggregates, so no credential or network is needed.

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;

use process_report::config::ReportConfig;
use process_report::data::fixture::MOCK_SCENARIOS;
use process_report::data::ingest::DatasetSlot;
use process_report::insight::{GeminiService, InsightMode, NarrativeService, StaticNarrative};
use process_report::logging::{log, obj, v_num, v_str, Domain, Level};
use process_report::report::{DirectoryStore, ReportGenerator, RunSettings};

const USAGE: &str =
    "Usage: process-report [--mock | <input.json>] [--out <dir>] [--per-section] [--offline]";

#[derive(Debug, Default)]
struct Args {
    input: Option<PathBuf>,
    mock: bool,
    out: Option<PathBuf>,
    per_section: bool,
    offline: bool,
}

fn parse_args(raw: impl Iterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    let mut raw = raw.peekable();
    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--mock" => args.mock = true,
            "--per-section" => args.per_section = true,
            "--offline" => args.offline = true,
            "--out" => {
                let dir = raw.next().ok_or_else(|| anyhow!("--out needs a directory"))?;
                args.out = Some(PathBuf::from(dir));
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other if other.starts_with("--") => {
                return Err(anyhow!("unknown flag {}\n{}", other, USAGE));
            }
            other => {
                if args.input.is_some() {
                    return Err(anyhow!("only one input file may be given\n{}", USAGE));
                }
                args.input = Some(PathBuf::from(other));
            }
        }
    }
    if args.mock == args.input.is_some() {
        return Err(anyhow!("give exactly one of --mock or an input file\n{}", USAGE));
    }
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let mut cfg = ReportConfig::from_env();
    if let Some(out) = &args.out {
        cfg.out_dir = out.clone();
    }
    if args.per_section {
        cfg.insight_mode = InsightMode::PerSection;
    }

    let mut slot = DatasetSlot::new();
    let loaded = match &args.input {
        Some(path) => slot.load_file(path),
        None => slot.load_mock(MOCK_SCENARIOS),
    };
    let loaded = match loaded {
        Ok(loaded) => loaded.clone(),
        Err(err) => {
            eprintln!("{}", err.user_message());
            std::process::exit(2);
        }
    };
    if !loaded.warnings.is_empty() {
        eprintln!("warnings: {}", serde_json::to_string(&loaded.warnings)?);
    }

    let (service, credential): (Arc<dyn NarrativeService>, Option<String>) = if args.offline {
        (
            Arc::new(StaticNarrative::offline(&loaded.data)),
            Some("offline".to_string()),
        )
    } else {
        (Arc::new(GeminiService::from_config(&cfg)), cfg.api_key.clone())
    };

    let generator = ReportGenerator::new(
        service,
        Arc::new(DirectoryStore::new(cfg.out_dir.clone())),
        RunSettings::from_config(&cfg),
    );

    let mut status = generator.subscribe();
    let printer = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let s = status.borrow_and_update().clone();
            eprintln!("[{}] {}", s.state.as_str(), s.message);
            if s.state.is_terminal() {
                break;
            }
        }
    });

    let outcome = generator
        .generate(Some(&loaded), credential.as_deref())
        .await;
    let _ = printer.await;

    match outcome {
        Ok(artifact) => {
            log(
                Level::Info,
                Domain::System,
                "report_ready",
                obj(&[
                    ("path", v_str(&artifact.path.display().to_string())),
                    ("sha256", v_str(&artifact.sha256)),
                    ("pages", v_num(artifact.pages as f64)),
                ]),
            );
            println!("{}", artifact.path.display());
            Ok(())
        }
        Err(err) => {
            eprintln!("{}", err.user_message());
            std::process::exit(1);
        }
    }
}
