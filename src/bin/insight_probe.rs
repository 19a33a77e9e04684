//! Connectivity check for the narrative service.
//!
//! Usage: insight_probe [prompt]
//! Reads GEMINI_API_KEY / GEMINI_MODEL / GEMINI_BASE from the environment.

use std::env;

use process_report::config::ReportConfig;
use process_report::insight::{GeminiService, NarrativeService};

#[tokio::main]
async fn main() {
    let prompt = env::args()
        .nth(1)
        .unwrap_or_else(|| "Reply with the single word OK.".to_string());
    let cfg = ReportConfig::from_env();
    let key = match cfg.api_key.as_deref() {
        Some(key) => key.to_string(),
        None => {
            eprintln!("Please enter an API key (set GEMINI_API_KEY)");
            std::process::exit(2);
        }
    };

    let service = GeminiService::from_config(&cfg);
    match service.generate(&key, &prompt).await {
        Ok(reply) if reply.trim().is_empty() => {
            eprintln!("model {} returned an empty reply", cfg.model);
            std::process::exit(1);
        }
        Ok(reply) => println!("{}", reply.trim()),
        Err(err) => {
            eprintln!("{} ({})", err, err.kind());
            std::process::exit(1);
        }
    }
}
