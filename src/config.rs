use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::insight::InsightMode;

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub http_timeout_secs: u64,
    pub insight_mode: InsightMode,
    pub out_dir: PathBuf,
    /// Share of scenarios in each performance-driver group.
    pub driver_fraction: f64,
    /// Variables shown in the performance-driver table.
    pub driver_limit: usize,
    /// Scenarios per side in the top/bottom comparison chart.
    pub comparison_count: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com".to_string(),
            http_timeout_secs: 120,
            insight_mode: InsightMode::Combined,
            out_dir: PathBuf::from("."),
            driver_fraction: 0.2,
            driver_limit: 8,
            comparison_count: 10,
        }
    }
}

impl ReportConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            model: env::var("GEMINI_MODEL").unwrap_or(d.model),
            api_base: env::var("GEMINI_BASE").unwrap_or(d.api_base),
            http_timeout_secs: env_parsed("GEMINI_TIMEOUT_SECS").unwrap_or(d.http_timeout_secs),
            insight_mode: env::var("INSIGHT_MODE")
                .ok()
                .and_then(|v| InsightMode::parse(&v))
                .unwrap_or(d.insight_mode),
            out_dir: env::var("REPORT_OUT_DIR").map(PathBuf::from).unwrap_or(d.out_dir),
            driver_fraction: env_parsed("DRIVER_FRACTION").unwrap_or(d.driver_fraction),
            driver_limit: env_parsed("DRIVER_LIMIT").unwrap_or(d.driver_limit),
            comparison_count: env_parsed("COMPARISON_COUNT").unwrap_or(d.comparison_count),
        }
    }
}

/// Unset or unparsable values read as `None`.
fn env_parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
