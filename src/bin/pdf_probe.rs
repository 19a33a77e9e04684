//! Build a report from the mock dataset without any network access.
//!
//! Usage: pdf_probe [out_dir] [scenarios]

use chrono::Local;
use std::env;
use std::path::PathBuf;

use process_report::chart::render_report_charts;
use process_report::compose::{render_pdf, report_file_name, ComposeOptions};
use process_report::data::fixture::{mock_experiment, MOCK_SCENARIOS};
use process_report::insight::{offline_reply, parse_insights};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let out_dir = env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let scenarios = env::args()
        .nth(2)
        .and_then(|v| v.parse().ok())
        .unwrap_or(MOCK_SCENARIOS);

    let data = mock_experiment(scenarios);
    let insights = parse_insights(&offline_reply(&data))?;
    let charts = render_report_charts(&data, 10).await?;
    let today = Local::now().date_naive();
    let doc = render_pdf(
        &data,
        &insights,
        &charts,
        &ComposeOptions {
            generated: today,
            driver_fraction: 0.2,
            driver_limit: 8,
        },
    )?;

    std::fs::create_dir_all(&out_dir)?;
    let path = out_dir.join(report_file_name(today));
    std::fs::write(&path, &doc.bytes)?;
    println!("{} ({} pages, {} bytes)", path.display(), doc.pages, doc.bytes.len());
    Ok(())
}
