use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use process_report::data::fixture::mock_experiment;
use process_report::error::{ReportError, ReportResult};
use process_report::insight::{
    request_narrative_insights, InsightMode, InsightOptions, NarrativeService, Section,
};

/// Answers each per-section prompt with that section's markers.
struct SectionEcho {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    fail_on: Option<Section>,
}

impl SectionEcho {
    fn new(fail_on: Option<Section>) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            fail_on,
        }
    }
}

#[async_trait]
impl NarrativeService for SectionEcho {
    async fn generate(&self, credential: &str, prompt: &str) -> ReportResult<String> {
        assert_eq!(credential, "secret");
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let section = Section::ALL
            .into_iter()
            .find(|s| prompt.contains(&s.open_marker()))
            .ok_or(ReportError::EmptyResponse)?;
        if self.fail_on == Some(section) {
            return Err(ReportError::Transport("HTTP 503: overloaded".to_string()));
        }
        Ok(format!(
            "{}\n{} insight.\n{}",
            section.open_marker(),
            section.title(),
            section.close_marker()
        ))
    }
}

fn per_section() -> InsightOptions {
    InsightOptions {
        mode: InsightMode::PerSection,
        ..InsightOptions::default()
    }
}

#[tokio::test]
async fn per_section_requests_run_concurrently() {
    let data = mock_experiment(15);
    let service = SectionEcho::new(None);
    let insights = request_narrative_insights(&service, &data, "secret", &per_section())
        .await
        .unwrap();

    assert_eq!(insights.executive_summary, "Executive Summary insight.");
    assert_eq!(insights.performance_drivers, "Performance Drivers insight.");
    assert_eq!(service.prompts.lock().unwrap().len(), 4);
    assert_eq!(service.peak.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn one_failed_section_fails_the_whole_call() {
    let data = mock_experiment(15);
    let service = SectionEcho::new(Some(Section::ScenarioComparison));
    let err = request_narrative_insights(&service, &data, "secret", &per_section())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "transport");
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn combined_mode_sends_one_prompt() {
    let data = mock_experiment(6);
    let service = SectionEcho::new(None);
    // The echo service only answers the first marker it finds, so the
    // combined reply is missing three sections.
    let err = request_narrative_insights(&service, &data, "secret", &InsightOptions::default())
        .await
        .unwrap_err();
    assert_eq!(service.prompts.lock().unwrap().len(), 1);
    assert_eq!(err.kind(), "parse");
}

struct Blank;

#[async_trait]
impl NarrativeService for Blank {
    async fn generate(&self, _credential: &str, _prompt: &str) -> ReportResult<String> {
        Ok("   \n".to_string())
    }
}

#[tokio::test]
async fn blank_reply_is_empty_response_in_both_modes() {
    let data = mock_experiment(6);
    for opts in [InsightOptions::default(), per_section()] {
        let err = request_narrative_insights(&Blank, &data, "secret", &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::EmptyResponse), "{:?}", opts.mode);
    }
}
