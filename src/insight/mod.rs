//! Narrative insights: prompt construction, the narrative-service seam, and
//! parsing of the markered response format.
//!
//! The service must reproduce `[SECTION] ... [/SECTION]` markers verbatim.
//! A response missing any section fails the whole request; insights are
//! never returned partially populated.

use async_trait::async_trait;
use futures_util::future::try_join_all;

use crate::aggregate::{combined_impact_ranking, kpi_summary, performance_drivers};
use crate::data::{ExperimentData, GeneratedInsights};
use crate::error::{ReportError, ReportResult};
use crate::logging::{log, obj, v_num, v_str, Domain, Level, StageScope};

pub mod gemini;
pub mod prompt;

pub use gemini::GeminiService;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    ExecutiveSummary,
    VariableAnalysis,
    ScenarioComparison,
    PerformanceDrivers,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::ExecutiveSummary,
        Section::VariableAnalysis,
        Section::ScenarioComparison,
        Section::PerformanceDrivers,
    ];

    pub fn marker(&self) -> &'static str {
        match self {
            Section::ExecutiveSummary => "EXECUTIVE_SUMMARY",
            Section::VariableAnalysis => "VARIABLE_ANALYSIS",
            Section::ScenarioComparison => "SCENARIO_COMPARISON",
            Section::PerformanceDrivers => "PERFORMANCE_DRIVERS",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Section::ExecutiveSummary => "Executive Summary",
            Section::VariableAnalysis => "Variable Analysis",
            Section::ScenarioComparison => "Scenario Comparison",
            Section::PerformanceDrivers => "Performance Drivers",
        }
    }

    pub fn open_marker(&self) -> String {
        format!("[{}]", self.marker())
    }

    pub fn close_marker(&self) -> String {
        format!("[/{}]", self.marker())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsightMode {
    /// One request carrying the whole dataset and all four markers.
    Combined,
    /// Four concurrent requests, one per section.
    PerSection,
}

impl InsightMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combined" | "single" => Some(InsightMode::Combined),
            "per_section" | "per-section" | "parallel" => Some(InsightMode::PerSection),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InsightMode::Combined => "combined",
            InsightMode::PerSection => "per_section",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InsightOptions {
    pub mode: InsightMode,
    pub driver_fraction: f64,
    pub driver_limit: usize,
}

impl Default for InsightOptions {
    fn default() -> Self {
        Self {
            mode: InsightMode::Combined,
            driver_fraction: 0.2,
            driver_limit: 8,
        }
    }
}

/// Opaque text-generation boundary: a credential and a prompt in, text out.
#[async_trait]
pub trait NarrativeService: Send + Sync {
    async fn generate(&self, credential: &str, prompt: &str) -> ReportResult<String>;
}

/// Returns a fixed reply. Used for offline runs.
#[derive(Debug, Clone)]
pub struct StaticNarrative {
    reply: String,
}

impl StaticNarrative {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }

    /// A well-formed reply summarising `data` without any model involved.
    pub fn offline(data: &ExperimentData) -> Self {
        Self::new(offline_reply(data))
    }
}

#[async_trait]
impl NarrativeService for StaticNarrative {
    async fn generate(&self, _credential: &str, _prompt: &str) -> ReportResult<String> {
        Ok(self.reply.clone())
    }
}

impl GeneratedInsights {
    pub fn section(&self, section: Section) -> &str {
        match section {
            Section::ExecutiveSummary => &self.executive_summary,
            Section::VariableAnalysis => &self.variable_analysis,
            Section::ScenarioComparison => &self.scenario_comparison,
            Section::PerformanceDrivers => &self.performance_drivers,
        }
    }

    fn from_sections(mut sections: Vec<(Section, String)>) -> ReportResult<Self> {
        let mut take = |wanted: Section| -> ReportResult<String> {
            let idx = sections
                .iter()
                .position(|(s, _)| *s == wanted)
                .ok_or_else(|| ReportError::Parse {
                    section: wanted.marker(),
                    reason: "section missing from response".to_string(),
                })?;
            Ok(sections.swap_remove(idx).1)
        };
        Ok(Self {
            executive_summary: take(Section::ExecutiveSummary)?,
            variable_analysis: take(Section::VariableAnalysis)?,
            scenario_comparison: take(Section::ScenarioComparison)?,
            performance_drivers: take(Section::PerformanceDrivers)?,
        })
    }
}

/// Trimmed text between `[MARKER]` and the first `[/MARKER]` after it.
pub fn extract_section(text: &str, section: Section) -> ReportResult<String> {
    let open = section.open_marker();
    let close = section.close_marker();
    let parse_err = |reason: &str| ReportError::Parse {
        section: section.marker(),
        reason: reason.to_string(),
    };

    let start = text
        .find(&open)
        .ok_or_else(|| parse_err("opening marker not found"))?
        + open.len();
    let len = text[start..]
        .find(&close)
        .ok_or_else(|| parse_err("closing marker not found"))?;
    let content = text[start..start + len].trim();
    if content.is_empty() {
        return Err(parse_err("section is empty"));
    }
    Ok(content.to_string())
}

fn ensure_non_empty(text: String) -> ReportResult<String> {
    if text.trim().is_empty() {
        Err(ReportError::EmptyResponse)
    } else {
        Ok(text)
    }
}

/// Parse a four-section response into insights.
pub fn parse_insights(text: &str) -> ReportResult<GeneratedInsights> {
    if text.trim().is_empty() {
        return Err(ReportError::EmptyResponse);
    }
    let sections = Section::ALL
        .iter()
        .map(|s| extract_section(text, *s).map(|content| (*s, content)))
        .collect::<ReportResult<Vec<_>>>()?;
    GeneratedInsights::from_sections(sections)
}

async fn request_section<S: NarrativeService + ?Sized>(
    service: &S,
    data: &ExperimentData,
    credential: &str,
    section: Section,
    opts: &InsightOptions,
) -> ReportResult<(Section, String)> {
    let prompt = prompt::section_prompt(data, section, opts);
    log(
        Level::Debug,
        Domain::Insight,
        "section_request",
        obj(&[("section", v_str(section.marker())), ("prompt_chars", v_num(prompt.len() as f64))]),
    );
    let reply = ensure_non_empty(service.generate(credential, &prompt).await?)?;
    Ok((section, extract_section(&reply, section)?))
}

/// Generate the four narrative sections for `data`.
///
/// In per-section mode all requests are in flight together and the first
/// failure fails the call. Nothing is retried here.
pub async fn request_narrative_insights<S: NarrativeService + ?Sized>(
    service: &S,
    data: &ExperimentData,
    credential: &str,
    opts: &InsightOptions,
) -> ReportResult<GeneratedInsights> {
    let mut scope = StageScope::new(Domain::Insight, "narrative_insights");
    log(
        Level::Info,
        Domain::Insight,
        "request",
        obj(&[("mode", v_str(opts.mode.as_str()))]),
    );

    let result = match opts.mode {
        InsightMode::Combined => {
            let prompt = prompt::combined_prompt(data);
            match service.generate(credential, &prompt).await.and_then(ensure_non_empty) {
                Ok(reply) => parse_insights(&reply),
                Err(err) => Err(err),
            }
        }
        InsightMode::PerSection => {
            let requests = Section::ALL
                .iter()
                .map(|s| request_section(service, data, credential, *s, opts));
            match try_join_all(requests).await {
                Ok(sections) => GeneratedInsights::from_sections(sections),
                Err(err) => Err(err),
            }
        }
    };

    if let Err(err) = &result {
        scope.fail();
        log(
            Level::Error,
            Domain::Insight,
            "request_failed",
            obj(&[("kind", v_str(err.kind())), ("error", v_str(&err.to_string()))]),
        );
    }
    result
}

/// Deterministic markered reply built from aggregates alone.
pub fn offline_reply(data: &ExperimentData) -> String {
    let kpi = kpi_summary(data);
    let ranking = combined_impact_ranking(data);
    let drivers = performance_drivers(data, 0.2, 3);

    let leader = ranking
        .entries
        .first()
        .map(|e| format!("{} ({:.1}% of KPI variance)", e.key, e.weightage))
        .unwrap_or_else(|| "no ranked variable".to_string());
    let driver_lines: Vec<String> = drivers
        .rows
        .iter()
        .map(|r| {
            format!(
                "{} averages {:.2} in the top group versus {:.2} in the bottom group",
                r.key, r.top.value, r.bottom.value
            )
        })
        .collect();

    let body = |section: Section| -> String {
        match section {
            Section::ExecutiveSummary => format!(
                "{} scenarios were evaluated for {}. Values ranged from {:.2} to {:.2} \
                 with a mean of {:.2}. The most influential variable was {}.",
                kpi.count, kpi.name, kpi.min, kpi.max, kpi.mean, leader
            ),
            Section::VariableAnalysis => format!(
                "{} variables carry a measured impact weightage. {}",
                ranking.entries.len(),
                if data.impact_summary_text.is_empty() {
                    "No impact narrative was supplied."
                } else {
                    data.impact_summary_text.as_str()
                }
            ),
            Section::ScenarioComparison => format!(
                "The spread between the best and worst scenario is {:.2} units of {}.",
                kpi.max - kpi.min, kpi.name
            ),
            Section::PerformanceDrivers => {
                if driver_lines.is_empty() {
                    "No ranked variables were available for comparison.".to_string()
                } else {
                    format!("{}.", driver_lines.join("; "))
                }
            }
        }
    };

    Section::ALL
        .iter()
        .map(|s| format!("{}\n{}\n{}", s.open_marker(), body(*s), s.close_marker()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
