//! Prompt text. Pure functions of the dataset: same input, same prompt.

use std::fmt::Write as _;

use crate::aggregate::{
    combined_impact_ranking, kpi_summary, performance_drivers, sorted_by_kpi, KpiSummary,
};
use crate::data::{ExperimentData, ScenarioData};
use crate::insight::{InsightOptions, Section};

const ROLE: &str = "You are an expert process optimization engineer. Analyze the following \
experiment results and provide actionable insights.";

const INSTRUCTIONS: &str = "# INSTRUCTIONS\n\n\
- Explain key findings and their implications for process optimization\n\
- Provide actionable insights based on the data\n\
- Keep each section concise (1 paragraph, 3-5 sentences)\n\
- Use professional engineering language\n\
- Do not use bullet points in the paragraphs\n";

fn task(section: Section) -> &'static str {
    match section {
        Section::ExecutiveSummary => {
            "Strategic overview of the optimization results and key takeaways"
        }
        Section::VariableAnalysis => {
            "Combined insights on top variables, their impacts, and tuning recommendations"
        }
        Section::ScenarioComparison => {
            "Analysis of what differentiates best vs worst performing scenarios"
        }
        Section::PerformanceDrivers => {
            "Analyze variable configurations in top vs bottom scenarios and explain what drives performance differences"
        }
    }
}

fn placeholder(section: Section) -> &'static str {
    match section {
        Section::ExecutiveSummary => "Your executive summary paragraph here.",
        Section::VariableAnalysis => {
            "Your variable analysis paragraph here covering both top variables and their impact insights."
        }
        Section::ScenarioComparison => "Your scenario comparison paragraph here.",
        Section::PerformanceDrivers => {
            "Your analysis of what variable configurations drive top vs bottom performance."
        }
    }
}

fn marker_block(section: Section) -> String {
    format!(
        "{}\n{}\n{}\n",
        section.open_marker(),
        placeholder(section),
        section.close_marker()
    )
}

/// One prompt carrying the full dataset and all four section markers.
pub fn combined_prompt(data: &ExperimentData) -> String {
    let json = serde_json::to_string_pretty(data)
        .unwrap_or_else(|_| summary_block(data, &kpi_summary(data)));

    let mut out = String::new();
    let _ = writeln!(out, "{}\n", ROLE);
    let _ = writeln!(out, "# EXPERIMENT DATA (JSON)\n\n```json\n{}\n```\n", json);
    let _ = writeln!(out, "# YOUR TASK\n");
    let _ = writeln!(
        out,
        "Based on the complete data above, provide insights for a technical PDF report in 4 sections:\n"
    );
    for (i, section) in Section::ALL.iter().enumerate() {
        let _ = writeln!(out, "{}. **{}** - {}", i + 1, section.title(), task(*section));
    }
    let _ = writeln!(out, "\n{}", INSTRUCTIONS);
    let _ = writeln!(out, "# OUTPUT FORMAT\n\nUse these exact section markers:\n");
    for section in Section::ALL {
        let _ = writeln!(out, "{}", marker_block(section));
    }
    out.push_str("Begin your analysis now:");
    out
}

fn summary_block(data: &ExperimentData, kpi: &KpiSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "KPI: {}", kpi.name);
    let _ = writeln!(out, "Total Scenarios Tested: {}", kpi.count);
    let _ = writeln!(out, "KPI Range: {:.2} to {:.2} (mean {:.2})", kpi.min, kpi.max, kpi.mean);
    if !data.main_summary_text.is_empty() {
        let _ = writeln!(out, "Main Summary: {}", data.main_summary_text);
    }
    out
}

fn describe_scenario(s: &ScenarioData) -> String {
    let vars: Vec<String> = s
        .equipment_specification
        .iter()
        .flat_map(|eq| {
            eq.variables
                .iter()
                .map(move |v| format!("{}.{}: {} {}", eq.equipment, v.name, v.value, v.unit))
        })
        .collect();
    format!("{} (KPI {:.2}): {}", s.scenario, s.kpi_value, vars.join(", "))
}

/// `top_impact` entries, largest share first. Equal shares keep key order.
fn impacts_by_weight(data: &ExperimentData) -> Vec<(&str, f64)> {
    let mut impacts: Vec<(&str, f64)> =
        data.top_impact.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    impacts.sort_by(|a, b| b.1.total_cmp(&a.1));
    impacts
}

fn section_context(data: &ExperimentData, section: Section, opts: &InsightOptions) -> String {
    let kpi = kpi_summary(data);
    let mut out = summary_block(data, &kpi);

    match section {
        Section::ExecutiveSummary => {
            if !data.top_summary_text.is_empty() {
                let _ = writeln!(out, "Top Summary: {}", data.top_summary_text);
            }
            let _ = writeln!(out, "\nTop Impact Variables:");
            for (key, value) in impacts_by_weight(data) {
                let _ = writeln!(out, "- {}: {:.2}%", key, value);
            }
        }
        Section::VariableAnalysis => {
            let _ = writeln!(out, "\nTop Variables:");
            for tv in &data.top_variables {
                let _ = writeln!(
                    out,
                    "{} - {}: {} {} (Type: {:?})",
                    tv.equipment,
                    tv.variable.name,
                    tv.variable.value,
                    tv.variable.unit,
                    tv.variable.kind
                );
            }
            let _ = writeln!(out, "\nImpact Ranking:");
            for entry in combined_impact_ranking(data).entries {
                let _ = writeln!(
                    out,
                    "{} ({}): {:.2}% ({})",
                    entry.key,
                    entry.category.as_str(),
                    entry.weightage,
                    entry.unit
                );
            }
            if !data.impact_summary_text.is_empty() {
                let _ = writeln!(out, "\nContext: {}", data.impact_summary_text);
            }
        }
        Section::ScenarioComparison => {
            let sorted = sorted_by_kpi(data.scenarios());
            if let (Some(best), Some(worst)) = (sorted.first(), sorted.last()) {
                let _ = writeln!(out, "\nBest Performing Scenario: {}", describe_scenario(best));
                let _ = writeln!(out, "Worst Performing Scenario: {}", describe_scenario(worst));
            }
        }
        Section::PerformanceDrivers => {
            let table = performance_drivers(data, opts.driver_fraction, opts.driver_limit);
            let _ = writeln!(
                out,
                "\nAverage variable values, top {n} vs bottom {n} scenarios:",
                n = table.group_size
            );
            for row in &table.rows {
                let _ = writeln!(
                    out,
                    "- {} (impact {:.1}%): top {:.2}, bottom {:.2}{}",
                    row.key,
                    row.weightage,
                    row.top.value,
                    row.bottom.value,
                    if row.top.is_degraded() || row.bottom.is_degraded() {
                        " [no matched values]"
                    } else {
                        ""
                    }
                );
            }
        }
    }
    out
}

/// Prompt for a single section, built from aggregates rather than raw JSON.
pub fn section_prompt(data: &ExperimentData, section: Section, opts: &InsightOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}\n", ROLE);
    let _ = writeln!(out, "# EXPERIMENT SUMMARY\n\n{}", section_context(data, section, opts));
    let _ = writeln!(out, "# YOUR TASK\n\n**{}** - {}\n", section.title(), task(section));
    let _ = writeln!(out, "{}", INSTRUCTIONS);
    let _ = writeln!(out, "# OUTPUT FORMAT\n\nUse these exact section markers:\n");
    let _ = writeln!(out, "{}", marker_block(section));
    out.push_str("Begin your analysis now:");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixture::mock_experiment;

    #[test]
    fn combined_prompt_carries_every_marker_and_the_data() {
        let data = mock_experiment(6);
        let prompt = combined_prompt(&data);
        for s in Section::ALL {
            assert!(prompt.contains(&s.open_marker()));
            assert!(prompt.contains(&s.close_marker()));
        }
        assert!(prompt.contains("\"simulated_data\""));
        assert!(prompt.contains("Scenario 6"));
    }

    #[test]
    fn prompts_are_deterministic() {
        let data = mock_experiment(8);
        assert_eq!(combined_prompt(&data), combined_prompt(&data));
        let opts = InsightOptions::default();
        assert_eq!(
            section_prompt(&data, Section::PerformanceDrivers, &opts),
            section_prompt(&data, Section::PerformanceDrivers, &opts)
        );
    }

    #[test]
    fn section_prompt_only_requests_its_own_markers() {
        let data = mock_experiment(10);
        let prompt = section_prompt(&data, Section::ScenarioComparison, &InsightOptions::default());
        assert!(prompt.contains("[SCENARIO_COMPARISON]"));
        assert!(!prompt.contains("[EXECUTIVE_SUMMARY]"));
        assert!(prompt.contains("Best Performing Scenario"));
    }

    #[test]
    fn driver_prompt_lists_group_sizes() {
        let data = mock_experiment(10);
        let prompt = section_prompt(&data, Section::PerformanceDrivers, &InsightOptions::default());
        assert!(prompt.contains("top 2 vs bottom 2"));
        assert!(prompt.contains("HEX-100.hot_fluid_flow"));
    }

    #[test]
    fn executive_prompt_lists_impacts_by_weight() {
        let mut data = mock_experiment(6);
        data.top_impact.insert("AAA-1.minor".to_string(), 1.5);
        data.top_impact.insert("ZZZ-9.major".to_string(), 80.0);
        let prompt = section_prompt(&data, Section::ExecutiveSummary, &InsightOptions::default());
        let at = |needle: &str| prompt.find(needle).unwrap();
        assert!(at("- ZZZ-9.major: 80.00%") < at("- HEX-100.hot_fluid_flow: 35.00%"));
        assert!(at("- HEX-100.hot_fluid_flow") < at("- HEX-100.cold_fluid_temperature"));
        assert!(at("- HEX-100.cold_fluid_temperature") < at("- HEX-100.outlet_temperature"));
        assert!(at("- HEX-100.outlet_temperature") < at("- AAA-1.minor: 1.50%"));
    }
}
