//! The fixed report layout: title page, then the four narrative sections.

use chrono::NaiveDate;

use crate::aggregate::{kpi_summary, performance_drivers, DriverTable, VariableAverage};
use crate::chart::ChartImages;
use crate::compose::{Canvas, DocumentComposer, PageGeometry, PdfCanvas, Table, TextStyle};
use crate::data::{ExperimentData, GeneratedInsights};
use crate::error::ReportResult;
use crate::insight::Section;
use crate::logging::{log, obj, v_num, Domain, Level, StageScope};

pub const DOCUMENT_TITLE: &str = "Process Optimization Report";
const SUBTITLE: &str = "Experimental Analysis & KPI Optimization";

#[derive(Debug, Clone, Copy)]
pub struct ComposeOptions {
    pub generated: NaiveDate,
    pub driver_fraction: f64,
    pub driver_limit: usize,
}

#[derive(Debug, Clone)]
pub struct ComposedDocument {
    pub bytes: Vec<u8>,
    pub pages: usize,
}

/// `experiment-report-YYYY-MM-DD.pdf`
pub fn report_file_name(date: NaiveDate) -> String {
    format!("experiment-report-{}.pdf", date.format("%Y-%m-%d"))
}

fn title_page<C: Canvas>(
    doc: &mut DocumentComposer<C>,
    data: &ExperimentData,
    opts: &ComposeOptions,
) {
    let kpi = kpi_summary(data);
    doc.place_centered(DOCUMENT_TITLE, 60.0, TextStyle::bold(24.0));
    doc.place_centered(SUBTITLE, 75.0, TextStyle::regular(14.0));
    doc.place_centered(&format!("KPI: {}", kpi.name), 90.0, TextStyle::regular(12.0));
    doc.place_centered(
        &format!("Report Generated: {}", opts.generated.format("%B %-d, %Y")),
        105.0,
        TextStyle::regular(10.0),
    );
    doc.place_centered("Report Summary", 130.0, TextStyle::bold(11.0));

    let summary = [
        format!("Total Scenarios Tested: {}", kpi.count),
        format!("KPI Range: {:.2} - {:.2}", kpi.min, kpi.max),
        format!("Top Variables Analyzed: {}", data.top_variables.len()),
    ];
    for (i, line) in summary.iter().enumerate() {
        doc.place_centered(line, 145.0 + 7.0 * i as f64, TextStyle::regular(10.0));
    }
    doc.new_page();
}

fn average_cell(avg: &VariableAverage) -> String {
    if avg.is_degraded() {
        "n/a".to_string()
    } else {
        format!("{:.2}", avg.value)
    }
}

pub fn driver_table(drivers: &DriverTable) -> Table {
    let n = drivers.group_size;
    Table {
        header: vec![
            "Variable".to_string(),
            format!("Top {} Avg", n),
            format!("Bottom {} Avg", n),
            "Impact %".to_string(),
        ],
        rows: drivers
            .rows
            .iter()
            .map(|row| {
                vec![
                    row.key.clone(),
                    average_cell(&row.top),
                    average_cell(&row.bottom),
                    format!("{:.1}%", row.weightage),
                ]
            })
            .collect(),
        columns: vec![0.4, 0.2, 0.2, 0.2],
    }
}

fn insights_block<C: Canvas>(doc: &mut DocumentComposer<C>, text: &str) {
    doc.add_subsection_title("Insights");
    doc.add_paragraph(text);
    doc.add_space(10.0);
}

/// Lay out the full report onto `canvas` and hand it back.
pub fn compose_report<C: Canvas>(
    canvas: C,
    data: &ExperimentData,
    insights: &GeneratedInsights,
    charts: &ChartImages,
    opts: &ComposeOptions,
) -> ReportResult<DocumentComposer<C>> {
    let mut doc = DocumentComposer::new(canvas, PageGeometry::A4);
    title_page(&mut doc, data, opts);

    doc.add_section_title(Section::ExecutiveSummary.title());
    doc.add_paragraph(insights.section(Section::ExecutiveSummary));
    doc.add_space(10.0);

    doc.add_section_title(Section::VariableAnalysis.title());
    doc.add_image(&charts.bar_chart, 140.0, 85.0, "Figure 1. Variable impact ranking")?;
    insights_block(&mut doc, insights.section(Section::VariableAnalysis));

    doc.add_section_title(Section::ScenarioComparison.title());
    doc.add_image(&charts.line_chart, 160.0, 90.0, "Figure 2. KPI values across all scenarios")?;
    doc.add_image(
        &charts.comparison_chart,
        140.0,
        105.0,
        "Figure 3. Top vs bottom performing scenarios",
    )?;
    insights_block(&mut doc, insights.section(Section::ScenarioComparison));

    let drivers = performance_drivers(data, opts.driver_fraction, opts.driver_limit);
    doc.add_section_title(Section::PerformanceDrivers.title());
    doc.add_subsection_title("Variable Configuration Comparison");
    doc.add_note(&format!(
        "Comparison of average variable values between top {n} and bottom {n} performing scenarios.",
        n = drivers.group_size
    ));
    doc.add_table(&driver_table(&drivers))?;
    let unmatched = drivers.unmatched_keys();
    if !unmatched.is_empty() {
        log(
            Level::Warn,
            Domain::Compose,
            "driver_values_unmatched",
            obj(&[("count", v_num(unmatched.len() as f64))]),
        );
        doc.add_note(&format!(
            "No matching variable values were found in either group for: {}.",
            unmatched.join(", ")
        ));
    }
    insights_block(&mut doc, insights.section(Section::PerformanceDrivers));

    Ok(doc)
}

/// Compose the report straight to PDF bytes.
pub fn render_pdf(
    data: &ExperimentData,
    insights: &GeneratedInsights,
    charts: &ChartImages,
    opts: &ComposeOptions,
) -> ReportResult<ComposedDocument> {
    let mut scope = StageScope::new(Domain::Compose, "pdf");
    let result = PdfCanvas::new(DOCUMENT_TITLE, PageGeometry::A4)
        .and_then(|canvas| compose_report(canvas, data, insights, charts, opts))
        .and_then(|doc| {
            let pages = doc.pages();
            doc.into_canvas()
                .into_bytes()
                .map(|bytes| ComposedDocument { bytes, pages })
        });
    match &result {
        Ok(composed) => log(
            Level::Info,
            Domain::Compose,
            "document_composed",
            obj(&[
                ("pages", v_num(composed.pages as f64)),
                ("bytes", v_num(composed.bytes.len() as f64)),
            ]),
        ),
        Err(_) => scope.fail(),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DriverRow;
    use crate::chart::EncodedImage;
    use crate::compose::{DrawOp, RecordingCanvas};
    use crate::data::fixture::mock_experiment;

    fn blank() -> EncodedImage {
        EncodedImage {
            png: Vec::new(),
            width: 800,
            height: 600,
        }
    }

    fn charts() -> ChartImages {
        ChartImages {
            bar_chart: blank(),
            line_chart: blank(),
            comparison_chart: blank(),
        }
    }

    fn insights() -> GeneratedInsights {
        GeneratedInsights {
            executive_summary: "Exec body.".into(),
            variable_analysis: "Variable body.".into(),
            scenario_comparison: "Comparison body.".into(),
            performance_drivers: "Drivers body.".into(),
        }
    }

    fn opts() -> ComposeOptions {
        ComposeOptions {
            generated: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
            driver_fraction: 0.2,
            driver_limit: 8,
        }
    }

    fn compose_for(scenarios: usize) -> DocumentComposer<RecordingCanvas> {
        let data = mock_experiment(scenarios);
        compose_report(RecordingCanvas::new(), &data, &insights(), &charts(), &opts()).unwrap()
    }

    #[test]
    fn file_name_uses_iso_date() {
        assert_eq!(
            report_file_name(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()),
            "experiment-report-2024-03-07.pdf"
        );
    }

    #[test]
    fn sections_follow_canonical_order() {
        let doc = compose_for(20);
        let canvas = doc.into_canvas();
        let order = [
            DOCUMENT_TITLE,
            "Executive Summary",
            "Exec body.",
            "Variable Analysis",
            "Variable body.",
            "Scenario Comparison",
            "Comparison body.",
            "Performance Drivers",
            "Drivers body.",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|needle| {
                canvas
                    .ops
                    .iter()
                    .position(|op| {
                        matches!(op, DrawOp::Text { text, .. } if text.as_str() == *needle)
                    })
                    .unwrap_or_else(|| panic!("missing {}", needle))
            })
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(canvas.page_of(DOCUMENT_TITLE), Some(0));
        assert_eq!(canvas.page_of("Executive Summary"), Some(1));
    }

    #[test]
    fn title_page_carries_summary() {
        let doc = compose_for(12);
        let canvas = doc.into_canvas();
        assert_eq!(canvas.page_of("Total Scenarios Tested: 12"), Some(0));
        assert_eq!(canvas.page_of("Report Generated: March 7, 2024"), Some(0));
        assert_eq!(canvas.page_of("KPI: Heat Recovery Efficiency"), Some(0));
    }

    #[test]
    fn driver_table_formats_cells() {
        let table = driver_table(&DriverTable {
            group_size: 4,
            rows: vec![DriverRow {
                key: "HEX-100.hot_fluid_flow".into(),
                weightage: 35.0,
                top: VariableAverage { value: 12.346, matched: 4, total: 4 },
                bottom: VariableAverage { value: 0.0, matched: 0, total: 4 },
            }],
        });
        assert_eq!(table.header[1], "Top 4 Avg");
        assert_eq!(table.rows[0], vec!["HEX-100.hot_fluid_flow", "12.35", "n/a", "35.0%"]);
    }

    #[test]
    fn driver_header_uses_quintile_size() {
        let doc = compose_for(23);
        let canvas = doc.into_canvas();
        assert!(canvas.page_of("Top 5 Avg").is_some());
        assert!(canvas.page_of("Bottom 5 Avg").is_some());
    }
}
