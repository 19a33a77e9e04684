//! Chart specifications derived from the dataset. No drawing happens here.

use crate::aggregate::{chronological, combined_impact_ranking, short_label, top_bottom_scenarios};
use crate::data::ExperimentData;

pub type Rgb = (u8, u8, u8);

pub const HIGH_IMPACT: Rgb = (255, 77, 79);
pub const MEDIUM_IMPACT: Rgb = (250, 173, 20);
pub const MODERATE_IMPACT: Rgb = (82, 196, 26);
pub const LOW_IMPACT: Rgb = (24, 144, 255);
pub const KPI_LINE: Rgb = (75, 192, 192);

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChartBody {
    /// Rows top to bottom; `None` leaves an empty separator row.
    HorizontalBars { rows: Vec<Option<Bar>> },
    Line { points: Vec<(String, f64)>, color: Rgb },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    /// Stable identifier used in logs and errors.
    pub id: &'static str,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub body: ChartBody,
    /// Preferred raster size in pixels.
    pub size: (u32, u32),
}

pub fn impact_color(weightage: f64) -> Rgb {
    if weightage >= 40.0 {
        HIGH_IMPACT
    } else if weightage >= 25.0 {
        MEDIUM_IMPACT
    } else if weightage >= 15.0 {
        MODERATE_IMPACT
    } else {
        LOW_IMPACT
    }
}

/// Ranked impact of every setpoint and condition variable.
pub fn impact_bar_spec(data: &ExperimentData) -> ChartSpec {
    let rows = combined_impact_ranking(data)
        .entries
        .into_iter()
        .map(|e| {
            Some(Bar {
                color: impact_color(e.weightage),
                label: e.key,
                value: e.weightage,
            })
        })
        .collect();
    ChartSpec {
        id: "impact_bar",
        title: "Variable Impact Ranking".to_string(),
        x_label: "Impact Weightage (%)".to_string(),
        y_label: String::new(),
        body: ChartBody::HorizontalBars { rows },
        size: (800, 600),
    }
}

/// KPI per scenario in label order.
pub fn kpi_line_spec(data: &ExperimentData) -> ChartSpec {
    let points = chronological(data.scenarios())
        .into_iter()
        .map(|s| (short_label(&s.scenario), s.kpi_value))
        .collect();
    ChartSpec {
        id: "kpi_line",
        title: "KPI Values Across All Scenarios".to_string(),
        x_label: "Scenario Number".to_string(),
        y_label: data.kpi_name().unwrap_or("KPI Value").to_string(),
        body: ChartBody::Line {
            points,
            color: KPI_LINE,
        },
        size: (800, 400),
    }
}

/// Best `count` scenarios, a separator, then worst `count` (worst first).
pub fn comparison_spec(data: &ExperimentData, count: usize) -> ChartSpec {
    let split = top_bottom_scenarios(data.scenarios(), count);
    let bar = |label: &str, value: f64, color: Rgb| {
        Some(Bar {
            label: short_label(label),
            value,
            color,
        })
    };
    let mut rows: Vec<Option<Bar>> = split
        .top
        .iter()
        .map(|s| bar(&s.scenario, s.kpi_value, MODERATE_IMPACT))
        .collect();
    rows.push(None);
    rows.extend(
        split
            .bottom
            .iter()
            .map(|s| bar(&s.scenario, s.kpi_value, HIGH_IMPACT)),
    );
    ChartSpec {
        id: "comparison",
        title: format!("Top {n} vs Bottom {n} Scenarios", n = split.group_size()),
        x_label: data.kpi_name().unwrap_or("KPI Value").to_string(),
        y_label: "Scenario".to_string(),
        body: ChartBody::HorizontalBars { rows },
        size: (800, 600),
    }
}
