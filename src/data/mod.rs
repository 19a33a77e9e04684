//! Experiment-result schema.
//!
//! Field names follow the uploaded JSON exactly. Everything except the
//! scenario list defaults when absent so that a structurally odd upload
//! still aggregates (with degraded results) instead of failing outright.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod fixture;
pub mod ingest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VariableKind {
    Setpoint,
    Condition,
    #[default]
    #[serde(other)]
    Unspecified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: VariableKind,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopVariable {
    #[serde(default)]
    pub equipment: String,
    #[serde(flatten)]
    pub variable: Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetpointImpact {
    #[serde(default)]
    pub equipment: String,
    #[serde(default)]
    pub setpoint: String,
    #[serde(default)]
    pub weightage: f64,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionImpact {
    #[serde(default)]
    pub equipment: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub weightage: f64,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImpactCategory {
    Setpoint,
    Condition,
}

impl ImpactCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactCategory::Setpoint => "setpoint",
            ImpactCategory::Condition => "condition",
        }
    }
}

/// Setpoint and condition impacts viewed through one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactEntry {
    pub category: ImpactCategory,
    pub equipment: String,
    pub field_name: String,
    /// Percent of KPI variance, 0..=100.
    pub weightage: f64,
    pub unit: String,
}

impl ImpactEntry {
    /// `"{equipment}.{field_name}"`
    pub fn key(&self) -> String {
        format!("{}.{}", self.equipment, self.field_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentSpecification {
    #[serde(default)]
    pub equipment: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioData {
    #[serde(default)]
    pub scenario: String,
    #[serde(default)]
    pub equipment_specification: Vec<EquipmentSpecification>,
    #[serde(rename = "kpi", default)]
    pub kpi_name: String,
    #[serde(default)]
    pub kpi_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedSummary {
    pub simulated_data: Vec<ScenarioData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentData {
    #[serde(default)]
    pub main_summary_text: String,
    #[serde(default)]
    pub top_summary_text: String,
    /// `"{equipment}.{field}" -> percent`
    #[serde(default)]
    pub top_impact: BTreeMap<String, f64>,
    #[serde(default)]
    pub top_variables: Vec<TopVariable>,
    #[serde(default)]
    pub impact_summary_text: String,
    #[serde(default)]
    pub setpoint_impact_summary: Vec<SetpointImpact>,
    #[serde(default)]
    pub condition_impact_summary: Vec<ConditionImpact>,
    pub simulated_summary: SimulatedSummary,
}

impl ExperimentData {
    pub fn scenarios(&self) -> &[ScenarioData] {
        &self.simulated_summary.simulated_data
    }

    /// Setpoint entries first, then condition entries, each in input order.
    pub fn impact_entries(&self) -> Vec<ImpactEntry> {
        let setpoints = self.setpoint_impact_summary.iter().map(|s| ImpactEntry {
            category: ImpactCategory::Setpoint,
            equipment: s.equipment.clone(),
            field_name: s.setpoint.clone(),
            weightage: s.weightage,
            unit: s.unit.clone(),
        });
        let conditions = self.condition_impact_summary.iter().map(|c| ImpactEntry {
            category: ImpactCategory::Condition,
            equipment: c.equipment.clone(),
            field_name: c.condition.clone(),
            weightage: c.weightage,
            unit: c.unit.clone(),
        });
        setpoints.chain(conditions).collect()
    }

    /// KPI name as reported by the first scenario.
    pub fn kpi_name(&self) -> Option<&str> {
        self.scenarios()
            .first()
            .map(|s| s.kpi_name.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// Four narrative sections produced once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedInsights {
    pub executive_summary: String,
    pub variable_analysis: String,
    pub scenario_comparison: String,
    pub performance_drivers: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_type_maps_to_kind() {
        let v: Variable = serde_json::from_str(
            r#"{"name":"cold_fluid_temperature","type":"Condition","value":25.5,"unit":"C"}"#,
        )
        .unwrap();
        assert_eq!(v.kind, VariableKind::Condition);

        let odd: Variable =
            serde_json::from_str(r#"{"name":"x","type":"Derived","value":1.0}"#).unwrap();
        assert_eq!(odd.kind, VariableKind::Unspecified);
        assert_eq!(odd.unit, "");
    }

    #[test]
    fn top_variable_flattens_equipment() {
        let tv: TopVariable = serde_json::from_str(
            r#"{"equipment":"HEX-100","name":"hot_fluid_flow","type":"Setpoint","value":12.0,"unit":"kg/s"}"#,
        )
        .unwrap();
        assert_eq!(tv.equipment, "HEX-100");
        assert_eq!(tv.variable.kind, VariableKind::Setpoint);
    }

    #[test]
    fn impact_entries_keep_setpoints_before_conditions() {
        let data = ExperimentData {
            main_summary_text: String::new(),
            top_summary_text: String::new(),
            top_impact: BTreeMap::new(),
            top_variables: Vec::new(),
            impact_summary_text: String::new(),
            setpoint_impact_summary: vec![SetpointImpact {
                equipment: "A".into(),
                setpoint: "temp".into(),
                weightage: 30.0,
                unit: "C".into(),
            }],
            condition_impact_summary: vec![ConditionImpact {
                equipment: "B".into(),
                condition: "flow".into(),
                weightage: 70.0,
                unit: "kg/s".into(),
            }],
            simulated_summary: SimulatedSummary { simulated_data: Vec::new() },
        };
        let entries = data.impact_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key(), "A.temp");
        assert_eq!(entries[0].category, ImpactCategory::Setpoint);
        assert_eq!(entries[1].key(), "B.flow");
        assert!(data.kpi_name().is_none());
    }
}
