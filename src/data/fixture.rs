//! Built-in mock dataset for offline runs and tests.

use std::collections::BTreeMap;

use crate::data::{
    ConditionImpact, EquipmentSpecification, ExperimentData, ScenarioData, SetpointImpact,
    SimulatedSummary, TopVariable, Variable, VariableKind,
};

pub const MOCK_KPI: &str = "Heat Recovery Efficiency";
/// Scenario count used by `--mock`.
pub const MOCK_SCENARIOS: usize = 25;

fn var(name: &str, kind: VariableKind, value: f64, unit: &str) -> Variable {
    Variable {
        name: name.to_string(),
        kind,
        value,
        unit: unit.to_string(),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn mock_scenario(i: usize) -> ScenarioData {
    // Cheap deterministic spread over the operating window.
    let phase = (i * 7 % 11) as f64 / 10.0;
    let drift = (i * 3 % 5) as f64 / 4.0;

    let hot_flow = round2(8.0 + 6.0 * phase);
    let outlet_temp = round2(60.0 + 15.0 * drift);
    let cold_temp = round2(18.0 + 8.0 * (1.0 - phase));
    let pressure = round2(3.0 + 1.5 * drift);
    let speed = round2(1450.0 + 100.0 * phase);

    let kpi = 40.0 + 2.8 * hot_flow - 0.35 * (outlet_temp - 60.0) - 0.6 * (cold_temp - 18.0)
        + 1.2 * pressure
        + 0.004 * (speed - 1450.0);

    ScenarioData {
        scenario: format!("Scenario {}", i),
        equipment_specification: vec![
            EquipmentSpecification {
                equipment: "HEX-100".to_string(),
                variables: vec![
                    var("hot_fluid_flow", VariableKind::Setpoint, hot_flow, "kg/s"),
                    var("outlet_temperature", VariableKind::Setpoint, outlet_temp, "C"),
                    var("cold_fluid_temperature", VariableKind::Condition, cold_temp, "C"),
                ],
            },
            EquipmentSpecification {
                equipment: "PUMP-200".to_string(),
                variables: vec![var("discharge_pressure", VariableKind::Setpoint, pressure, "bar")],
            },
            // Second instance of the same pump tag, variables named with the tag prefix.
            EquipmentSpecification {
                equipment: "PUMP-200".to_string(),
                variables: vec![var("PUMP-200 - speed", VariableKind::Setpoint, speed, "rpm")],
            },
        ],
        kpi_name: MOCK_KPI.to_string(),
        kpi_value: round2(kpi),
    }
}

fn setpoint(equipment: &str, name: &str, weightage: f64, unit: &str) -> SetpointImpact {
    SetpointImpact {
        equipment: equipment.to_string(),
        setpoint: name.to_string(),
        weightage,
        unit: unit.to_string(),
    }
}

/// Deterministic dataset with `scenarios` trials labelled `Scenario 1..=n`.
pub fn mock_experiment(scenarios: usize) -> ExperimentData {
    let simulated_data: Vec<ScenarioData> = (1..=scenarios).map(mock_scenario).collect();

    let setpoint_impact_summary = vec![
        setpoint("HEX-100", "hot_fluid_flow", 35.0, "kg/s"),
        setpoint("HEX-100", "outlet_temperature", 20.0, "C"),
        setpoint("PUMP-200", "discharge_pressure", 15.0, "bar"),
        setpoint("PUMP-200", "speed", 10.0, "rpm"),
    ];
    let condition_impact_summary = vec![ConditionImpact {
        equipment: "HEX-100".to_string(),
        condition: "cold_fluid_temperature".to_string(),
        weightage: 20.0,
        unit: "C".to_string(),
    }];

    let mut top_impact = BTreeMap::new();
    top_impact.insert("HEX-100.hot_fluid_flow".to_string(), 35.0);
    top_impact.insert("HEX-100.outlet_temperature".to_string(), 20.0);
    top_impact.insert("HEX-100.cold_fluid_temperature".to_string(), 20.0);

    let top_variables = simulated_data
        .first()
        .map(|s| {
            s.equipment_specification[0]
                .variables
                .iter()
                .map(|v| TopVariable {
                    equipment: "HEX-100".to_string(),
                    variable: v.clone(),
                })
                .collect()
        })
        .unwrap_or_default();

    ExperimentData {
        main_summary_text: format!(
            "{} simulated scenarios were run across the heat recovery train to maximise {}.",
            scenarios, MOCK_KPI
        ),
        top_summary_text: "Hot fluid flow on HEX-100 dominates the KPI response, followed by outlet \
                           temperature and cold fluid inlet temperature."
            .to_string(),
        top_impact,
        top_variables,
        impact_summary_text: "Setpoints account for 80% of the explained KPI variance; the cold \
                              fluid inlet temperature is the only significant condition."
            .to_string(),
        setpoint_impact_summary,
        condition_impact_summary,
        simulated_summary: SimulatedSummary { simulated_data },
    }
}
