use process_report::aggregate::{
    average_variable_across_scenarios, combined_impact_ranking, performance_drivers,
    top_bottom_scenarios,
};
use process_report::data::fixture::mock_experiment;
use process_report::data::{
    ConditionImpact, EquipmentSpecification, ExperimentData, ScenarioData, SetpointImpact,
    SimulatedSummary, Variable, VariableKind,
};

fn scenario(n: usize, kpi: f64) -> ScenarioData {
    ScenarioData {
        scenario: format!("Scenario {}", n),
        equipment_specification: vec![EquipmentSpecification {
            equipment: "A".to_string(),
            variables: vec![Variable {
                name: "temp".to_string(),
                kind: VariableKind::Setpoint,
                value: kpi * 2.0,
                unit: "C".to_string(),
            }],
        }],
        kpi_name: "Yield".to_string(),
        kpi_value: kpi,
    }
}

fn dataset(scenarios: Vec<ScenarioData>) -> ExperimentData {
    ExperimentData {
        main_summary_text: String::new(),
        top_summary_text: String::new(),
        top_impact: Default::default(),
        top_variables: Vec::new(),
        impact_summary_text: String::new(),
        setpoint_impact_summary: vec![SetpointImpact {
            equipment: "A".to_string(),
            setpoint: "temp".to_string(),
            weightage: 30.0,
            unit: "C".to_string(),
        }],
        condition_impact_summary: vec![ConditionImpact {
            equipment: "A".to_string(),
            condition: "temp".to_string(),
            weightage: 10.0,
            unit: "C".to_string(),
        }],
        simulated_summary: SimulatedSummary {
            simulated_data: scenarios,
        },
    }
}

#[test]
fn twelve_scenarios_split_three_each_way() {
    let data = dataset((1..=12).map(|i| scenario(i, i as f64)).collect());
    let split = top_bottom_scenarios(data.scenarios(), 3);
    let top: Vec<f64> = split.top.iter().map(|s| s.kpi_value).collect();
    let bottom: Vec<f64> = split.bottom.iter().map(|s| s.kpi_value).collect();
    assert_eq!(top, vec![12.0, 11.0, 10.0]);
    assert_eq!(bottom, vec![1.0, 2.0, 3.0]);
}

#[test]
fn colliding_key_resolves_to_condition_value() {
    let data = dataset(vec![scenario(1, 1.0)]);
    let ranking = combined_impact_ranking(&data);
    assert_eq!(ranking.entries.len(), 1);
    assert_eq!(ranking.entries[0].key, "A.temp");
    assert_eq!(ranking.entries[0].weightage, 10.0);
    assert_eq!(ranking.collisions, vec!["A.temp".to_string()]);
}

#[test]
fn top_group_dominates_bottom_when_disjoint() {
    let data = mock_experiment(40);
    for k in [1, 5, 20] {
        let split = top_bottom_scenarios(data.scenarios(), k);
        assert_eq!(split.top.len(), k);
        let worst_top = split.top.iter().map(|s| s.kpi_value).fold(f64::INFINITY, f64::min);
        let best_bottom = split
            .bottom
            .iter()
            .map(|s| s.kpi_value)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(worst_top >= best_bottom);
    }
}

#[test]
fn unknown_variable_average_is_degraded_zero() {
    let data = mock_experiment(10);
    let avg = average_variable_across_scenarios(data.scenarios(), "NOPE-1", "ghost");
    assert_eq!(avg.value, 0.0);
    assert!(avg.is_degraded());
    assert_eq!(avg.total, 10);
}

#[test]
fn driver_table_matches_repeated_equipment_entries() {
    let data = mock_experiment(25);
    let table = performance_drivers(&data, 0.2, 8);
    assert_eq!(table.group_size, 5);
    assert_eq!(table.rows.len(), 5);
    assert!(table.rows.windows(2).all(|w| w[0].weightage >= w[1].weightage));
    // PUMP-200 appears twice per scenario; its speed lives in the second entry.
    let speed = table.rows.iter().find(|r| r.key == "PUMP-200.speed").unwrap();
    assert_eq!(speed.top.matched, 5);
    assert!(table.unmatched_keys().is_empty());
}
