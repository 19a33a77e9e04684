//! Pure aggregation over an `ExperimentData` value.
//!
//! Nothing here mutates the dataset or performs I/O; results borrow from the
//! input where possible.

use std::collections::HashMap;

use crate::data::{ExperimentData, ImpactCategory, ImpactEntry, ScenarioData};

/// One row of the merged setpoint + condition ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedImpact {
    /// `"{equipment}.{field_name}"`
    pub key: String,
    pub equipment: String,
    pub field_name: String,
    pub weightage: f64,
    pub unit: String,
    pub category: ImpactCategory,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImpactRanking {
    /// Sorted non-increasing by weightage.
    pub entries: Vec<RankedImpact>,
    /// Keys listed as both setpoint and condition; the condition value won.
    pub collisions: Vec<String>,
}

/// Merge setpoint and condition impacts into one ranking.
///
/// Colliding keys resolve last-write-wins (condition over setpoint) and keep
/// the slot of their first appearance. Equal weightages keep merge order.
pub fn combined_impact_ranking(data: &ExperimentData) -> ImpactRanking {
    let mut entries: Vec<RankedImpact> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut collisions = Vec::new();

    for ImpactEntry {
        category,
        equipment,
        field_name,
        weightage,
        unit,
    } in data.impact_entries()
    {
        let key = format!("{}.{}", equipment, field_name);
        let ranked = RankedImpact {
            key: key.clone(),
            equipment,
            field_name,
            weightage,
            unit,
            category,
        };
        match index.get(&key) {
            Some(&slot) => {
                if !collisions.contains(&key) {
                    collisions.push(key);
                }
                entries[slot] = ranked;
            }
            None => {
                index.insert(key, entries.len());
                entries.push(ranked);
            }
        }
    }

    // sort_by is stable, so ties keep merge order.
    entries.sort_by(|a, b| b.weightage.total_cmp(&a.weightage));
    ImpactRanking { entries, collisions }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSplit<'a> {
    /// Best first.
    pub top: Vec<&'a ScenarioData>,
    /// Worst first, i.e. the last `k` by KPI read from the bottom up.
    pub bottom: Vec<&'a ScenarioData>,
}

impl<'a> ScenarioSplit<'a> {
    pub fn group_size(&self) -> usize {
        self.top.len()
    }
}

/// Scenarios sorted by KPI, highest first. Stable for equal KPI values.
pub fn sorted_by_kpi(scenarios: &[ScenarioData]) -> Vec<&ScenarioData> {
    let mut sorted: Vec<&ScenarioData> = scenarios.iter().collect();
    sorted.sort_by(|a, b| b.kpi_value.total_cmp(&a.kpi_value));
    sorted
}

/// Best `k` and worst `k` scenarios. The two lists overlap when `n < 2k`.
pub fn top_bottom_scenarios(scenarios: &[ScenarioData], k: usize) -> ScenarioSplit<'_> {
    let sorted = sorted_by_kpi(scenarios);
    let k = k.min(sorted.len());
    let top = sorted[..k].to_vec();
    let bottom = sorted[sorted.len() - k..].iter().rev().copied().collect();
    ScenarioSplit { top, bottom }
}

/// Group size for a fractional split: `ceil(n * fraction)`, fraction clamped to `[0, 1]`.
pub fn split_size(n: usize, fraction: f64) -> usize {
    let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
    ((n as f64) * fraction).ceil() as usize
}

/// Top and bottom `fraction` of scenarios (0.2 gives quintiles).
pub fn percentile_split(scenarios: &[ScenarioData], fraction: f64) -> ScenarioSplit<'_> {
    top_bottom_scenarios(scenarios, split_size(scenarios.len(), fraction))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableAverage {
    /// Mean over matched scenarios; `0.0` when nothing matched.
    pub value: f64,
    pub matched: usize,
    pub total: usize,
}

impl VariableAverage {
    /// No scenario carried the variable, so `value` is not a real average.
    pub fn is_degraded(&self) -> bool {
        self.matched == 0
    }

    pub fn is_partial(&self) -> bool {
        self.matched > 0 && self.matched < self.total
    }
}

/// Find `field_name` among one equipment entry's variables.
///
/// Exact name wins, then `"{equipment} - {field}"`, then a suffix match.
fn match_variable<'a>(
    variables: &'a [crate::data::Variable],
    equipment: &str,
    field_name: &str,
) -> Option<&'a crate::data::Variable> {
    let prefixed = format!("{} - {}", equipment, field_name);
    variables
        .iter()
        .find(|v| v.name == field_name)
        .or_else(|| variables.iter().find(|v| v.name == prefixed))
        .or_else(|| {
            if field_name.is_empty() {
                None
            } else {
                variables.iter().find(|v| v.name.ends_with(field_name))
            }
        })
}

/// Value of `equipment.field_name` in one scenario.
///
/// Repeated equipment entries are searched in order and the first entry that
/// yields a match is used, so a scenario contributes at most one value.
pub fn scenario_variable_value(
    scenario: &ScenarioData,
    equipment: &str,
    field_name: &str,
) -> Option<f64> {
    scenario
        .equipment_specification
        .iter()
        .filter(|spec| spec.equipment == equipment)
        .find_map(|spec| match_variable(&spec.variables, equipment, field_name))
        .map(|v| v.value)
}

pub fn average_variable_across_scenarios<'a, I>(
    scenarios: I,
    equipment: &str,
    field_name: &str,
) -> VariableAverage
where
    I: IntoIterator<Item = &'a ScenarioData>,
{
    let mut sum = 0.0;
    let mut matched = 0usize;
    let mut total = 0usize;
    for scenario in scenarios {
        total += 1;
        if let Some(value) = scenario_variable_value(scenario, equipment, field_name) {
            sum += value;
            matched += 1;
        }
    }
    let value = if matched > 0 { sum / matched as f64 } else { 0.0 };
    VariableAverage { value, matched, total }
}

/// Trailing integer of a scenario label (`"Scenario 12"` -> 12).
pub fn scenario_label_number(label: &str) -> Option<u64> {
    let trimmed = label.trim_end();
    let digits_start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    trimmed[digits_start..].parse().ok()
}

/// Sort key for chronological order; unnumbered labels go last.
pub fn sort_scenario_label(label: &str) -> u64 {
    scenario_label_number(label).unwrap_or(u64::MAX)
}

/// Scenarios in label order rather than KPI order. Stable for ties.
pub fn chronological(scenarios: &[ScenarioData]) -> Vec<&ScenarioData> {
    let mut ordered: Vec<&ScenarioData> = scenarios.iter().collect();
    ordered.sort_by_key(|s| sort_scenario_label(&s.scenario));
    ordered
}

/// Short axis label: the trailing number if present, otherwise the full label.
pub fn short_label(label: &str) -> String {
    scenario_label_number(label)
        .map(|n| n.to_string())
        .unwrap_or_else(|| label.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiSummary {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
    /// Every scenario reports the same KPI name.
    pub consistent_name: bool,
}

pub fn kpi_summary(data: &ExperimentData) -> KpiSummary {
    let scenarios = data.scenarios();
    let name = data.kpi_name().unwrap_or("N/A").to_string();
    if scenarios.is_empty() {
        return KpiSummary {
            name,
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            count: 0,
            consistent_name: true,
        };
    }
    let (min, max, sum) = scenarios.iter().fold(
        (f64::INFINITY, f64::NEG_INFINITY, 0.0),
        |(lo, hi, sum), s| (lo.min(s.kpi_value), hi.max(s.kpi_value), sum + s.kpi_value),
    );
    let consistent_name = scenarios
        .iter()
        .all(|s| s.kpi_name == scenarios[0].kpi_name);
    KpiSummary {
        name,
        min,
        max,
        mean: sum / scenarios.len() as f64,
        count: scenarios.len(),
        consistent_name,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverRow {
    pub key: String,
    pub weightage: f64,
    pub top: VariableAverage,
    pub bottom: VariableAverage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverTable {
    /// Scenarios in each of the top and bottom groups.
    pub group_size: usize,
    /// Ordered by descending weightage.
    pub rows: Vec<DriverRow>,
}

impl DriverTable {
    /// Keys for which neither group matched a value.
    pub fn unmatched_keys(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|r| r.top.is_degraded() && r.bottom.is_degraded())
            .map(|r| r.key.as_str())
            .collect()
    }
}

/// Compare the highest-impact variables between the top and bottom groups.
pub fn performance_drivers(data: &ExperimentData, fraction: f64, limit: usize) -> DriverTable {
    let split = percentile_split(data.scenarios(), fraction);
    let ranking = combined_impact_ranking(data);
    let rows = ranking
        .entries
        .iter()
        .take(limit)
        .map(|entry| DriverRow {
            key: entry.key.clone(),
            weightage: entry.weightage,
            top: average_variable_across_scenarios(
                split.top.iter().copied(),
                &entry.equipment,
                &entry.field_name,
            ),
            bottom: average_variable_across_scenarios(
                split.bottom.iter().copied(),
                &entry.equipment,
                &entry.field_name,
            ),
        })
        .collect();
    DriverTable {
        group_size: split.group_size(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        ConditionImpact, EquipmentSpecification, SetpointImpact, SimulatedSummary, Variable,
        VariableKind,
    };
    use std::collections::BTreeMap;

    fn scenario(label: &str, kpi: f64) -> ScenarioData {
        ScenarioData {
            scenario: label.to_string(),
            equipment_specification: Vec::new(),
            kpi_name: "yield".to_string(),
            kpi_value: kpi,
        }
    }

    fn with_equipment(mut s: ScenarioData, equipment: &str, vars: &[(&str, f64)]) -> ScenarioData {
        s.equipment_specification.push(EquipmentSpecification {
            equipment: equipment.to_string(),
            variables: vars
                .iter()
                .map(|(name, value)| Variable {
                    name: name.to_string(),
                    kind: VariableKind::Setpoint,
                    value: *value,
                    unit: String::new(),
                })
                .collect(),
        });
        s
    }

    fn dataset(
        setpoints: &[(&str, &str, f64)],
        conditions: &[(&str, &str, f64)],
        scenarios: Vec<ScenarioData>,
    ) -> ExperimentData {
        ExperimentData {
            main_summary_text: String::new(),
            top_summary_text: String::new(),
            top_impact: BTreeMap::new(),
            top_variables: Vec::new(),
            impact_summary_text: String::new(),
            setpoint_impact_summary: setpoints
                .iter()
                .map(|(e, f, w)| SetpointImpact {
                    equipment: e.to_string(),
                    setpoint: f.to_string(),
                    weightage: *w,
                    unit: String::new(),
                })
                .collect(),
            condition_impact_summary: conditions
                .iter()
                .map(|(e, f, w)| ConditionImpact {
                    equipment: e.to_string(),
                    condition: f.to_string(),
                    weightage: *w,
                    unit: String::new(),
                })
                .collect(),
            simulated_summary: SimulatedSummary { simulated_data: scenarios },
        }
    }

    #[test]
    fn test_ranking_sorted_and_counted() {
        let data = dataset(
            &[("A", "temp", 10.0), ("B", "flow", 40.0)],
            &[("C", "ambient", 25.0)],
            Vec::new(),
        );
        let ranking = combined_impact_ranking(&data);
        let keys: Vec<&str> = ranking.entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["B.flow", "C.ambient", "A.temp"]);
        assert!(ranking.collisions.is_empty());
    }

    #[test]
    fn test_ranking_collision_condition_wins() {
        let data = dataset(&[("A", "temp", 30.0)], &[("A", "temp", 10.0)], Vec::new());
        let ranking = combined_impact_ranking(&data);
        assert_eq!(ranking.entries.len(), 1);
        assert_eq!(ranking.entries[0].key, "A.temp");
        assert_eq!(ranking.entries[0].weightage, 10.0);
        assert_eq!(ranking.entries[0].category, ImpactCategory::Condition);
        assert_eq!(ranking.collisions, vec!["A.temp".to_string()]);
    }

    #[test]
    fn test_ranking_ties_keep_merge_order() {
        let data = dataset(&[("A", "x", 20.0)], &[("B", "y", 20.0)], Vec::new());
        let ranking = combined_impact_ranking(&data);
        assert_eq!(ranking.entries[0].key, "A.x");
        assert_eq!(ranking.entries[1].key, "B.y");
    }

    #[test]
    fn test_top_bottom_twelve_by_three() {
        let scenarios: Vec<ScenarioData> = (1..=12)
            .map(|i| scenario(&format!("Scenario {}", i), i as f64))
            .collect();
        let split = top_bottom_scenarios(&scenarios, 3);
        let top: Vec<f64> = split.top.iter().map(|s| s.kpi_value).collect();
        let bottom: Vec<f64> = split.bottom.iter().map(|s| s.kpi_value).collect();
        assert_eq!(top, vec![12.0, 11.0, 10.0]);
        assert_eq!(bottom, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_top_bottom_clamps_and_overlaps() {
        let scenarios = vec![scenario("S1", 5.0), scenario("S2", 9.0), scenario("S3", 1.0)];
        let split = top_bottom_scenarios(&scenarios, 10);
        assert_eq!(split.top.len(), 3);
        assert_eq!(split.bottom.len(), 3);
        assert_eq!(split.top[0].scenario, "S2");
        assert_eq!(split.bottom[0].scenario, "S3");

        let empty: Vec<ScenarioData> = Vec::new();
        let split = top_bottom_scenarios(&empty, 3);
        assert!(split.top.is_empty() && split.bottom.is_empty());
    }

    #[test]
    fn test_top_dominates_bottom_when_disjoint() {
        let kpis = [3.5, 9.1, 0.2, 7.7, 4.4, 8.8, 1.3, 6.0, 2.9, 5.5];
        let scenarios: Vec<ScenarioData> = kpis
            .iter()
            .enumerate()
            .map(|(i, k)| scenario(&format!("Scenario {}", i + 1), *k))
            .collect();
        for k in 0..=5 {
            let split = top_bottom_scenarios(&scenarios, k);
            assert_eq!(split.top.len(), k);
            assert!(split.top.windows(2).all(|w| w[0].kpi_value >= w[1].kpi_value));
            for t in &split.top {
                for b in &split.bottom {
                    assert!(t.kpi_value >= b.kpi_value);
                }
            }
        }
    }

    #[test]
    fn test_percentile_split_uses_ceiling() {
        assert_eq!(split_size(12, 0.2), 3);
        assert_eq!(split_size(10, 0.2), 2);
        assert_eq!(split_size(1, 0.2), 1);
        assert_eq!(split_size(0, 0.2), 0);
        assert_eq!(split_size(5, 2.0), 5);
        assert_eq!(split_size(5, f64::NAN), 0);

        let scenarios: Vec<ScenarioData> = (1..=12)
            .map(|i| scenario(&format!("Scenario {}", i), i as f64))
            .collect();
        assert_eq!(percentile_split(&scenarios, 0.2).group_size(), 3);
    }

    #[test]
    fn test_average_matches_repeated_equipment_once() {
        let s1 = with_equipment(
            with_equipment(scenario("S1", 1.0), "P-1", &[("speed", 10.0)]),
            "P-1",
            &[("speed", 99.0)],
        );
        let s2 = with_equipment(
            with_equipment(scenario("S2", 2.0), "P-1", &[("pressure", 1.0)]),
            "P-1",
            &[("P-1 - speed", 20.0)],
        );
        let avg = average_variable_across_scenarios([&s1, &s2], "P-1", "speed");
        assert_eq!(avg.matched, 2);
        assert_eq!(avg.total, 2);
        assert!((avg.value - 15.0).abs() < 1e-12);
        assert!(!avg.is_degraded());
    }

    #[test]
    fn test_average_prefers_exact_over_suffix() {
        let s = with_equipment(
            scenario("S1", 1.0),
            "R-1",
            &[("inlet_temp", 300.0), ("temp", 50.0)],
        );
        let avg = average_variable_across_scenarios([&s], "R-1", "temp");
        assert_eq!(avg.value, 50.0);

        let only_suffix = with_equipment(scenario("S2", 1.0), "R-1", &[("inlet_temp", 300.0)]);
        let avg = average_variable_across_scenarios([&only_suffix], "R-1", "temp");
        assert_eq!(avg.value, 300.0);
    }

    #[test]
    fn test_average_unknown_variable_is_degraded_zero() {
        let s = with_equipment(scenario("S1", 1.0), "HEX-1", &[("flow", 3.0)]);
        let avg = average_variable_across_scenarios([&s], "HEX-9", "flow");
        assert_eq!(avg.value, 0.0);
        assert_eq!(avg.matched, 0);
        assert!(avg.is_degraded());

        let avg = average_variable_across_scenarios([&s], "HEX-1", "missing");
        assert!(avg.is_degraded());
    }

    #[test]
    fn test_partial_average() {
        let a = with_equipment(scenario("S1", 1.0), "E", &[("x", 4.0)]);
        let b = scenario("S2", 2.0);
        let avg = average_variable_across_scenarios([&a, &b], "E", "x");
        assert_eq!(avg.value, 4.0);
        assert!(avg.is_partial());
    }

    #[test]
    fn test_scenario_label_numbers() {
        assert_eq!(scenario_label_number("Scenario 12"), Some(12));
        assert_eq!(scenario_label_number("run-007"), Some(7));
        assert_eq!(scenario_label_number("baseline"), None);
        assert_eq!(scenario_label_number("Scenario 3 "), Some(3));
        assert_eq!(sort_scenario_label("baseline"), u64::MAX);
        assert_eq!(short_label("Scenario 4"), "4");
        assert_eq!(short_label("baseline"), "baseline");
    }

    #[test]
    fn test_chronological_order_ignores_insertion_and_kpi() {
        let scenarios = vec![
            scenario("Scenario 10", 1.0),
            scenario("Scenario 2", 5.0),
            scenario("baseline", 9.0),
            scenario("Scenario 1", 3.0),
        ];
        let labels: Vec<&str> = chronological(&scenarios)
            .iter()
            .map(|s| s.scenario.as_str())
            .collect();
        assert_eq!(labels, vec!["Scenario 1", "Scenario 2", "Scenario 10", "baseline"]);
    }

    #[test]
    fn test_kpi_summary() {
        let mut scenarios = vec![scenario("Scenario 1", 2.0), scenario("Scenario 2", 6.0)];
        let data = dataset(&[], &[], scenarios.clone());
        let summary = kpi_summary(&data);
        assert_eq!(summary.name, "yield");
        assert_eq!((summary.min, summary.max, summary.mean), (2.0, 6.0, 4.0));
        assert!(summary.consistent_name);

        scenarios[1].kpi_name = "cost".to_string();
        assert!(!kpi_summary(&dataset(&[], &[], scenarios)).consistent_name);
    }

    #[test]
    fn test_performance_drivers_ordered_and_limited() {
        let scenarios: Vec<ScenarioData> = (1..=10)
            .map(|i| {
                with_equipment(
                    scenario(&format!("Scenario {}", i), i as f64),
                    "HEX",
                    &[("flow", i as f64 * 10.0)],
                )
            })
            .collect();
        let data = dataset(
            &[("HEX", "flow", 60.0), ("HEX", "ghost", 5.0)],
            &[("AMB", "temp", 35.0)],
            scenarios,
        );
        let table = performance_drivers(&data, 0.2, 2);
        assert_eq!(table.group_size, 2);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].key, "HEX.flow");
        assert_eq!(table.rows[0].top.value, 95.0);
        assert_eq!(table.rows[0].bottom.value, 15.0);
        assert_eq!(table.rows[1].key, "AMB.temp");
        assert_eq!(table.unmatched_keys(), vec!["AMB.temp"]);
    }
}
