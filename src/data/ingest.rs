use serde::Serialize;
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::aggregate::scenario_label_number;
use crate::data::{fixture, ExperimentData};
use crate::error::{ReportError, ReportResult};
use crate::logging::{log, obj, v_num, v_str, Domain, Level};

/// Non-fatal findings about an otherwise usable dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetWarnings {
    pub inconsistent_kpi_names: Vec<String>,
    pub duplicate_labels: Vec<String>,
    pub unnumbered_labels: Vec<String>,
    pub colliding_impact_keys: Vec<String>,
    /// JSON paths that were null or mistyped and got replaced or dropped.
    pub coerced_fields: Vec<String>,
}

impl DatasetWarnings {
    pub fn is_empty(&self) -> bool {
        self.inconsistent_kpi_names.is_empty()
            && self.duplicate_labels.is_empty()
            && self.unnumbered_labels.is_empty()
            && self.colliding_impact_keys.is_empty()
            && self.coerced_fields.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub data: Arc<ExperimentData>,
    pub sha256: String,
    pub source: String,
    pub warnings: DatasetWarnings,
}

/// Holds the most recently loaded dataset. A failed load never replaces it.
#[derive(Debug, Default)]
pub struct DatasetSlot {
    current: Option<LoadedDataset>,
}

impl DatasetSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&LoadedDataset> {
        self.current.as_ref()
    }

    pub fn data(&self) -> Option<Arc<ExperimentData>> {
        self.current.as_ref().map(|d| Arc::clone(&d.data))
    }

    pub fn load_json(&mut self, source: &str, text: &str) -> ReportResult<&LoadedDataset> {
        let (parsed, coerced) = match parse_with_repairs(text) {
            Ok(parsed) => parsed,
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::Ingest,
                    "load_rejected",
                    obj(&[("source", v_str(source)), ("error", v_str(&err.to_string()))]),
                );
                return Err(err);
            }
        };
        Ok(self.install(source, fingerprint(text.as_bytes()), parsed, coerced))
    }

    pub fn load_file(&mut self, path: &Path) -> ReportResult<&LoadedDataset> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ReportError::Ingest(format!("cannot read {}: {}", path.display(), e)))?;
        self.load_json(&path.display().to_string(), &text)
    }

    pub fn load_mock(&mut self, scenarios: usize) -> ReportResult<&LoadedDataset> {
        let data = fixture::mock_experiment(scenarios);
        let bytes = serde_json::to_vec(&data).map_err(|e| ReportError::Ingest(e.to_string()))?;
        Ok(self.install("mock", fingerprint(&bytes), data, Vec::new()))
    }

    fn install(
        &mut self,
        source: &str,
        sha256: String,
        data: ExperimentData,
        coerced: Vec<String>,
    ) -> &LoadedDataset {
        let mut warnings = inspect(&data);
        warnings.coerced_fields = coerced;
        log(
            Level::Info,
            Domain::Ingest,
            "loaded",
            obj(&[
                ("source", v_str(source)),
                ("sha256", v_str(&sha256)),
                ("scenarios", v_num(data.scenarios().len() as f64)),
                ("warnings", serde_json::to_value(&warnings).unwrap_or(Value::Null)),
            ]),
        );
        self.current.insert(LoadedDataset {
            data: Arc::new(data),
            sha256,
            source: source.to_string(),
            warnings,
        })
    }
}

/// Parse an uploaded results file, wrapped (`{"data": {...}}`) or bare.
pub fn parse_experiment_json(text: &str) -> ReportResult<ExperimentData> {
    parse_with_repairs(text).map(|(data, _)| data)
}

/// Like [`parse_experiment_json`], also returning the paths of fields that
/// were null or mistyped. Only a missing scenario list is fatal.
pub fn parse_with_repairs(text: &str) -> ReportResult<(ExperimentData, Vec<String>)> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ReportError::Ingest(format!("not valid JSON: {}", e)))?;
    let inner = match value {
        Value::Object(mut map) if map.get("data").map_or(false, Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    let Value::Object(mut map) = inner else {
        return Err(ReportError::Ingest("top-level value is not an object".to_string()));
    };

    let mut coerced = Vec::new();
    repair_record(&mut map, DATASET, "", &mut coerced);

    let scenarios = map
        .get_mut("simulated_summary")
        .and_then(Value::as_object_mut)
        .and_then(|summary| summary.get_mut("simulated_data"))
        .filter(|list| list.is_array());
    let Some(scenarios) = scenarios else {
        return Err(ReportError::Ingest(
            "simulated_summary.simulated_data is missing or not a list".to_string(),
        ));
    };
    repair_value(
        scenarios,
        Shape::List(SCENARIO),
        "simulated_summary.simulated_data",
        &mut coerced,
    );

    let data = serde_json::from_value(Value::Object(map))
        .map_err(|e| ReportError::Ingest(e.to_string()))?;
    Ok((data, coerced))
}

/// Expected JSON shape of a field, used to repair uploads before decoding.
#[derive(Clone, Copy)]
enum Shape {
    Text,
    Number,
    NumberMap,
    List(&'static [Field]),
}

type Field = (&'static str, Shape);

const VARIABLE: &[Field] = &[
    ("name", Shape::Text),
    ("type", Shape::Text),
    ("value", Shape::Number),
    ("unit", Shape::Text),
];

const TOP_VARIABLE: &[Field] = &[
    ("equipment", Shape::Text),
    ("name", Shape::Text),
    ("type", Shape::Text),
    ("value", Shape::Number),
    ("unit", Shape::Text),
];

const SETPOINT_IMPACT: &[Field] = &[
    ("equipment", Shape::Text),
    ("setpoint", Shape::Text),
    ("weightage", Shape::Number),
    ("unit", Shape::Text),
];

const CONDITION_IMPACT: &[Field] = &[
    ("equipment", Shape::Text),
    ("condition", Shape::Text),
    ("weightage", Shape::Number),
    ("unit", Shape::Text),
];

const EQUIPMENT: &[Field] = &[("equipment", Shape::Text), ("variables", Shape::List(VARIABLE))];

const SCENARIO: &[Field] = &[
    ("scenario", Shape::Text),
    ("equipment_specification", Shape::List(EQUIPMENT)),
    ("kpi", Shape::Text),
    ("kpi_value", Shape::Number),
];

const DATASET: &[Field] = &[
    ("main_summary_text", Shape::Text),
    ("top_summary_text", Shape::Text),
    ("top_impact", Shape::NumberMap),
    ("top_variables", Shape::List(TOP_VARIABLE)),
    ("impact_summary_text", Shape::Text),
    ("setpoint_impact_summary", Shape::List(SETPOINT_IMPACT)),
    ("condition_impact_summary", Shape::List(CONDITION_IMPACT)),
];

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

/// Unrepairable fields are removed so the serde default applies.
fn repair_record(
    map: &mut Map<String, Value>,
    fields: &[Field],
    path: &str,
    coerced: &mut Vec<String>,
) {
    for (name, shape) in fields {
        let here = join_path(path, name);
        let Some(value) = map.get_mut(*name) else { continue };
        if !repair_value(value, *shape, &here, coerced) {
            map.remove(*name);
            coerced.push(here);
        }
    }
}

/// Returns false when `value` cannot take `shape` and must be dropped.
fn repair_value(value: &mut Value, shape: Shape, path: &str, coerced: &mut Vec<String>) -> bool {
    match shape {
        Shape::Text => {
            let text = match value {
                Value::String(_) => return true,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return false,
            };
            *value = Value::String(text);
        }
        Shape::Number => {
            let number = match value {
                Value::Number(_) => return true,
                Value::String(s) => match s.trim().parse::<f64>().ok().and_then(Number::from_f64) {
                    Some(n) => n,
                    None => return false,
                },
                _ => return false,
            };
            *value = Value::Number(number);
        }
        Shape::NumberMap => {
            let Value::Object(entries) = value else { return false };
            entries.retain(|key, entry| {
                let here = join_path(path, key);
                let kept = repair_value(entry, Shape::Number, &here, coerced);
                if !kept {
                    coerced.push(here);
                }
                kept
            });
            return true;
        }
        Shape::List(fields) => {
            let Value::Array(items) = value else { return false };
            let mut index = 0;
            items.retain_mut(|item| {
                let here = format!("{}[{}]", path, index);
                index += 1;
                match item {
                    Value::Object(record) => {
                        repair_record(record, fields, &here, coerced);
                        true
                    }
                    _ => {
                        coerced.push(here);
                        false
                    }
                }
            });
            return true;
        }
    }
    coerced.push(path.to_string());
    true
}

/// Preconditions a dataset must meet before any report work starts.
pub fn validate_for_report(data: &ExperimentData) -> ReportResult<()> {
    if data.scenarios().is_empty() {
        return Err(ReportError::Validation(
            "experiment data contains no simulated scenarios".to_string(),
        ));
    }
    Ok(())
}

pub fn inspect(data: &ExperimentData) -> DatasetWarnings {
    let mut warnings = DatasetWarnings::default();

    if let Some(first) = data.scenarios().first() {
        let mut seen = HashSet::new();
        for s in data.scenarios() {
            if s.kpi_name != first.kpi_name && seen.insert(s.kpi_name.clone()) {
                warnings.inconsistent_kpi_names.push(s.kpi_name.clone());
            }
        }
    }

    let mut labels = HashSet::new();
    for s in data.scenarios() {
        if !labels.insert(s.scenario.as_str()) && !warnings.duplicate_labels.contains(&s.scenario) {
            warnings.duplicate_labels.push(s.scenario.clone());
        }
        if scenario_label_number(&s.scenario).is_none() {
            warnings.unnumbered_labels.push(s.scenario.clone());
        }
    }

    let setpoint_keys: HashSet<String> = data
        .setpoint_impact_summary
        .iter()
        .map(|s| format!("{}.{}", s.equipment, s.setpoint))
        .collect();
    for c in &data.condition_impact_summary {
        let key = format!("{}.{}", c.equipment, c.condition);
        if setpoint_keys.contains(&key) && !warnings.colliding_impact_keys.contains(&key) {
            warnings.colliding_impact_keys.push(key);
        }
    }

    warnings
}

pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
