//! Reshaping of server JSON into the canonical parameter and result shapes.
//!
//! Both server families describe task parameters with their own key names
//! (`dataType`/`parameterType` on ESE, `type`/`displayName`/`default` on
//! SDK). Everything is folded into [`Parameter`]. The functions here accept
//! the canonical shape as input too, so normalizing twice changes nothing.

use std::ops::{Deref, Index};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{GsfError, GsfResult};

/// Whether a parameter is supplied to or produced by a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "input",
            Direction::Output => "output",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "input" => Some(Direction::Input),
            "output" => Some(Direction::Output),
            _ => None,
        }
    }
}

/// A task parameter definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Parameter {
    pub name: String,
    pub display_name: String,

    /// Base type, without any array suffix.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Array dimensions as `[dim1,dim2,...]` when the type was array-qualified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<String>,

    pub direction: Direction,
    pub description: String,

    /// Must be supplied when submitting a job.
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choice_list: Option<Vec<Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
}

impl Parameter {
    pub fn is_array(&self) -> bool {
        self.dimensions.is_some()
    }
}

/// Normalize one raw parameter description.
///
/// `direction` overrides whatever the raw record says; SDK servers list
/// inputs and outputs separately and do not tag each parameter.
pub fn normalize_parameter(raw: &Value, direction: Option<Direction>) -> GsfResult<Parameter> {
    let obj = raw
        .as_object()
        .ok_or_else(|| GsfError::MalformedResponse(format!("parameter is not an object: {raw}")))?;

    let name = text(obj, &["name"])
        .ok_or_else(|| GsfError::MalformedResponse(format!("parameter without a name: {raw}")))?;

    let raw_type = text(obj, &["type", "dataType"]).ok_or_else(|| {
        GsfError::MalformedResponse(format!("parameter {name} has no type"))
    })?;
    let (type_name, dimensions) = match raw_type.split_once('[') {
        Some((base, rest)) => (base.to_string(), Some(format!("[{rest}"))),
        None => (raw_type, text(obj, &["dimensions"])),
    };

    let direction = match direction {
        Some(d) => d,
        None => text(obj, &["direction"])
            .as_deref()
            .and_then(Direction::parse)
            .ok_or_else(|| {
                GsfError::MalformedResponse(format!("parameter {name} has no valid direction"))
            })?,
    };

    let required = match obj.get("required") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => obj.get("parameterType").and_then(Value::as_str) == Some("required"),
    };

    let choice_list = match field(obj, &["choice_list", "choiceList"]) {
        Some(Value::Array(items)) => Some(items.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(vec![other.clone()]),
    };

    Ok(Parameter {
        display_name: text(obj, &["display_name", "displayName"]).unwrap_or_else(|| name.clone()),
        description: text(obj, &["description"]).unwrap_or_default(),
        default_value: field(obj, &["default_value", "defaultValue", "default"]).cloned(),
        min: field(obj, &["min"]).cloned(),
        max: field(obj, &["max"]).cloned(),
        name,
        type_name,
        dimensions,
        direction,
        required,
        choice_list,
    })
}

/// Normalize a list of raw parameter descriptions, keeping their order.
pub fn normalize_parameters(raw: &Value, direction: Option<Direction>) -> GsfResult<Vec<Parameter>> {
    match raw {
        Value::Array(items) => items
            .iter()
            .map(|p| normalize_parameter(p, direction))
            .collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(GsfError::MalformedResponse(format!(
            "parameter list is not an array: {other}"
        ))),
    }
}

/// Job outputs keyed by parameter name.
///
/// Serializes as a list of `{name, value}` records, the shape
/// [`flatten_results`] takes verbatim, so a serialized result set flattens
/// back to itself even when a value is an object with its own `best` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<ResultRecord>", from = "Vec<ResultRecord>")]
pub struct JobResults(Map<String, Value>);

/// One output of a job, as it appears in a record list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResultRecord {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl JobResults {
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl Deref for JobResults {
    type Target = Map<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Missing outputs read as `null`.
impl Index<&str> for JobResults {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.0.get(name).unwrap_or(&NULL)
    }
}

impl From<Map<String, Value>> for JobResults {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Vec<ResultRecord>> for JobResults {
    fn from(records: Vec<ResultRecord>) -> Self {
        Self(records.into_iter().map(|r| (r.name, r.value)).collect())
    }
}

impl From<JobResults> for Vec<ResultRecord> {
    fn from(results: JobResults) -> Self {
        results
            .0
            .into_iter()
            .map(|(name, value)| ResultRecord { name, value })
            .collect()
    }
}

/// Flatten job results into an output name → value map.
///
/// Accepts a list of `{name, value}` records, taken as-is, or a mapping
/// whose entries may wrap the value under a `best` key. Only the outer
/// wrapper is removed.
pub fn flatten_results(raw: &Value) -> GsfResult<JobResults> {
    match raw {
        Value::Null => Ok(JobResults::default()),
        Value::Array(records) => records
            .iter()
            .map(|record| {
                let name = record.get("name").and_then(Value::as_str).ok_or_else(|| {
                    GsfError::MalformedResponse(format!("result record without a name: {record}"))
                })?;
                let value = record.get("value").cloned().unwrap_or(Value::Null);
                Ok((name.to_string(), value))
            })
            .collect::<GsfResult<Map<_, _>>>()
            .map(JobResults),
        Value::Object(entries) => Ok(JobResults(
            entries
                .iter()
                .map(|(name, value)| {
                    let unwrapped = match value {
                        Value::Object(inner) if inner.contains_key("best") => inner["best"].clone(),
                        other => other.clone(),
                    };
                    (name.clone(), unwrapped)
                })
                .collect(),
        )),
        other => Err(GsfError::MalformedResponse(format!(
            "job results are neither a list nor a mapping: {other}"
        ))),
    }
}

/// Task metadata in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskInfo {
    pub name: String,
    pub service_name: String,
    pub display_name: String,
    pub description: String,
    pub parameters: Vec<Parameter>,
}

/// Names listed under `key`, given either as plain strings or as objects
/// with a `name` field.
pub fn name_list(doc: &Value, key: &str) -> GsfResult<Vec<String>> {
    let items = doc
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| GsfError::MalformedResponse(format!("response has no `{key}` list")))?;
    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => other
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| GsfError::MalformedResponse(format!("unnamed entry in `{key}`: {other}"))),
        })
        .collect()
}

/// Optional text field of a response document; null counts as absent.
pub(crate) fn text_field(doc: &Value, key: &str) -> Option<String> {
    doc.as_object().and_then(|obj| text(obj, &[key]))
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

/// First present key, rendered as text. Null counts as absent.
fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    field(obj, keys).and_then(|v| match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    })
}
