//! Normalization of raw smart process items into flat time entries
//!
//! Normalization is pure: the same raw item always yields the same entry or
//! the same rejection. Rejections are reported through a caller-supplied
//! [`RejectionSink`] and the item is dropped.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::FieldMap;
use crate::constants;
use crate::record::RawRecord;

/// Billable or non-billable hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    #[serde(rename = "Учитываемые")]
    Billable,
    #[serde(rename = "Неучитываемые")]
    NonBillable,
}

impl EntryType {
    pub fn label(&self) -> &'static str {
        match self {
            EntryType::Billable => constants::BILLABLE_LABEL,
            EntryType::NonBillable => constants::NON_BILLABLE_LABEL,
        }
    }
}

/// One normalized time-tracking record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: String,
    pub entry_title: Option<String>,
    pub task_id: String,
    pub task_name: String,
    pub task_title: Option<String>,
    pub project_id: Option<String>,
    pub project_name: String,
    pub hierarchy_ids: Vec<String>,
    pub hierarchy_titles: Vec<String>,
    pub hours: Decimal,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub date: String,
    pub employee_id: String,
    pub employee_name: Option<String>,
}

impl TimeEntry {
    pub fn is_billable(&self) -> bool {
        self.entry_type == EntryType::Billable
    }
}

/// Reason a raw item was dropped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    #[error("item is not a JSON object")]
    NotAnObject,

    #[error("missing task ID")]
    MissingTaskId,

    #[error("invalid JSON in hierarchy field {field}")]
    InvalidHierarchyJson { field: String },

    #[error("hierarchy field {field} is not an array")]
    HierarchyNotSequence { field: String },
}

/// Receives every rejected item
pub trait RejectionSink {
    fn rejected(&mut self, record_id: &str, reason: &MalformedRecord);
}

/// Logs rejections as warnings
pub struct TracingSink;

impl RejectionSink for TracingSink {
    fn rejected(&mut self, record_id: &str, reason: &MalformedRecord) {
        warn!(record_id, reason = %reason, "Skipping malformed time entry");
    }
}

impl RejectionSink for Vec<(String, MalformedRecord)> {
    fn rejected(&mut self, record_id: &str, reason: &MalformedRecord) {
        self.push((record_id.to_string(), reason.clone()));
    }
}

/// Entries that survived normalization plus the number dropped
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub entries: Vec<TimeEntry>,
    pub skipped: usize,
}

/// Normalize every item, preserving input order
pub fn normalize_all(
    items: Vec<Value>,
    fields: &FieldMap,
    sink: &mut dyn RejectionSink,
) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for item in items {
        let result = match RawRecord::from_value(item) {
            Some(raw) => normalize(&raw, fields).map_err(|reason| (raw.id(), reason)),
            None => Err(("?".to_string(), MalformedRecord::NotAnObject)),
        };

        match result {
            Ok(entry) => batch.entries.push(entry),
            Err((id, reason)) => {
                sink.rejected(&id, &reason);
                batch.skipped += 1;
            }
        }
    }

    info!(
        normalized = batch.entries.len(),
        skipped = batch.skipped,
        "Normalized time entries"
    );

    batch
}

/// Map one raw item to a [`TimeEntry`]
pub fn normalize(raw: &RawRecord, fields: &FieldMap) -> Result<TimeEntry, MalformedRecord> {
    // 1. Task ID is mandatory
    let task_id = raw
        .get_str(&fields.task_id)
        .filter(|v| v != "0" && v != "false")
        .ok_or(MalformedRecord::MissingTaskId)?;

    // 2-3. Hierarchy: decode both fields, then require arrays
    let ids_value = decode_hierarchy(raw, &fields.hierarchy_ids)?;
    let titles_value = decode_hierarchy(raw, &fields.hierarchy_titles)?;
    let hierarchy_ids = into_sequence(ids_value, &fields.hierarchy_ids)?;
    let hierarchy_titles = into_sequence(titles_value, &fields.hierarchy_titles)?;

    // 4. Project
    let project_name = raw
        .get_str(&fields.project_name)
        .or_else(|| hierarchy_titles.first().filter(|t| !t.is_empty()).cloned())
        .unwrap_or_else(|| constants::UNDETERMINED_PROJECT.to_string());

    // 5. Date
    let date = raw
        .get_str(&fields.reflection_date)
        .or_else(|| raw.get_str(&fields.created_time))
        .unwrap_or_default();

    // 6. Billable flag
    let entry_type = if is_truthy(raw.get(&fields.billable)) {
        EntryType::Billable
    } else {
        EntryType::NonBillable
    };

    // 7. Task name
    let task_name = hierarchy_titles
        .last()
        .filter(|t| !t.is_empty())
        .cloned()
        .unwrap_or_else(|| constants::UNTITLED_TASK.to_string());

    // 8. Employee
    let (employee_id, employee_name) = resolve_employee(raw, fields);

    // 9. Hours
    let hours = parse_hours(raw.get(&fields.hours));

    Ok(TimeEntry {
        id: raw.get_str("id").unwrap_or_default(),
        entry_title: raw.get_str(&fields.entry_title),
        task_id,
        task_name,
        task_title: fields.task_title.as_deref().and_then(|f| raw.get_str(f)),
        project_id: raw.get_str(&fields.project_id),
        project_name,
        hierarchy_ids,
        hierarchy_titles,
        hours,
        entry_type,
        date,
        employee_id,
        employee_name,
    })
}

/// Hierarchy fields hold JSON-encoded arrays. Absent or falsy values
/// (`""`, `"0"`, `0`, `false`) mean empty.
fn decode_hierarchy(raw: &RawRecord, field: &str) -> Result<Value, MalformedRecord> {
    match raw.get(field) {
        None => Ok(Value::Array(Vec::new())),
        Some(value) if is_falsy(value) => Ok(Value::Array(Vec::new())),
        Some(Value::String(s)) => {
            serde_json::from_str(s).map_err(|_| MalformedRecord::InvalidHierarchyJson {
                field: field.to_string(),
            })
        }
        Some(other) => Ok(other.clone()),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => {
            let s = s.trim();
            s.is_empty() || s == "0"
        }
        Value::Array(items) => items.is_empty(),
        Value::Object(_) => false,
    }
}

fn into_sequence(value: Value, field: &str) -> Result<Vec<String>, MalformedRecord> {
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()),
        _ => Err(MalformedRecord::HierarchyNotSequence {
            field: field.to_string(),
        }),
    }
}

/// Bitrix24 booleans arrive as "Y", "1", true, or 1
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(s)) => s == "Y" || s == "1",
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}

/// The employee field is either "{id}_{name}" or a bare display name.
/// Without an id in the composite value, the assignee field supplies it.
fn resolve_employee(raw: &RawRecord, fields: &FieldMap) -> (String, Option<String>) {
    let assignee = raw.get_str(&fields.assigned_by).unwrap_or_default();

    let Some(composite) = raw.get_str(&fields.employee) else {
        return (assignee, None);
    };

    match composite.split_once('_') {
        Some((id, name)) => {
            let id = id.trim();
            let id = if id.is_empty() { assignee } else { id.to_string() };
            let name = name.trim();
            (id, (!name.is_empty()).then(|| name.to_string()))
        }
        None => (assignee, Some(composite)),
    }
}

/// Parse hours as an exact decimal; anything non-numeric or negative
/// becomes zero. A comma is accepted as the decimal separator.
pub fn parse_hours(value: Option<&Value>) -> Decimal {
    let hours = match value {
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        Some(Value::String(s)) => parse_decimal(&s.trim().replace(',', ".")),
        _ => None,
    };

    hours
        .filter(|h| *h > Decimal::ZERO)
        .map(|h| h.normalize())
        .unwrap_or(Decimal::ZERO)
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    s.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}
