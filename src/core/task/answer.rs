use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Base type of a recorded answer value, used to pick the comparison used by
/// survey rules and the codec used when archiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum BaseType {
    Boolean,
    Data,
    Date,
    Decimal,
    Integer,
    #[default]
    String,
}

/// Sequence wrapper for an answer value. Only arrays are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SequenceType {
    Array,
}

/// Descriptor for the value held by an answer result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnswerType {
    pub base_type: BaseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_type: Option<SequenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl AnswerType {
    pub fn new(base_type: BaseType) -> Self {
        AnswerType {
            base_type,
            ..Default::default()
        }
    }

    pub fn array(base_type: BaseType) -> Self {
        AnswerType {
            base_type,
            sequence_type: Some(SequenceType::Array),
            ..Default::default()
        }
    }

    pub fn is_array(&self) -> bool {
        self.sequence_type == Some(SequenceType::Array)
    }
}

/// A scalar answer value converted into a directly comparable form.
#[derive(Debug, Clone, PartialEq)]
pub enum ComparableValue {
    Number(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl ComparableValue {
    pub fn compare(&self, other: &ComparableValue) -> Option<Ordering> {
        match (self, other) {
            (ComparableValue::Number(a), ComparableValue::Number(b)) => a.partial_cmp(b),
            (ComparableValue::Text(a), ComparableValue::Text(b)) => Some(a.cmp(b)),
            (ComparableValue::Timestamp(a), ComparableValue::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

/// Convert a JSON value into a comparable scalar for the given answer type.
///
/// Returns `None` when the value cannot be expressed in the declared base
/// type. The `data` base type is not comparable and always returns `None`.
pub fn convert_scalar(value: &Value, answer_type: &AnswerType) -> Option<ComparableValue> {
    if value.is_null() {
        return None;
    }
    match answer_type.base_type {
        BaseType::Data => None,
        BaseType::Boolean => value.as_bool().map(|b| ComparableValue::Number(b as i64 as f64)),
        BaseType::Integer | BaseType::Decimal => {
            value.as_f64().map(ComparableValue::Number)
        }
        BaseType::String => match value {
            Value::String(s) => Some(ComparableValue::Text(s.clone())),
            Value::Number(n) => Some(ComparableValue::Text(n.to_string())),
            Value::Bool(b) => Some(ComparableValue::Text(b.to_string())),
            _ => None,
        },
        BaseType::Date => parse_date(value, answer_type.date_format.as_deref())
            .map(ComparableValue::Timestamp),
    }
}

/// Convert a JSON value into a list of comparable scalars. A scalar value is
/// wrapped into a single-element list so that membership comparisons work for
/// both shapes.
pub fn convert_sequence(value: &Value, answer_type: &AnswerType) -> Option<Vec<ComparableValue>> {
    let scalar_type = AnswerType {
        sequence_type: None,
        ..answer_type.clone()
    };
    match value {
        Value::Array(items) => {
            let converted: Vec<_> = items
                .iter()
                .filter_map(|item| convert_scalar(item, &scalar_type))
                .collect();
            (converted.len() == items.len()).then_some(converted)
        }
        _ => convert_scalar(value, &scalar_type).map(|v| vec![v]),
    }
}

fn parse_date(value: &Value, date_format: Option<&str>) -> Option<DateTime<Utc>> {
    let text = value.as_str()?;
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Some(timestamp.with_timezone(&Utc));
    }
    if let Some(format) = date_format {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
