use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::entity::{EntitySchema, Record};

/// `January 05, 2024`
pub const LONG_DATE_FORMAT: &str = "%B %d, %Y";

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|d| d.date())
        })
}

pub fn format_long_date(raw: &str) -> Option<String> {
    parse_date(raw).map(|d| d.format(LONG_DATE_FORMAT).to_string())
}

pub fn capitalize_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Returns a display copy of `record`: the schema's date fields rendered as
/// long dates and its name fields capitalized. Values that are not strings or
/// do not parse as dates are carried over untouched.
pub fn format_record(schema: &EntitySchema, record: &Record) -> Record {
    let mut out = record.clone();
    for field in schema.date_fields {
        if let Some(Value::String(raw)) = record.fields.get(*field) {
            if let Some(formatted) = format_long_date(raw) {
                out.fields.insert(field.to_string(), Value::String(formatted));
            }
        }
    }
    for field in schema.capitalized_fields {
        if let Some(Value::String(raw)) = record.fields.get(*field) {
            out.fields
                .insert(field.to_string(), Value::String(capitalize_first(raw)));
        }
    }
    out
}
