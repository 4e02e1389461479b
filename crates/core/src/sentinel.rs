use crate::model::{FieldMap, FieldValue, RawValue};

pub const NOT_AVAILABLE: &str = "Not Available";
pub const NOT_APPLICABLE: &str = "Not Applicable";

const NOT_AVAILABLE_MARKERS: [&str; 5] = ["N/A", "N.A.", "--", "nan", "NaN"];
const NOT_APPLICABLE_MARKERS: [&str; 1] = ["#N/A Field Not Applicable"];

/// Two-pass substitution: "no data" markers first, then "not applicable"
/// markers. A value replaced by the first pass is never revisited.
pub fn substitute(raw: RawValue) -> FieldValue {
    match raw {
        RawValue::Missing => FieldValue::NotAvailable,
        RawValue::Number(number) => FieldValue::Number(number),
        RawValue::Text(text) => substitute_text(text),
    }
}

fn substitute_text(text: String) -> FieldValue {
    if is_not_available(&text) {
        return FieldValue::NotAvailable;
    }
    if is_not_applicable(&text) {
        return FieldValue::NotApplicable;
    }
    FieldValue::Text(text)
}

fn is_not_available(text: &str) -> bool {
    text.trim().is_empty() || text == NOT_AVAILABLE || NOT_AVAILABLE_MARKERS.contains(&text)
}

fn is_not_applicable(text: &str) -> bool {
    text == NOT_APPLICABLE || NOT_APPLICABLE_MARKERS.contains(&text)
}

/// Re-applies substitution to an already normalized map.
pub fn renormalize(fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .map(|(key, value)| (key.clone(), substitute(to_raw(value))))
        .collect()
}

fn to_raw(value: &FieldValue) -> RawValue {
    match value {
        FieldValue::Text(text) => RawValue::Text(text.clone()),
        FieldValue::Number(number) => RawValue::Number(number.clone()),
        FieldValue::NotAvailable => RawValue::Text(NOT_AVAILABLE.to_string()),
        FieldValue::NotApplicable => RawValue::Text(NOT_APPLICABLE.to_string()),
    }
}
