//! Field extraction
//!
//! Named fields (part number, revision, drawn date, material list) are
//! pulled from a page's text by the extraction service. The service answers
//! with one `name: value (Confidence: c)` line per field. Parsing those
//! lines and normalizing each value by its declared type happens here.

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Confidence assumed when a line carries none.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%B %d, %Y"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Date,
    List,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::List => "list",
        }
    }
}

/// One field the caller wants extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

impl FieldSpec {
    /// Description as sent to the service, with the type appended.
    pub fn described(&self) -> String {
        format!("{} (Type: {})", self.description.trim(), self.field_type.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub value: String,
    pub confidence: f64,
}

/// Parse the service's answer into fields, in request order.
///
/// Lines naming no requested field are ignored. When a field appears more
/// than once the last line wins. Fields the answer never mentions are left
/// out.
pub fn parse_field_lines(response: &str, specs: &[FieldSpec]) -> Vec<ExtractedField> {
    let mut found: Vec<Option<ExtractedField>> = vec![None; specs.len()];

    for line in response.lines().map(str::trim) {
        if line.is_empty() || !line.contains(':') {
            continue;
        }
        for (slot, spec) in found.iter_mut().zip(specs) {
            let Some(rest) = line
                .strip_prefix(spec.name.as_str())
                .and_then(|rest| rest.strip_prefix(':'))
            else {
                continue;
            };
            let (value, confidence) = split_confidence(rest.trim());
            *slot = Some(ExtractedField {
                name: spec.name.clone(),
                field_type: spec.field_type,
                value: normalize(value, spec.field_type),
                confidence,
            });
        }
    }

    found.into_iter().flatten().collect()
}

/// Split a trailing `(Confidence: c)` off a value.
fn split_confidence(value: &str) -> (&str, f64) {
    let Some((head, tail)) = value.split_once("(Confidence:") else {
        return (value, DEFAULT_CONFIDENCE);
    };
    let score = tail.split(')').next().unwrap_or_default().trim();
    match score.parse::<f64>() {
        Ok(confidence) => (head.trim(), confidence.clamp(0.0, 1.0)),
        Err(_) => (value, DEFAULT_CONFIDENCE),
    }
}

/// Normalize a raw value for its type. Values that do not fit the type are
/// returned unchanged.
pub fn normalize(value: &str, field_type: FieldType) -> String {
    let normalized = match field_type {
        FieldType::Text => None,
        FieldType::Number => normalize_number(value),
        FieldType::Date => normalize_date(value),
        FieldType::List => Some(normalize_list(value)),
    };
    normalized.unwrap_or_else(|| value.to_string())
}

/// First number with its unit, two decimals and thousands separators:
/// `"approx 1500 mm"` becomes `"1,500.00mm"`.
fn normalize_number(value: &str) -> Option<String> {
    let pattern = Regex::new(r"([\d,.]+)\s*([a-zA-Z°]*)").ok()?;
    let captures = pattern.captures(value)?;
    let digits = captures.get(1)?.as_str().replace(',', "");
    let unit = captures.get(2).map_or("", |m| m.as_str());
    let number: f64 = digits.parse().ok()?;
    Some(format!("{}{}", group_thousands(number), unit))
}

fn group_thousands(number: f64) -> String {
    let fixed = format!("{:.2}", number.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if number < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, fraction)
}

fn normalize_date(value: &str) -> Option<String> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value.trim(), format).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
}

fn normalize_list(value: &str) -> String {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
