use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};

use crate::formats::reader::DelimitedConfig;
use crate::schema::{RawRecord, Row, Value};

/// Parse delimited bytes (CSV, TSV, etc.) into records
///
/// With a header, every record is a named row keyed by the header fields;
/// without one, records are positional tuples. Each field is parsed into the
/// narrowest scalar it represents.
pub fn read_delimited(buffer: &[u8], config: &DelimitedConfig) -> Result<Vec<RawRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .quote(config.quote)
        .has_headers(config.has_header)
        .from_reader(buffer);

    let header: Option<Vec<String>> = if config.has_header {
        let headers = csv_reader.headers().context("Failed to read header row")?;
        Some(headers.iter().map(|h| h.trim().to_string()).collect())
    } else {
        None
    };

    let mut records = Vec::new();

    for (idx, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse record {}", idx))?;
        let values: Vec<Value> = record.iter().map(parse_scalar).collect();

        records.push(match &header {
            Some(names) => {
                if names.len() != values.len() {
                    anyhow::bail!(
                        "Record {} has {} fields but the header has {}",
                        idx,
                        values.len(),
                        names.len()
                    );
                }
                RawRecord::Row(Row::with_names(names.clone(), values)?)
            }
            None => RawRecord::Tuple(values),
        });
    }

    Ok(records)
}

/// Parse a single delimited field into the narrowest scalar value
pub fn parse_scalar(value: &str) -> Value {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Value::Null;
    }

    // Boolean
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    // Try parsing as integer
    if let Ok(val) = trimmed.parse::<i64>() {
        return match i32::try_from(val) {
            Ok(small) => Value::Int(small),
            Err(_) => Value::Long(val),
        };
    }

    // Try parsing as float
    if let Ok(val) = trimmed.parse::<f64>()
        && val.is_finite()
    {
        return Value::Double(val);
    }

    // Try parsing as date - validate with chrono to ensure it's a real date
    if let Some(date) = try_parse_date(trimmed) {
        return Value::Date(date);
    }

    if let Some(timestamp) = try_parse_timestamp(trimmed) {
        return Value::Timestamp(timestamp);
    }

    // Default to text, untrimmed
    Value::String(value.to_string())
}

/// Supports common date formats: YYYY-MM-DD, MM/DD/YYYY, DD-MM-YYYY, DD/MM/YYYY
fn try_parse_date(value: &str) -> Option<NaiveDate> {
    const FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y", "%d/%m/%Y"];

    FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

fn try_parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 9] = [
        "%Y-%m-%d %H:%M:%S",    // 2025-01-01 12:34:56
        "%Y-%m-%dT%H:%M:%S",    // 2025-01-01T12:34:56 (ISO 8601)
        "%Y-%m-%d %H:%M:%S%.f", // With fractional seconds
        "%Y-%m-%dT%H:%M:%S%.f", // ISO 8601 with fractional seconds
        "%Y-%m-%d %H:%M",       // Without seconds
        "%Y-%m-%dT%H:%M",       // ISO 8601 without seconds
        "%m/%d/%Y %H:%M:%S",    // US format with time
        "%d-%m-%Y %H:%M:%S",    // European format with time
        "%d/%m/%Y %H:%M:%S",    // European format with time
    ];

    FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}
