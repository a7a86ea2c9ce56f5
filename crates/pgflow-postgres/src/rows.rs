//! Decoding result rows into JSON objects

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use sqlx::postgres::types::{Oid, PgInterval, PgMoney};
use sqlx::postgres::{PgRow, PgTypeInfo, PgTypeKind, PgValueFormat, PgValueRef};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::debug;
use uuid::Uuid;

/// Convert a row into a JSON object keyed by column name, in column order
pub fn row_to_json(row: &PgRow) -> Map<String, Value> {
    let mut record = Map::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let type_info = column.type_info();
        let type_name = type_info.name();
        let value = match column_value(row, index, type_info) {
            Ok(value) => value,
            Err(err) => {
                debug!(column = column.name(), type_name, error = %err, "Could not decode column, using null");
                Value::Null
            }
        };
        record.insert(column.name().to_string(), value);
    }
    record
}

/// Convert every row
pub fn rows_to_json(rows: &[PgRow]) -> Vec<Map<String, Value>> {
    rows.iter().map(row_to_json).collect()
}

fn float_value(value: Option<f64>) -> Value {
    value
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

fn opt<T: Into<Value>>(value: Option<T>) -> Value {
    value.map_or(Value::Null, Into::into)
}

fn column_value(row: &PgRow, index: usize, type_info: &PgTypeInfo) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_info.name() {
        "BOOL" => opt(row.try_get::<Option<bool>, _>(index)?),
        "INT2" => opt(row.try_get::<Option<i16>, _>(index)?),
        "INT4" => opt(row.try_get::<Option<i32>, _>(index)?),
        "INT8" => opt(row.try_get::<Option<i64>, _>(index)?),
        "OID" => opt(row.try_get::<Option<Oid>, _>(index)?.map(|oid| oid.0)),
        "FLOAT4" => float_value(row.try_get::<Option<f32>, _>(index)?.map(f64::from)),
        "FLOAT8" => float_value(row.try_get::<Option<f64>, _>(index)?),
        "NUMERIC" => opt(row.try_get::<Option<Decimal>, _>(index)?.map(|d| d.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "UNKNOWN" | "CITEXT" | "citext" => {
            opt(row.try_get::<Option<String>, _>(index)?)
        }
        "\"CHAR\"" => opt(row.try_get::<Option<i8>, _>(index)?.map(|c| (c as u8 as char).to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index)?.unwrap_or(Value::Null),
        "UUID" => opt(row.try_get::<Option<Uuid>, _>(index)?.map(|u| u.to_string())),
        "TIMESTAMPTZ" => opt(row.try_get::<Option<DateTime<Utc>>, _>(index)?.map(|t| t.to_rfc3339())),
        "TIMESTAMP" => opt(row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(|t| t.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "DATE" => opt(row.try_get::<Option<NaiveDate>, _>(index)?.map(|d| d.to_string())),
        "TIME" => opt(row.try_get::<Option<NaiveTime>, _>(index)?.map(|t| t.to_string())),
        "BYTEA" => opt(row.try_get::<Option<Vec<u8>>, _>(index)?),
        "TEXT[]" | "VARCHAR[]" => opt(row.try_get::<Option<Vec<Option<String>>>, _>(index)?),
        "INT4[]" => opt(row.try_get::<Option<Vec<Option<i32>>>, _>(index)?),
        "INT8[]" => opt(row.try_get::<Option<Vec<Option<i64>>>, _>(index)?),
        "BOOL[]" => opt(row.try_get::<Option<Vec<Option<bool>>>, _>(index)?),
        "INTERVAL" => match raw.format() {
            PgValueFormat::Text => text_value(&raw)?,
            PgValueFormat::Binary => {
                opt(row.try_get::<Option<PgInterval>, _>(index)?.map(|i| format_interval(&i)))
            }
        },
        "MONEY" => match raw.format() {
            PgValueFormat::Text => text_value(&raw)?,
            PgValueFormat::Binary => opt(row
                .try_get::<Option<PgMoney>, _>(index)?
                .map(|m| m.to_decimal(2).to_string())),
        },
        "INET" | "CIDR" => match raw.format() {
            PgValueFormat::Text => text_value(&raw)?,
            PgValueFormat::Binary => {
                let bytes = raw.as_bytes().map_err(sqlx::Error::Decode)?;
                opt(format_inet(bytes, type_info.name() == "CIDR"))
            }
        },
        _ => match raw.format() {
            PgValueFormat::Text => text_value(&raw)?,
            // Enum labels are sent as their text in either format
            PgValueFormat::Binary if matches!(type_info.kind(), PgTypeKind::Enum(_)) => text_value(&raw)?,
            PgValueFormat::Binary => {
                debug!(type_name = type_info.name(), "No JSON form for binary column value, using null");
                Value::Null
            }
        },
    };
    Ok(value)
}

fn text_value(raw: &PgValueRef<'_>) -> Result<Value, sqlx::Error> {
    let text = raw.as_str().map_err(sqlx::Error::Decode)?;
    Ok(Value::String(text.to_string()))
}

/// Render an interval the way the server does with `IntervalStyle = postgres`
fn format_interval(interval: &PgInterval) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut after_negative = false;

    let years = interval.months / 12;
    let months = interval.months % 12;
    for (value, unit) in [(years, "year"), (months, "mon"), (interval.days, "day")] {
        if value == 0 {
            continue;
        }
        let sign = if after_negative && value > 0 { "+" } else { "" };
        let plural = if value != 1 { "s" } else { "" };
        parts.push(format!("{sign}{value} {unit}{plural}"));
        after_negative = value < 0;
    }

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 {
            "-"
        } else if after_negative {
            "+"
        } else {
            ""
        };
        let total = micros.unsigned_abs();
        let seconds = total / 1_000_000;
        let fraction = total % 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            seconds / 3600,
            (seconds / 60) % 60,
            seconds % 60
        );
        if fraction != 0 {
            let digits = format!("{fraction:06}");
            time.push('.');
            time.push_str(digits.trim_end_matches('0'));
        }
        parts.push(time);
    }
    parts.join(" ")
}

/// Render the binary form of an `inet` or `cidr` value
///
/// Layout: family, prefix bits, cidr flag, address length, address bytes.
fn format_inet(bytes: &[u8], cidr: bool) -> Option<String> {
    let (&family, rest) = bytes.split_first()?;
    let (&bits, rest) = rest.split_first()?;
    let address = rest.get(2..)?;

    let (ip, full) = match family {
        2 => (IpAddr::V4(Ipv4Addr::from(<[u8; 4]>::try_from(address).ok()?)), 32),
        3 => (IpAddr::V6(Ipv6Addr::from(<[u8; 16]>::try_from(address).ok()?)), 128),
        _ => return None,
    };
    if cidr || bits != full {
        Some(format!("{ip}/{bits}"))
    } else {
        Some(ip.to_string())
    }
}
