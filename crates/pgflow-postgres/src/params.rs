//! Binding JSON values to statement parameters
//!
//! Parameters are bound with the types the server inferred when the
//! statement was prepared, so `WHERE id = $id` against a uuid column takes
//! a string and `VALUES ($n)` into an int column takes `null`. Each JSON
//! value is converted to the inferred type and encoded in binary format.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use pgflow_core::CoreError;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgTypeKind};
use sqlx::types::Json;
use sqlx::{Encode, Postgres, Type, TypeInfo};
use std::str::FromStr;
use uuid::Uuid;

/// A value converted to the type of its placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// SQL `NULL`
    Null,
    /// `BOOL`
    Bool(bool),
    /// `INT2`
    Int2(i16),
    /// `INT4`
    Int4(i32),
    /// `INT8`
    Int8(i64),
    /// `OID`
    Oid(u32),
    /// `FLOAT4`
    Float4(f32),
    /// `FLOAT8`
    Float8(f64),
    /// `NUMERIC`
    Numeric(Decimal),
    /// Text and anything whose binary form is its text (enums, varchar, ...)
    Text(String),
    /// `UUID`
    Uuid(Uuid),
    /// `DATE`
    Date(NaiveDate),
    /// `TIME`
    Time(NaiveTime),
    /// `TIMESTAMP`
    Timestamp(NaiveDateTime),
    /// `TIMESTAMPTZ`
    Timestamptz(DateTime<Utc>),
    /// `JSON` / `JSONB`
    Json(Value),
    /// `BYTEA`
    Bytes(Vec<u8>),
    /// `TEXT[]`
    TextArray(Vec<Option<String>>),
    /// `INT4[]`
    Int4Array(Vec<Option<i32>>),
    /// `INT8[]`
    Int8Array(Vec<Option<i64>>),
    /// `FLOAT8[]`
    Float8Array(Vec<Option<f64>>),
    /// `BOOL[]`
    BoolArray(Vec<Option<bool>>),
    /// `UUID[]`
    UuidArray(Vec<Option<Uuid>>),
}

/// A statement parameter carrying the server-inferred type
#[derive(Debug, Clone)]
pub struct PgParam {
    type_info: PgTypeInfo,
    value: ParamValue,
}

impl PgParam {
    /// The converted value
    pub fn value(&self) -> &ParamValue {
        &self.value
    }
}

impl Type<Postgres> for PgParam {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl<'q> Encode<'q, Postgres> for PgParam {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        match &self.value {
            ParamValue::Null => Ok(IsNull::Yes),
            ParamValue::Bool(v) => <bool as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Int2(v) => <i16 as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Int4(v) => <i32 as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Int8(v) => <i64 as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Oid(v) => <Oid as Encode<'q, Postgres>>::encode_by_ref(&Oid(*v), buf),
            ParamValue::Float4(v) => <f32 as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Float8(v) => <f64 as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Numeric(v) => <Decimal as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Text(v) => <String as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Uuid(v) => <Uuid as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Date(v) => <NaiveDate as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Time(v) => <NaiveTime as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Timestamp(v) => <NaiveDateTime as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Timestamptz(v) => <DateTime<Utc> as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            // The JSON encoder patches its version byte for JSON versus JSONB
            ParamValue::Json(v) => <Json<&Value> as Encode<'q, Postgres>>::encode_by_ref(&Json(v), buf),
            ParamValue::Bytes(v) => <Vec<u8> as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::TextArray(v) => <Vec<Option<String>> as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Int4Array(v) => <Vec<Option<i32>> as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Int8Array(v) => <Vec<Option<i64>> as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::Float8Array(v) => <Vec<Option<f64>> as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::BoolArray(v) => <Vec<Option<bool>> as Encode<'q, Postgres>>::encode_by_ref(v, buf),
            ParamValue::UuidArray(v) => <Vec<Option<Uuid>> as Encode<'q, Postgres>>::encode_by_ref(v, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(self.type_info.clone())
    }
}

/// Convert every value against the parameter types of a prepared statement
pub fn convert_all(values: &[Value], types: &[PgTypeInfo]) -> Result<Vec<PgParam>, CoreError> {
    if values.len() != types.len() {
        return Err(CoreError::ExecutionError(format!(
            "bind message supplies {} parameters, but prepared statement requires {}",
            values.len(),
            types.len()
        )));
    }
    values
        .iter()
        .zip(types)
        .enumerate()
        .map(|(index, (value, type_info))| convert(value, type_info, index + 1))
        .collect()
}

/// Convert one value for placeholder `$position` of type `type_info`
pub fn convert(value: &Value, type_info: &PgTypeInfo, position: usize) -> Result<PgParam, CoreError> {
    let converted = if value.is_null() {
        ParamValue::Null
    } else {
        convert_value(value, base_type(type_info), position)?
    };
    Ok(PgParam {
        type_info: type_info.clone(),
        value: converted,
    })
}

/// Domains encode like their base type
fn base_type(type_info: &PgTypeInfo) -> &PgTypeInfo {
    match type_info.kind() {
        PgTypeKind::Domain(base) => base_type(base),
        _ => type_info,
    }
}

fn convert_value(value: &Value, type_info: &PgTypeInfo, position: usize) -> Result<ParamValue, CoreError> {
    let name = type_info.name();
    let bad = |expected: &str| invalid(position, expected, value);

    let converted = match name {
        "BOOL" => ParamValue::Bool(to_bool(value).ok_or_else(|| bad("boolean"))?),
        "INT2" => ParamValue::Int2(to_i64(value).and_then(|i| i16::try_from(i).ok()).ok_or_else(|| bad("smallint"))?),
        "INT4" => ParamValue::Int4(to_i64(value).and_then(|i| i32::try_from(i).ok()).ok_or_else(|| bad("integer"))?),
        "INT8" => ParamValue::Int8(to_i64(value).ok_or_else(|| bad("bigint"))?),
        "OID" => ParamValue::Oid(to_i64(value).and_then(|i| u32::try_from(i).ok()).ok_or_else(|| bad("oid"))?),
        "FLOAT4" => ParamValue::Float4(to_f64(value).ok_or_else(|| bad("real"))? as f32),
        "FLOAT8" => ParamValue::Float8(to_f64(value).ok_or_else(|| bad("double precision"))?),
        "NUMERIC" => ParamValue::Numeric(to_decimal(value).ok_or_else(|| bad("numeric"))?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "UNKNOWN" | "CITEXT" | "citext" | "XML" => {
            ParamValue::Text(to_text(value))
        }
        "UUID" => ParamValue::Uuid(to_uuid(value).ok_or_else(|| bad("uuid"))?),
        "DATE" => ParamValue::Date(value.as_str().and_then(parse_date).ok_or_else(|| bad("date"))?),
        "TIME" => ParamValue::Time(value.as_str().and_then(parse_time).ok_or_else(|| bad("time"))?),
        "TIMESTAMP" => ParamValue::Timestamp(value.as_str().and_then(parse_timestamp).ok_or_else(|| bad("timestamp"))?),
        "TIMESTAMPTZ" => {
            ParamValue::Timestamptz(value.as_str().and_then(parse_timestamptz).ok_or_else(|| bad("timestamptz"))?)
        }
        "JSON" | "JSONB" => ParamValue::Json(match value {
            // A string is JSON text, as the server would read it
            Value::String(text) => serde_json::from_str(text).map_err(|_| bad("json"))?,
            other => other.clone(),
        }),
        "BYTEA" => ParamValue::Bytes(to_bytes(value).ok_or_else(|| bad("bytea"))?),
        "TEXT[]" => ParamValue::TextArray(array_of(value, |v| Some(to_text(v))).ok_or_else(|| bad("text[]"))?),
        "INT4[]" => ParamValue::Int4Array(
            array_of(value, |v| to_i64(v).and_then(|i| i32::try_from(i).ok())).ok_or_else(|| bad("integer[]"))?,
        ),
        "INT8[]" => ParamValue::Int8Array(array_of(value, to_i64).ok_or_else(|| bad("bigint[]"))?),
        "FLOAT8[]" => ParamValue::Float8Array(array_of(value, to_f64).ok_or_else(|| bad("double precision[]"))?),
        "BOOL[]" => ParamValue::BoolArray(array_of(value, to_bool).ok_or_else(|| bad("boolean[]"))?),
        "UUID[]" => ParamValue::UuidArray(array_of(value, to_uuid).ok_or_else(|| bad("uuid[]"))?),
        _ if matches!(type_info.kind(), PgTypeKind::Enum(_)) => ParamValue::Text(to_text(value)),
        other => {
            return Err(CoreError::ExecutionError(format!(
                "cannot bind parameter ${} as {}; cast it in the query, for example ${}::text::{}",
                position,
                other.to_lowercase(),
                position,
                other.to_lowercase()
            )))
        }
    };
    Ok(converted)
}

fn invalid(position: usize, expected: &str, value: &Value) -> CoreError {
    CoreError::ExecutionError(format!(
        "invalid input for parameter ${}: {} is not a valid {}",
        position, value, expected
    ))
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "on" | "1" => Some(true),
            "f" | "false" | "n" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            // 2.0 is an integer; 2.5 and anything past i64 are not
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn to_uuid(value: &Value) -> Option<Uuid> {
    value.as_str().and_then(|s| Uuid::parse_str(s.trim()).ok())
}

fn to_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::String(s) => match s.strip_prefix("\\x") {
            Some(hex) => decode_hex(hex),
            None => Some(s.as_bytes().to_vec()),
        },
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect(),
        _ => None,
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

fn array_of<T>(value: &Value, element: impl Fn(&Value) -> Option<T>) -> Option<Vec<Option<T>>> {
    value
        .as_array()?
        .iter()
        .map(|v| if v.is_null() { Some(None) } else { element(v).map(Some) })
        .collect()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(s).map(|t| t.date()))
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|t| t.naive_utc()))
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// RFC 3339, `2024-01-02 03:04:05+02`, or a zone-less value taken as UTC
fn parse_timestamptz(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| parse_timestamp(s).map(|naive| Utc.from_utc_datetime(&naive)))
}
