//! Field kinds and their per-kind behavior.
//!
//! Each [`FieldKind`] supplies the SQL type it declares, how an in-memory
//! value is encoded into a bound parameter, how a database value is decoded
//! back into its in-memory form, and how two in-memory values are compared
//! for the dirty diff.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use chrono::{DateTime, SubsecRound, Utc};
use rowkeeper_proto::{Error as ValueError, Value};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default length for `varchar` columns.
pub const DEFAULT_VARCHAR_LENGTH: u32 = 255;

const UNPADDED: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_encode_padding(false)
    .with_decode_padding_mode(DecodePaddingMode::Indifferent);

const BASE64: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, UNPADDED);
const BASE64_URL_SAFE: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, UNPADDED);

/// Sub-second precision kept by timestamp fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimestampPrecision {
    /// Whole seconds.
    Seconds,
    /// Milliseconds.
    #[default]
    Millis,
    /// Microseconds (the most PostgreSQL stores).
    Micros,
}

impl TimestampPrecision {
    /// Number of fractional second digits kept.
    pub fn digits(self) -> u16 {
        match self {
            TimestampPrecision::Seconds => 0,
            TimestampPrecision::Millis => 3,
            TimestampPrecision::Micros => 6,
        }
    }

    /// Truncate an instant to this precision.
    pub fn truncate(self, instant: DateTime<Utc>) -> DateTime<Utc> {
        instant.trunc_subsecs(self.digits())
    }
}

/// Column kinds known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// 32-bit integer (`int`).
    Int,
    /// 64-bit integer (`bigint`).
    BigInt,
    /// Boolean (`bool`).
    Boolean,
    /// Bounded text (`varchar(N)`).
    VarChar {
        /// Maximum length in characters.
        length: u32,
    },
    /// Unbounded text (`text`).
    Text,
    /// UUID (`uuid`).
    Uuid,
    /// Instant with time zone (`timestamptz`).
    Timestamp {
        /// Precision kept in memory and on the wire.
        precision: TimestampPrecision,
    },
    /// Raw bytes (`bytea`).
    Binary,
    /// Bytes held in memory as unpadded standard base64 text (`bytea`).
    Base64Binary,
    /// Bytes held in memory as unpadded URL-safe base64 text (`bytea`).
    Base64UrlSafeBinary,
}

impl FieldKind {
    /// `varchar` with the default length.
    pub fn varchar() -> Self {
        FieldKind::VarChar {
            length: DEFAULT_VARCHAR_LENGTH,
        }
    }

    /// `timestamptz` with millisecond precision.
    pub fn timestamp() -> Self {
        FieldKind::Timestamp {
            precision: TimestampPrecision::default(),
        }
    }

    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Int => "int",
            FieldKind::BigInt => "bigint",
            FieldKind::Boolean => "boolean",
            FieldKind::VarChar { .. } => "varchar",
            FieldKind::Text => "text",
            FieldKind::Uuid => "uuid",
            FieldKind::Timestamp { .. } => "timestamp",
            FieldKind::Binary => "binary",
            FieldKind::Base64Binary => "base64",
            FieldKind::Base64UrlSafeBinary => "base64url",
        }
    }

    /// SQL type emitted in column definitions.
    pub fn sql_type(&self) -> String {
        match self {
            FieldKind::Int => "int".to_string(),
            FieldKind::BigInt => "bigint".to_string(),
            FieldKind::Boolean => "bool".to_string(),
            FieldKind::VarChar { length } => format!("varchar({length})"),
            FieldKind::Text => "text".to_string(),
            FieldKind::Uuid => "uuid".to_string(),
            FieldKind::Timestamp { .. } => "timestamptz".to_string(),
            FieldKind::Binary | FieldKind::Base64Binary | FieldKind::Base64UrlSafeBinary => {
                "bytea".to_string()
            }
        }
    }

    /// Convert an in-memory value into the value bound into a statement.
    pub fn encode(&self, value: &Value) -> Result<Value, ValueError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            FieldKind::Base64Binary => encode_base64(&BASE64, value),
            FieldKind::Base64UrlSafeBinary => encode_base64(&BASE64_URL_SAFE, value),
            FieldKind::VarChar { length } => {
                let text = value.as_str().ok_or_else(|| mismatch("string", value))?;
                if text.chars().count() > *length as usize {
                    return Err(ValueError::InvalidValue(format!(
                        "string exceeds varchar({length})"
                    )));
                }
                Ok(value.clone())
            }
            // Every other kind binds its canonical in-memory form.
            _ => self.decode(value.clone()),
        }
    }

    /// Convert a database (or user-supplied) value into its in-memory form.
    pub fn decode(&self, value: Value) -> Result<Value, ValueError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        match self {
            FieldKind::Int => match value {
                Value::Int32(_) => Ok(value),
                Value::Int64(i) => i32::try_from(i)
                    .map(Value::Int32)
                    .map_err(|_| ValueError::InvalidValue(format!("{i} out of range for int"))),
                Value::String(ref s) => s
                    .trim()
                    .parse::<i32>()
                    .map(Value::Int32)
                    .map_err(|e| ValueError::InvalidValue(e.to_string())),
                other => Err(mismatch("int32", &other)),
            },
            FieldKind::BigInt => match value {
                Value::Int64(_) => Ok(value),
                Value::Int32(i) => Ok(Value::Int64(i as i64)),
                Value::String(ref s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int64)
                    .map_err(|e| ValueError::InvalidValue(e.to_string())),
                other => Err(mismatch("int64", &other)),
            },
            FieldKind::Boolean => match value {
                Value::Bool(_) => Ok(value),
                Value::String(ref s) => match s.as_str() {
                    "t" | "true" => Ok(Value::Bool(true)),
                    "f" | "false" => Ok(Value::Bool(false)),
                    _ => Err(ValueError::InvalidValue(format!("{s:?} is not a boolean"))),
                },
                other => Err(mismatch("bool", &other)),
            },
            FieldKind::VarChar { .. } | FieldKind::Text => match value {
                Value::String(_) => Ok(value),
                other => Err(mismatch("string", &other)),
            },
            FieldKind::Uuid => match value {
                Value::Uuid(_) => Ok(value),
                Value::String(ref s) => Uuid::parse_str(s)
                    .map(Value::Uuid)
                    .map_err(|e| ValueError::InvalidValue(e.to_string())),
                other => Err(mismatch("uuid", &other)),
            },
            FieldKind::Timestamp { precision } => match value {
                Value::Timestamp(t) => Ok(Value::Timestamp(precision.truncate(t))),
                Value::String(ref s) => parse_timestamp(s)
                    .map(|t| Value::Timestamp(precision.truncate(t)))
                    .ok_or_else(|| ValueError::InvalidValue(format!("{s:?} is not a timestamp"))),
                other => Err(mismatch("timestamp", &other)),
            },
            FieldKind::Binary => match value {
                Value::Bytes(_) => Ok(value),
                other => Err(mismatch("bytes", &other)),
            },
            FieldKind::Base64Binary => decode_base64(&BASE64, value),
            FieldKind::Base64UrlSafeBinary => decode_base64(&BASE64_URL_SAFE, value),
        }
    }

    /// Whether two in-memory values differ. `None` means unset.
    pub fn is_different(&self, a: Option<&Value>, b: Option<&Value>) -> bool {
        match self {
            FieldKind::Timestamp { precision } => {
                let a = a.filter(|v| !v.is_null());
                let b = b.filter(|v| !v.is_null());
                match (a, b) {
                    (None, None) => false,
                    (Some(a), Some(b)) => match (a.as_timestamp(), b.as_timestamp()) {
                        (Some(a), Some(b)) => precision.truncate(a) != precision.truncate(b),
                        _ => a != b,
                    },
                    _ => true,
                }
            }
            _ => a != b,
        }
    }
}

fn mismatch(expected: &'static str, actual: &Value) -> ValueError {
    ValueError::TypeMismatch {
        expected,
        actual: actual.type_name(),
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

fn encode_base64(engine: &GeneralPurpose, value: &Value) -> Result<Value, ValueError> {
    match value {
        Value::String(text) => engine
            .decode(text.as_bytes())
            .map(Value::Bytes)
            .map_err(|e| ValueError::InvalidValue(e.to_string())),
        Value::Bytes(_) => Ok(value.clone()),
        other => Err(mismatch("string", other)),
    }
}

fn decode_base64(engine: &GeneralPurpose, value: Value) -> Result<Value, ValueError> {
    match value {
        Value::Bytes(bytes) => Ok(Value::String(engine.encode(bytes))),
        // Re-encode so padded and unpadded spellings compare equal.
        Value::String(text) => engine
            .decode(text.as_bytes())
            .map(|bytes| Value::String(engine.encode(bytes)))
            .map_err(|e| ValueError::InvalidValue(e.to_string())),
        other => Err(mismatch("bytes", &other)),
    }
}
