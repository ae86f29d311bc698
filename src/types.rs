use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values that can be stored in a database row or bound to a placeholder.
///
/// Every driver converts to and from this enum, so consumers never branch on
/// driver-native value types:
/// ```rust
/// use sql_facade::prelude::*;
///
/// let values: Vec<RowValues> = vec![1.into(), "alice".into(), true.into()];
/// assert_eq!(values[1].as_text(), Some("alice"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(dt);
            }
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// JSON rendering used for object-shaped rows.
    ///
    /// Non-finite floats become `null`; blobs become arrays of bytes.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            RowValues::Int(i) => JsonValue::from(*i),
            RowValues::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(JsonValue::Null, JsonValue::Number),
            RowValues::Text(s) => JsonValue::String(s.clone()),
            RowValues::Bool(b) => JsonValue::Bool(*b),
            RowValues::Timestamp(dt) => JsonValue::String(format_timestamp(dt)),
            RowValues::Null => JsonValue::Null,
            RowValues::JSON(v) => v.clone(),
            RowValues::Blob(bytes) => JsonValue::from(bytes.clone()),
        }
    }
}

/// Canonical text form of a timestamp when a driver has no native type for it.
#[must_use]
pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format("%F %T%.f").to_string()
}

macro_rules! row_value_from {
    ($($ty:ty => $variant:ident $(as $cast:ty)?),* $(,)?) => {
        $(
            impl From<$ty> for RowValues {
                fn from(value: $ty) -> Self {
                    RowValues::$variant(value $(as $cast)?)
                }
            }
        )*
    };
}

row_value_from! {
    i64 => Int,
    i32 => Int as i64,
    u32 => Int as i64,
    f64 => Float,
    bool => Bool,
    String => Text,
    NaiveDateTime => Timestamp,
    JsonValue => JSON,
    Vec<u8> => Blob,
}

impl From<&str> for RowValues {
    fn from(value: &str) -> Self {
        RowValues::Text(value.to_string())
    }
}

impl<T: Into<RowValues>> From<Option<T>> for RowValues {
    fn from(value: Option<T>) -> Self {
        value.map_or(RowValues::Null, Into::into)
    }
}

/// Declared type of a bound parameter; decides how the value is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    #[default]
    String,
    Float,
    Binary,
}

impl ParamType {
    /// The declared type a value would naturally bind as.
    #[must_use]
    pub fn infer(value: &RowValues) -> Self {
        match value {
            RowValues::Int(_) | RowValues::Bool(_) => ParamType::Integer,
            RowValues::Float(_) => ParamType::Float,
            RowValues::Blob(_) => ParamType::Binary,
            RowValues::Text(_)
            | RowValues::Timestamp(_)
            | RowValues::JSON(_)
            | RowValues::Null => ParamType::String,
        }
    }

    /// Convert `value` into the representation this declared type sends.
    ///
    /// # Errors
    /// Returns a description of the mismatch when the value cannot be
    /// represented under this type.
    pub fn coerce(self, value: RowValues) -> Result<RowValues, String> {
        if value.is_null() {
            return Ok(RowValues::Null);
        }
        let mismatch = |value: &RowValues| format!("value {value:?} is not valid as {self:?}");
        match self {
            ParamType::Integer => match value {
                RowValues::Int(_) => Ok(value),
                RowValues::Bool(b) => Ok(RowValues::Int(i64::from(b))),
                RowValues::Text(ref s) => s
                    .trim()
                    .parse::<i64>()
                    .map(RowValues::Int)
                    .map_err(|_| mismatch(&value)),
                other => Err(mismatch(&other)),
            },
            ParamType::Float => match value {
                RowValues::Float(_) => Ok(value),
                #[allow(clippy::cast_precision_loss)]
                RowValues::Int(i) => Ok(RowValues::Float(i as f64)),
                RowValues::Text(ref s) => s
                    .trim()
                    .parse::<f64>()
                    .map(RowValues::Float)
                    .map_err(|_| mismatch(&value)),
                other => Err(mismatch(&other)),
            },
            ParamType::String => match value {
                RowValues::Text(_) => Ok(value),
                RowValues::Int(i) => Ok(RowValues::Text(i.to_string())),
                RowValues::Float(f) => Ok(RowValues::Text(f.to_string())),
                RowValues::Bool(b) => Ok(RowValues::Text(i64::from(b).to_string())),
                RowValues::Timestamp(dt) => Ok(RowValues::Text(format_timestamp(&dt))),
                RowValues::JSON(v) => Ok(RowValues::Text(v.to_string())),
                other @ (RowValues::Blob(_) | RowValues::Null) => Err(mismatch(&other)),
            },
            ParamType::Binary => match value {
                RowValues::Blob(_) => Ok(value),
                RowValues::Text(s) => Ok(RowValues::Blob(s.into_bytes())),
                other => Err(mismatch(&other)),
            },
        }
    }
}

/// One value plus the type it is declared to bind as.
#[derive(Debug, Clone, PartialEq)]
pub struct BindParam {
    pub value: RowValues,
    pub kind: ParamType,
}

impl BindParam {
    #[must_use]
    pub fn new(value: impl Into<RowValues>, kind: ParamType) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }
}

impl From<RowValues> for BindParam {
    fn from(value: RowValues) -> Self {
        let kind = ParamType::infer(&value);
        Self { value, kind }
    }
}

macro_rules! bind_param_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for BindParam {
                fn from(value: $ty) -> Self {
                    BindParam::from(RowValues::from(value))
                }
            }
        )*
    };
}

bind_param_from!(i64, i32, u32, f64, bool, String, &str, NaiveDateTime, JsonValue, Vec<u8>);

/// Shape of the rows handed back by fetch calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Column name → value.
    #[default]
    Assoc,
    /// Values by position.
    Num,
    /// Addressable both by name and by position.
    Both,
    /// An object with one named field per column.
    Object,
}

impl FetchMode {
    /// Map the classic numeric constants (1 = assoc, 2 = num, 3 = both, 4 = object).
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(FetchMode::Assoc),
            2 => Some(FetchMode::Num),
            3 => Some(FetchMode::Both),
            4 => Some(FetchMode::Object),
            _ => None,
        }
    }
}

/// The concrete driver implementations this crate can load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Native SQLite client (`rusqlite`)
    #[cfg(feature = "sqlite")]
    #[value(alias = "rusqlite")]
    #[serde(alias = "rusqlite")]
    Sqlite,
    /// Generic SQL abstraction (`sqlx` Any: SQLite, MySQL, PostgreSQL by URL)
    #[cfg(feature = "any")]
    #[value(alias = "sqlx")]
    #[serde(alias = "sqlx")]
    Any,
}

impl DriverKind {
    /// Resolve a configured driver name (case-insensitive, aliases allowed).
    ///
    /// # Errors
    /// Returns `DbErrorKind::Config` when no compiled-in driver has that name.
    pub fn resolve(name: &str) -> Result<Self, crate::error::DbError> {
        <Self as ValueEnum>::from_str(name.trim(), true).map_err(|_| {
            crate::error::DbError::config(format!(
                "The database driver '{name}' does not exist"
            ))
        })
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            #[cfg(feature = "sqlite")]
            DriverKind::Sqlite => "sqlite",
            #[cfg(feature = "any")]
            DriverKind::Any => "any",
        }
    }
}
