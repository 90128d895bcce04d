use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// A single database cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
    Array(Vec<Value>),
}

/// The exact type a property expects, used to pick the read path for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Text,
    Bytes,
    Date,
    Time,
    Timestamp,
    Json,
    Array,
    /// Read the cell as-is.
    Any,
}

impl ValueType {
    /// Numeric and boolean targets have a zero value and are never null.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Self::Bool | Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::F32 | Self::F64
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Text => "String",
            Self::Bytes => "Vec<u8>",
            Self::Date => "NaiveDate",
            Self::Time => "NaiveTime",
            Self::Timestamp => "NaiveDateTime",
            Self::Json => "serde_json::Value",
            Self::Array => "Vec<Value>",
            Self::Any => "Value",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean(_) => "BOOLEAN",
            Self::TinyInt(_) => "TINYINT",
            Self::SmallInt(_) => "SMALLINT",
            Self::Integer(_) => "INTEGER",
            Self::BigInt(_) => "BIGINT",
            Self::Float(_) => "FLOAT",
            Self::Double(_) => "DOUBLE",
            Self::Text(_) => "TEXT",
            Self::Bytes(_) => "BYTES",
            Self::Date(_) => "DATE",
            Self::Time(_) => "TIME",
            Self::Timestamp(_) => "TIMESTAMP",
            Self::Json(_) => "JSON",
            Self::Array(_) => "ARRAY",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Zero value of a primitive target, `None` for everything else.
    pub fn zero(kind: ValueType) -> Option<Value> {
        match kind {
            ValueType::Bool => Some(Self::Boolean(false)),
            ValueType::I8 => Some(Self::TinyInt(0)),
            ValueType::I16 => Some(Self::SmallInt(0)),
            ValueType::I32 => Some(Self::Integer(0)),
            ValueType::I64 => Some(Self::BigInt(0)),
            ValueType::F32 => Some(Self::Float(0.0)),
            ValueType::F64 => Some(Self::Double(0.0)),
            _ => None,
        }
    }

    fn integral(&self) -> Option<i64> {
        match self {
            Self::TinyInt(v) => Some(i64::from(*v)),
            Self::SmallInt(v) => Some(i64::from(*v)),
            Self::Integer(v) => Some(i64::from(*v)),
            Self::BigInt(v) => Some(*v),
            Self::Boolean(b) => Some(i64::from(*b)),
            Self::Float(f) => exact_integer(f64::from(*f)),
            Self::Double(f) => exact_integer(*f),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        self.integral().and_then(|v| i8::try_from(v).ok())
    }

    pub fn as_i16(&self) -> Option<i16> {
        self.integral().and_then(|v| i16::try_from(v).ok())
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.integral().and_then(|v| i32::try_from(v).ok())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.integral()
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(f64::from(*f)),
            Self::Double(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Boolean(_) => None,
            other => other.integral().map(|v| v as f64),
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            other => other.as_f64().map(|v| v as f32),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            Self::TinyInt(_) | Self::SmallInt(_) | Self::Integer(_) | Self::BigInt(_) => {
                self.integral().map(|v| v != 0)
            }
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "y" | "1" => Some(true),
                "false" | "f" | "no" | "n" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// String rendering of any scalar cell.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null | Self::Array(_) => None,
            Self::Text(s) => Some(s.clone()),
            Self::Bytes(b) => String::from_utf8(b.clone()).ok(),
            Self::Json(j) => Some(j.to_string()),
            other => Some(other.to_string()),
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            Self::Date(d) => d.and_hms_opt(0, 0, 0),
            Self::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Timestamp(ts) => Some(ts.date()),
            Self::Text(s) => NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .ok()
                .or_else(|| parse_timestamp(s).map(|ts| ts.date())),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Self::Time(t) => Some(*t),
            Self::Timestamp(ts) => Some(ts.time()),
            Self::Text(s) => TIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveTime::parse_from_str(s.trim(), fmt).ok()),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Json(j) => Some(j.clone()),
            Self::Text(s) => serde_json::from_str(s).ok(),
            _ => None,
        }
    }
}

/// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
fn exact_integer(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < 9_223_372_036_854_775_808.0 {
        Some(f as i64)
    } else {
        None
    }
}

pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::TinyInt(v) => write!(f, "{}", v),
            Self::SmallInt(v) => write!(f, "{}", v),
            Self::Integer(v) => write!(f, "{}", v),
            Self::BigInt(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::Text(s) => write!(f, "{}", s),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Self::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Self::Json(j) => write!(f, "{}", j),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Self::TinyInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::BigInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Self::Time(t)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Self::Json(j)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_accessors_reject_out_of_range() {
        let big = Value::BigInt(i64::from(i32::MAX) + 1);
        assert_eq!(big.as_i64(), Some(2_147_483_648));
        assert_eq!(big.as_i32(), None);
        assert_eq!(Value::Integer(300).as_i8(), None);
        assert_eq!(Value::Integer(-12).as_i16(), Some(-12));
    }

    #[test]
    fn test_fractional_double_is_not_an_integer() {
        assert_eq!(Value::Double(3.0).as_i32(), Some(3));
        assert_eq!(Value::Double(3.7).as_i32(), None);
    }

    #[test]
    fn test_temporal_accessors() {
        let ts = Value::Text("2024-03-05 10:20:30".into()).as_timestamp().unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(
            Value::Timestamp(ts).as_time(),
            NaiveTime::from_hms_opt(10, 20, 30)
        );
        assert_eq!(
            Value::Text("2024-03-05".into()).as_timestamp().map(|t| t.time()),
            NaiveTime::from_hms_opt(0, 0, 0)
        );
    }

    #[test]
    fn test_double_at_i64_boundaries() {
        assert_eq!(Value::Double(9_223_372_036_854_775_808.0).as_i64(), None);
        assert_eq!(Value::Double(i64::MIN as f64).as_i64(), Some(i64::MIN));
        assert_eq!(Value::Double(9_223_372_036_854_774_784.0).as_i64(), Some(9_223_372_036_854_774_784));
    }

    #[test]
    fn test_bool_from_text_and_numbers() {
        assert_eq!(Value::Text("TRUE".into()).as_bool(), Some(true));
        assert_eq!(Value::BigInt(0).as_bool(), Some(false));
        assert_eq!(Value::Text("maybe".into()).as_bool(), None);
    }

    #[test]
    fn test_primitive_zero_values() {
        assert_eq!(Value::zero(ValueType::I32), Some(Value::Integer(0)));
        assert_eq!(Value::zero(ValueType::Bool), Some(Value::Boolean(false)));
        assert_eq!(Value::zero(ValueType::Text), None);
    }
}
