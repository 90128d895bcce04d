use crate::core::{Value, ValueType};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// A property type that can receive a coerced cell.
///
/// `from_value` is the setter-time reconciliation step: it accepts the value
/// when it already fits, applies the few known-safe temporal conversions, and
/// hands the value back untouched when it is structurally incompatible.
pub trait ColumnType: Sized + Send + 'static {
    /// Read path used by the coercer.
    const KIND: ValueType;
    /// `true` for `Option<T>`: a null cell passes through instead of becoming a zero value.
    const NULLABLE: bool = false;

    fn from_value(value: Value) -> Result<Self, Value>;

    fn to_value(&self) -> Value;

    fn type_name() -> &'static str {
        Self::KIND.name()
    }
}

macro_rules! scalar_column {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl ColumnType for $ty {
            const KIND: ValueType = ValueType::$kind;

            fn from_value(value: Value) -> Result<Self, Value> {
                match value {
                    Value::$variant(v) => Ok(v),
                    Value::Null => Ok(<$ty>::default()),
                    other => Err(other),
                }
            }

            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }
        }
    };
}

scalar_column!(bool, Bool, Boolean);
scalar_column!(i8, I8, TinyInt);
scalar_column!(i16, I16, SmallInt);
scalar_column!(i32, I32, Integer);
scalar_column!(i64, I64, BigInt);
scalar_column!(f32, F32, Float);
scalar_column!(f64, F64, Double);
scalar_column!(String, Text, Text);
scalar_column!(Vec<u8>, Bytes, Bytes);
scalar_column!(Vec<Value>, Array, Array);

impl ColumnType for NaiveDateTime {
    const KIND: ValueType = ValueType::Timestamp;

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            Value::Date(d) => d.and_hms_opt(0, 0, 0).ok_or(Value::Date(d)),
            Value::Null => Ok(NaiveDateTime::default()),
            other => Err(other),
        }
    }

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }
}

impl ColumnType for NaiveDate {
    const KIND: ValueType = ValueType::Date;

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Date(d) => Ok(d),
            Value::Timestamp(ts) => Ok(ts.date()),
            Value::Null => Ok(NaiveDate::default()),
            other => Err(other),
        }
    }

    fn to_value(&self) -> Value {
        Value::Date(*self)
    }
}

impl ColumnType for NaiveTime {
    const KIND: ValueType = ValueType::Time;

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Time(t) => Ok(t),
            Value::Timestamp(ts) => Ok(ts.time()),
            Value::Null => Ok(NaiveTime::default()),
            other => Err(other),
        }
    }

    fn to_value(&self) -> Value {
        Value::Time(*self)
    }
}

impl ColumnType for serde_json::Value {
    const KIND: ValueType = ValueType::Json;

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Json(j) => Ok(j),
            Value::Null => Ok(serde_json::Value::Null),
            other => Err(other),
        }
    }

    fn to_value(&self) -> Value {
        Value::Json(self.clone())
    }
}

impl ColumnType for Value {
    const KIND: ValueType = ValueType::Any;
    const NULLABLE: bool = true;

    fn from_value(value: Value) -> Result<Self, Value> {
        Ok(value)
    }

    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl<T: ColumnType> ColumnType for Option<T> {
    const KIND: ValueType = T::KIND;
    const NULLABLE: bool = true;

    fn from_value(value: Value) -> Result<Self, Value> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ColumnType::to_value)
    }

    fn type_name() -> &'static str {
        T::type_name()
    }
}
