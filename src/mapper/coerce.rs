use crate::core::{Value, ValueType};

/// Converts a raw cell into the representation required by a property.
///
/// Rules, in order:
/// 1. a null cell passes through unless the target is a non-nullable
///    primitive, which receives its zero value;
/// 2. known targets use their dedicated read path (each numeric width has its
///    own, so no value goes through a lossy generic numeric read);
/// 3. everything else is read as-is.
///
/// A cell the dedicated read path cannot represent is returned unchanged;
/// setter-time reconciliation then reports the mismatch.
pub fn coerce(cell: &Value, kind: ValueType, nullable: bool) -> Value {
    if cell.is_null() {
        if nullable || !kind.is_primitive() {
            return Value::Null;
        }
        return Value::zero(kind).unwrap_or(Value::Null);
    }

    let read = match kind {
        ValueType::Text => cell.as_text().map(Value::Text),
        ValueType::I32 => cell.as_i32().map(Value::Integer),
        ValueType::Bool => cell.as_bool().map(Value::Boolean),
        ValueType::I64 => cell.as_i64().map(Value::BigInt),
        ValueType::F64 => cell.as_f64().map(Value::Double),
        ValueType::F32 => cell.as_f32().map(Value::Float),
        ValueType::I16 => cell.as_i16().map(Value::SmallInt),
        ValueType::I8 => cell.as_i8().map(Value::TinyInt),
        ValueType::Timestamp => cell.as_timestamp().map(Value::Timestamp),
        ValueType::Date => cell.as_date().map(Value::Date),
        ValueType::Time => cell.as_time().map(Value::Time),
        ValueType::Json => cell.as_json().map(Value::Json),
        ValueType::Bytes | ValueType::Array | ValueType::Any => None,
    };

    read.unwrap_or_else(|| cell.clone())
}
