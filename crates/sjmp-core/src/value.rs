//! Tagged wire values and JSON coercion.
//!
//! A JSON number decodes without width information, so every value read from
//! the wire is coerced into the declared [`WireType`] before it is compared
//! against limits or handed to the host.

use crate::error::{Result, SjmpError};
use crate::types::WireType;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// A scalar value of one of the wire types.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Void,
    String(String),
    Bool(bool),
    Float(f32),
    Double(f64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
}

impl WireValue {
    pub fn wire_type(&self) -> WireType {
        match self {
            WireValue::Void => WireType::Void,
            WireValue::String(_) => WireType::String,
            WireValue::Bool(_) => WireType::Bool,
            WireValue::Float(_) => WireType::Float,
            WireValue::Double(_) => WireType::Double,
            WireValue::Int8(_) => WireType::Int8,
            WireValue::Int16(_) => WireType::Int16,
            WireValue::Int32(_) => WireType::Int32,
            WireValue::Int64(_) => WireType::Int64,
            WireValue::UInt8(_) => WireType::UInt8,
            WireValue::UInt16(_) => WireType::UInt16,
            WireValue::UInt32(_) => WireType::UInt32,
        }
    }

    /// Integer view of an int-category value.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            WireValue::Int8(v) => Some(v.into()),
            WireValue::Int16(v) => Some(v.into()),
            WireValue::Int32(v) => Some(v.into()),
            WireValue::Int64(v) => Some(v),
            WireValue::UInt8(v) => Some(v.into()),
            WireValue::UInt16(v) => Some(v.into()),
            WireValue::UInt32(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Floating point view of a float-category value.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            WireValue::Float(v) => Some(v.into()),
            WireValue::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            WireValue::Void => Value::Null,
            WireValue::String(v) => Value::String(v.clone()),
            WireValue::Bool(v) => Value::Bool(*v),
            // Shortest f32 decimal, not the widened f64.
            WireValue::Float(v) => v
                .to_string()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            WireValue::Double(v) => Value::from(*v),
            WireValue::Int8(v) => Value::from(*v),
            WireValue::Int16(v) => Value::from(*v),
            WireValue::Int32(v) => Value::from(*v),
            WireValue::Int64(v) => Value::from(*v),
            WireValue::UInt8(v) => Value::from(*v),
            WireValue::UInt16(v) => Value::from(*v),
            WireValue::UInt32(v) => Value::from(*v),
        }
    }

    /// Coerce a decoded JSON scalar into the declared wire type.
    ///
    /// Integers narrow to the declared width when they fit and widen into
    /// float types; a double narrows to float. Anything else is a mismatch.
    pub fn from_json(value: &Value, wire_type: WireType) -> Result<Self> {
        let mismatch = || SjmpError::TypeMismatch {
            expected: wire_type,
            found: describe_json(value),
        };

        match wire_type {
            WireType::Void => match value {
                Value::Null => Ok(WireValue::Void),
                _ => Err(mismatch()),
            },
            WireType::String => value
                .as_str()
                .map(|s| WireValue::String(s.to_string()))
                .ok_or_else(mismatch),
            WireType::Bool => value.as_bool().map(WireValue::Bool).ok_or_else(mismatch),
            WireType::Double => value.as_f64().map(WireValue::Double).ok_or_else(mismatch),
            WireType::Float => {
                let wide = value.as_f64().ok_or_else(mismatch)?;
                let narrow = wide as f32;
                if wide.is_finite() && !narrow.is_finite() {
                    return Err(out_of_range(value, wire_type));
                }
                Ok(WireValue::Float(narrow))
            }
            WireType::Int8 => narrow(value, wire_type, WireValue::Int8),
            WireType::Int16 => narrow(value, wire_type, WireValue::Int16),
            WireType::Int32 => narrow(value, wire_type, WireValue::Int32),
            WireType::Int64 => narrow(value, wire_type, WireValue::Int64),
            WireType::UInt8 => narrow(value, wire_type, WireValue::UInt8),
            WireType::UInt16 => narrow(value, wire_type, WireValue::UInt16),
            WireType::UInt32 => narrow(value, wire_type, WireValue::UInt32),
        }
    }
}

fn integer(value: &Value, wire_type: WireType) -> Result<i128> {
    if let Some(v) = value.as_i64() {
        return Ok(v.into());
    }
    if let Some(v) = value.as_u64() {
        return Ok(v.into());
    }
    Err(SjmpError::TypeMismatch {
        expected: wire_type,
        found: describe_json(value),
    })
}

fn narrow<T: TryFrom<i128>>(
    value: &Value,
    wire_type: WireType,
    wrap: impl FnOnce(T) -> WireValue,
) -> Result<WireValue> {
    let wide = integer(value, wire_type)?;
    T::try_from(wide)
        .map(wrap)
        .map_err(|_| out_of_range(value, wire_type))
}

fn out_of_range(value: &Value, wire_type: WireType) -> SjmpError {
    SjmpError::ValueOutOfRange {
        value: value.to_string(),
        wire_type,
    }
}

fn describe_json(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("bool {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) if s.chars().count() > 32 => {
            format!("string \"{}...\"", s.chars().take(32).collect::<String>())
        }
        Value::String(s) => format!("string \"{}\"", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

impl Serialize for WireValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            WireValue::Void => serializer.serialize_unit(),
            WireValue::String(v) => serializer.serialize_str(v),
            WireValue::Bool(v) => serializer.serialize_bool(*v),
            WireValue::Float(v) => serializer.serialize_f32(*v),
            WireValue::Double(v) => serializer.serialize_f64(*v),
            WireValue::Int8(v) => serializer.serialize_i8(*v),
            WireValue::Int16(v) => serializer.serialize_i16(*v),
            WireValue::Int32(v) => serializer.serialize_i32(*v),
            WireValue::Int64(v) => serializer.serialize_i64(*v),
            WireValue::UInt8(v) => serializer.serialize_u8(*v),
            WireValue::UInt16(v) => serializer.serialize_u16(*v),
            WireValue::UInt32(v) => serializer.serialize_u32(*v),
        }
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireValue::Void => f.write_str("void"),
            WireValue::String(v) => f.write_str(v),
            WireValue::Bool(v) => write!(f, "{}", v),
            WireValue::Float(v) => write!(f, "{}", v),
            WireValue::Double(v) => write!(f, "{}", v),
            WireValue::Int8(v) => write!(f, "{}", v),
            WireValue::Int16(v) => write!(f, "{}", v),
            WireValue::Int32(v) => write!(f, "{}", v),
            WireValue::Int64(v) => write!(f, "{}", v),
            WireValue::UInt8(v) => write!(f, "{}", v),
            WireValue::UInt16(v) => write!(f, "{}", v),
            WireValue::UInt32(v) => write!(f, "{}", v),
        }
    }
}

/// A Rust type with a fixed wire representation.
///
/// Implemented for exactly the types of the wire palette, so a declaration
/// with any other type is rejected at compile time.
pub trait HostType: Sized + Send + 'static {
    const WIRE_TYPE: WireType;

    fn into_wire(self) -> WireValue;

    /// Extract from a value already coerced to [`Self::WIRE_TYPE`].
    fn from_wire(value: WireValue) -> Option<Self>;
}

macro_rules! host_type {
    ($ty:ty, $variant:ident) => {
        impl HostType for $ty {
            const WIRE_TYPE: WireType = WireType::$variant;

            fn into_wire(self) -> WireValue {
                WireValue::$variant(self)
            }

            fn from_wire(value: WireValue) -> Option<Self> {
                match value {
                    WireValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

host_type!(String, String);
host_type!(bool, Bool);
host_type!(f32, Float);
host_type!(f64, Double);
host_type!(i8, Int8);
host_type!(i16, Int16);
host_type!(i32, Int32);
host_type!(i64, Int64);
host_type!(u8, UInt8);
host_type!(u16, UInt16);
host_type!(u32, UInt32);

impl HostType for () {
    const WIRE_TYPE: WireType = WireType::Void;

    fn into_wire(self) -> WireValue {
        WireValue::Void
    }

    fn from_wire(value: WireValue) -> Option<Self> {
        match value {
            WireValue::Void => Some(()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_narrows_to_declared_width() {
        assert_eq!(
            WireValue::from_json(&json!(-10), WireType::Int8).unwrap(),
            WireValue::Int8(-10)
        );
        assert_eq!(
            WireValue::from_json(&json!(65535), WireType::UInt16).unwrap(),
            WireValue::UInt16(65535)
        );
        assert_eq!(
            WireValue::from_json(&json!(4_294_967_295u64), WireType::UInt32).unwrap(),
            WireValue::UInt32(u32::MAX)
        );
        assert_eq!(
            WireValue::from_json(&json!(i64::MIN), WireType::Int64).unwrap(),
            WireValue::Int64(i64::MIN)
        );
    }

    #[test]
    fn test_integer_out_of_range() {
        let err = WireValue::from_json(&json!(300), WireType::UInt8).unwrap_err();
        assert!(matches!(err, SjmpError::ValueOutOfRange { .. }));

        let err = WireValue::from_json(&json!(-1), WireType::UInt32).unwrap_err();
        assert!(matches!(err, SjmpError::ValueOutOfRange { .. }));

        let err = WireValue::from_json(&json!(u64::MAX), WireType::Int64).unwrap_err();
        assert!(matches!(err, SjmpError::ValueOutOfRange { .. }));
    }

    #[test]
    fn test_float_writes_shortest_decimal() {
        assert_eq!(WireValue::Float(0.1).to_json(), json!(0.1));
        assert_eq!(WireValue::Float(-3.7).to_json(), json!(-3.7));
        assert_eq!(WireValue::Float(f32::NAN).to_json(), Value::Null);
        assert_eq!(
            WireValue::Float(0.1).to_json().to_string(),
            serde_json::to_string(&WireValue::Float(0.1)).unwrap()
        );
    }

    #[test]
    fn test_integer_widens_into_floats() {
        assert_eq!(
            WireValue::from_json(&json!(50), WireType::Double).unwrap(),
            WireValue::Double(50.0)
        );
        assert_eq!(
            WireValue::from_json(&json!(-3), WireType::Float).unwrap(),
            WireValue::Float(-3.0)
        );
        assert_eq!(
            WireValue::from_json(&json!(2.5), WireType::Float).unwrap(),
            WireValue::Float(2.5)
        );
    }

    #[test]
    fn test_float_does_not_truncate_into_integer() {
        let err = WireValue::from_json(&json!(1.5), WireType::Int32).unwrap_err();
        assert!(matches!(err, SjmpError::TypeMismatch { .. }));
    }

    #[test]
    fn test_float_overflow() {
        let err = WireValue::from_json(&json!(1e300), WireType::Float).unwrap_err();
        assert!(matches!(err, SjmpError::ValueOutOfRange { .. }));
    }

    #[test]
    fn test_kind_mismatches() {
        assert!(WireValue::from_json(&json!("true"), WireType::Bool).is_err());
        assert!(WireValue::from_json(&json!(1), WireType::String).is_err());
        assert!(WireValue::from_json(&json!([1]), WireType::Int32).is_err());
        assert!(WireValue::from_json(&json!(0), WireType::Void).is_err());
        assert_eq!(
            WireValue::from_json(&Value::Null, WireType::Void).unwrap(),
            WireValue::Void
        );
    }

    #[test]
    fn test_json_output_matches_wire_type() {
        for value in [
            WireValue::String("abc".into()),
            WireValue::Bool(true),
            WireValue::Float(0.5),
            WireValue::Double(-7.25),
            WireValue::Int8(i8::MIN),
            WireValue::Int16(i16::MAX),
            WireValue::Int32(-5),
            WireValue::Int64(i64::MAX),
            WireValue::UInt8(u8::MAX),
            WireValue::UInt16(7),
            WireValue::UInt32(u32::MAX),
        ] {
            let json = value.to_json();
            assert_eq!(serde_json::to_value(&value).unwrap(), json);
            assert_eq!(WireValue::from_json(&json, value.wire_type()).unwrap(), value);
        }
    }

    #[test]
    fn test_host_type_extraction() {
        assert_eq!(i32::from_wire(WireValue::Int32(4)), Some(4));
        assert_eq!(i32::from_wire(WireValue::Int64(4)), None);
        assert_eq!(<()>::WIRE_TYPE, WireType::Void);
        assert_eq!(String::WIRE_TYPE, WireType::String);
        assert_eq!(42u8.into_wire(), WireValue::UInt8(42));
    }
}
