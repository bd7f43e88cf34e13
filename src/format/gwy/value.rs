//! Typed values of the Gwyddion object grammar.

use bytes::Bytes;
use serde_json::Value;

// =============================================================================
// Type Tags
// =============================================================================

/// Single-byte type tags that precede every component value.
pub mod tag {
    pub const BOOL: u8 = b'b';
    pub const CHAR: u8 = b'c';
    pub const INT32: u8 = b'i';
    pub const INT64: u8 = b'q';
    pub const DOUBLE: u8 = b'd';
    pub const STRING: u8 = b's';
    pub const OBJECT: u8 = b'o';
    pub const CHAR_ARRAY: u8 = b'C';
    pub const INT32_ARRAY: u8 = b'I';
    pub const INT64_ARRAY: u8 = b'Q';
    pub const DOUBLE_ARRAY: u8 = b'D';
    pub const STRING_ARRAY: u8 = b'S';
    pub const OBJECT_ARRAY: u8 = b'O';
}

// =============================================================================
// GwyValue
// =============================================================================

/// One component value.
#[derive(Debug, Clone, PartialEq)]
pub enum GwyValue {
    Bool(bool),
    Char(u8),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    Object(GwyObject),
    CharArray(Bytes),
    Int32Array(Vec<i32>),
    Int64Array(Vec<i64>),
    DoubleArray(Vec<f64>),
    StringArray(Vec<String>),
    ObjectArray(Vec<GwyObject>),
}

impl GwyValue {
    /// The wire tag this value is encoded with.
    pub const fn type_tag(&self) -> u8 {
        match self {
            GwyValue::Bool(_) => tag::BOOL,
            GwyValue::Char(_) => tag::CHAR,
            GwyValue::Int32(_) => tag::INT32,
            GwyValue::Int64(_) => tag::INT64,
            GwyValue::Double(_) => tag::DOUBLE,
            GwyValue::String(_) => tag::STRING,
            GwyValue::Object(_) => tag::OBJECT,
            GwyValue::CharArray(_) => tag::CHAR_ARRAY,
            GwyValue::Int32Array(_) => tag::INT32_ARRAY,
            GwyValue::Int64Array(_) => tag::INT64_ARRAY,
            GwyValue::DoubleArray(_) => tag::DOUBLE_ARRAY,
            GwyValue::StringArray(_) => tag::STRING_ARRAY,
            GwyValue::ObjectArray(_) => tag::OBJECT_ARRAY,
        }
    }

    /// Integer view of scalar integer values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GwyValue::Int32(v) => Some(i64::from(*v)),
            GwyValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    /// Floating-point view of scalar numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GwyValue::Double(v) => Some(*v),
            GwyValue::Int32(v) => Some(f64::from(*v)),
            GwyValue::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GwyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&GwyObject> {
        match self {
            GwyValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Scalar values as JSON; arrays and objects have no metadata form.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            GwyValue::Bool(v) => Some(Value::from(*v)),
            GwyValue::Char(v) => Some(Value::from((*v as char).to_string())),
            GwyValue::Int32(v) => Some(Value::from(*v)),
            GwyValue::Int64(v) => Some(Value::from(*v)),
            GwyValue::Double(v) => Some(Value::from(*v)),
            GwyValue::String(v) => Some(Value::from(v.as_str())),
            _ => None,
        }
    }
}

// =============================================================================
// GwyObject
// =============================================================================

/// A named container of ordered `(name, value)` components.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GwyObject {
    /// Type name, e.g. `GwyContainer` or `GwyDataField`
    pub name: String,
    components: Vec<(String, GwyValue)>,
}

impl GwyObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: Vec::new(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>, value: GwyValue) {
        self.components.push((name.into(), value));
    }

    /// First component with the given name.
    pub fn get(&self, name: &str) -> Option<&GwyValue> {
        self.components
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn get_object(&self, name: &str) -> Option<&GwyObject> {
        self.get(name).and_then(GwyValue::as_object)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(GwyValue::as_str)
    }

    pub fn components(&self) -> impl Iterator<Item = (&str, &GwyValue)> {
        self.components.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
