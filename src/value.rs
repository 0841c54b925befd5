//! Dynamic host values and the typed-field decoder.
//!
//! Everything a dynamic host hands across the boundary arrives as a
//! [`HostValue`]. The decoder classifies one value at a time into the small
//! set of native field shapes the engine understands ([`DecodedField`]);
//! classification is a pure function so it can be tested against literal
//! inputs. Positions that require a specific shape (identifier fields,
//! counts, names) use the strict `expect_*` extractors instead.

use thiserror::Error;

/// A dynamically-typed value as observed at the host boundary.
///
/// `Id` carries the big-integer-shaped opaque 64-bit identifiers used for
/// entities and types. `Object` keeps its entries in host property order,
/// which matters for descriptor inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Opaque 64-bit identifier, big-integer shaped on the host side.
    Id(u64),
    Array(Vec<HostValue>),
    Object(Vec<(String, HostValue)>),
}

impl HostValue {
    /// Builds an object value from `(key, value)` entries.
    pub fn object<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, HostValue)>,
        K: Into<String>,
    {
        HostValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Builds an array value from items.
    pub fn array<I>(items: I) -> Self
    where
        I: IntoIterator<Item = HostValue>,
    {
        HostValue::Array(items.into_iter().collect())
    }

    /// Property lookup on an object value; `None` for anything else.
    pub fn get(&self, key: &str) -> Option<&HostValue> {
        match self {
            HostValue::Object(entries) => {
                entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&[(String, HostValue)]> {
        match self {
            HostValue::Object(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Host-facing name of the value's runtime type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Id(_) => "bigint",
            HostValue::Array(_) => "array",
            HostValue::Object(_) => "object",
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Number(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Number(value as f64)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::String(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::String(value)
    }
}

/// One dynamic input classified into a native field shape.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedField {
    Bool(bool),
    Float64(f64),
    String(String),
    OpaqueId(u64),
    /// The value's runtime type has no native counterpart. Generic
    /// object-to-variable conversion skips these entries; the skip is
    /// documented behavior, not an error.
    Unsupported,
}

/// Classifies one dynamic value. Pure and total.
///
/// - booleans → `Bool`
/// - numbers → `Float64` (host integers are not distinguished from floats)
/// - strings → `String`, copied into owned storage
/// - big-integer-shaped ids → `OpaqueId`
/// - everything else → `Unsupported`
pub fn decode_field(value: &HostValue) -> DecodedField {
    match value {
        HostValue::Bool(b) => DecodedField::Bool(*b),
        HostValue::Number(n) => DecodedField::Float64(*n),
        HostValue::String(s) => DecodedField::String(s.clone()),
        HostValue::Id(id) => DecodedField::OpaqueId(*id),
        _ => DecodedField::Unsupported,
    }
}

/// A dynamic value could not be coerced to the expected native field type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("cannot decode `{field}`: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl DecodeError {
    fn mismatch(field: &str, expected: &'static str, actual: &HostValue) -> Self {
        DecodeError::TypeMismatch {
            field: field.to_string(),
            expected,
            actual: actual.type_name(),
        }
    }
}

/// Extracts an opaque 64-bit identifier. Identifier positions are strict:
/// only big-integer-shaped values are accepted, numbers are not.
pub fn expect_id(value: &HostValue, field: &str) -> Result<u64, DecodeError> {
    match value {
        HostValue::Id(id) => Ok(*id),
        other => Err(DecodeError::mismatch(field, "bigint", other)),
    }
}

/// Extracts a 32-bit integer from a number value, truncating toward zero.
pub fn expect_i32(value: &HostValue, field: &str) -> Result<i32, DecodeError> {
    match value {
        HostValue::Number(n) => Ok(*n as i32),
        other => Err(DecodeError::mismatch(field, "number", other)),
    }
}

/// Extracts a boolean value.
pub fn expect_bool(value: &HostValue, field: &str) -> Result<bool, DecodeError> {
    match value {
        HostValue::Bool(b) => Ok(*b),
        other => Err(DecodeError::mismatch(field, "boolean", other)),
    }
}

/// Extracts borrowed text from a string value.
pub fn expect_str<'a>(value: &'a HostValue, field: &str) -> Result<&'a str, DecodeError> {
    match value {
        HostValue::String(s) => Ok(s),
        other => Err(DecodeError::mismatch(field, "string", other)),
    }
}
