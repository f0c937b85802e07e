//! Feature value types and the coercion contract.
//!
//! Every online table declares a [`ValueType`]. Values written into a table
//! are coerced into that type deterministically with [`Value::coerce`]; a
//! value that cannot be represented fails with [`Error::TypeCoercion`].
//!
//! Coercion rules:
//!
//! - Integer representations (`Int`, `Int32`, `Int64`) convert between each
//!   other when the value fits the destination width.
//! - Integers widen into floats; floats narrow into integers only when they
//!   have no fractional part and fit the destination.
//! - Strings are parsed into numeric, boolean, and datetime destinations.
//! - Datetimes accept RFC 3339 strings and integer unix seconds.
//! - Vectors must match the declared dimension exactly.
//! - `Null` is accepted by every destination.
//!
//! # Example
//!
//! ```rust
//! use fstore_core::value::{ScalarType, Value, ValueType};
//!
//! let declared = ValueType::Scalar(ScalarType::Int64);
//! let stored = Value::Int(1).coerce(&declared)?;
//! assert_eq!(stored, Value::Int64(1));
//! # Ok::<(), fstore_core::Error>(())
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Scalar kinds supported by online tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    /// No declared type; values are stored as written.
    #[default]
    #[serde(rename = "")]
    Nil,
    /// Platform integer (stored as 64 bits).
    Int,
    /// 32-bit integer.
    Int32,
    /// 64-bit integer.
    Int64,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
    /// UTF-8 string.
    String,
    /// Boolean.
    Bool,
    /// UTC timestamp.
    Datetime,
}

impl ScalarType {
    /// Returns the wire name of the scalar type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Nil => "",
            Self::Int => "int",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Datetime => "datetime",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            other => f.write_str(other.as_str()),
        }
    }
}

impl FromStr for ScalarType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "nil" => Ok(Self::Nil),
            "int" => Ok(Self::Int),
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "float32" => Ok(Self::Float32),
            "float64" => Ok(Self::Float64),
            "string" => Ok(Self::String),
            "bool" => Ok(Self::Bool),
            "datetime" => Ok(Self::Datetime),
            other => Err(Error::InvalidInput(format!("unknown scalar type '{other}'"))),
        }
    }
}

/// A fixed-dimension vector of scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorType {
    /// Element type (only `float32` is indexed for similarity search).
    pub scalar_type: ScalarType,
    /// Number of elements.
    pub dimension: u32,
    /// Whether the vector is an embedding that requires a similarity index.
    pub is_embedding: bool,
}

impl VectorType {
    /// Creates a `float32` embedding type of the given dimension.
    #[must_use]
    pub const fn embedding(dimension: u32) -> Self {
        Self {
            scalar_type: ScalarType::Float32,
            dimension,
            is_embedding: true,
        }
    }
}

impl fmt::Display for VectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vector<{}; {}>", self.scalar_type, self.dimension)?;
        if self.is_embedding {
            f.write_str(" (embedding)")?;
        }
        Ok(())
    }
}

/// Declared type of a resource's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "type", rename_all = "snake_case")]
pub enum ValueType {
    /// A single scalar.
    Scalar(ScalarType),
    /// A fixed-dimension vector.
    Vector(VectorType),
}

impl ValueType {
    /// Returns the vector type if this is a vector.
    #[must_use]
    pub const fn as_vector(&self) -> Option<&VectorType> {
        match self {
            Self::Vector(vector) => Some(vector),
            Self::Scalar(_) => None,
        }
    }

    /// Returns true if values of this type must be indexed for similarity search.
    #[must_use]
    pub const fn is_embedding(&self) -> bool {
        matches!(self, Self::Vector(VectorType { is_embedding: true, .. }))
    }
}

impl Default for ValueType {
    fn default() -> Self {
        Self::Scalar(ScalarType::Nil)
    }
}

impl From<ScalarType> for ValueType {
    fn from(scalar: ScalarType) -> Self {
        Self::Scalar(scalar)
    }
}

impl From<VectorType> for ValueType {
    fn from(vector: VectorType) -> Self {
        Self::Vector(vector)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(scalar) => scalar.fmt(f),
            Self::Vector(vector) => vector.fmt(f),
        }
    }
}

/// A single feature value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Missing value.
    Null,
    /// Untyped integer literal.
    Int(i64),
    /// 32-bit integer.
    Int32(i32),
    /// 64-bit integer.
    Int64(i64),
    /// 32-bit float.
    Float32(f32),
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Boolean.
    Bool(bool),
    /// UTC timestamp.
    Datetime(DateTime<Utc>),
    /// Vector of `float32` elements.
    Vector(Vec<f32>),
}

impl Value {
    /// Returns a short name for the representation, used in error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::String(_) => "string",
            Self::Bool(_) => "bool",
            Self::Datetime(_) => "datetime",
            Self::Vector(_) => "vector",
        }
    }

    /// Returns the vector elements if this is a vector.
    #[must_use]
    pub fn as_vector(&self) -> Option<&[f32]> {
        match self {
            Self::Vector(elements) => Some(elements),
            _ => None,
        }
    }

    /// Coerces the value into the declared type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeCoercion`] if the value cannot be represented in
    /// the declared type without loss of meaning.
    pub fn coerce(self, declared: &ValueType) -> Result<Self> {
        if matches!(self, Self::Null) {
            return Ok(self);
        }
        match declared {
            ValueType::Scalar(scalar) => self.coerce_scalar(*scalar),
            ValueType::Vector(vector) => self.coerce_vector(vector),
        }
    }

    fn coerce_scalar(self, target: ScalarType) -> Result<Self> {
        let found = self.kind_name();
        match target {
            ScalarType::Nil => Ok(self),
            ScalarType::Int => self.to_i64(target).map(Self::Int),
            ScalarType::Int64 => self.to_i64(target).map(Self::Int64),
            ScalarType::Int32 => {
                let wide = self.to_i64(target)?;
                i32::try_from(wide)
                    .map(Self::Int32)
                    .map_err(|_| Error::coercion(target, found, format!("{wide} overflows int32")))
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            ScalarType::Float32 => match self {
                Self::Float32(v) => Ok(Self::Float32(v)),
                Self::Float64(v) => Ok(Self::Float32(v as f32)),
                Self::Int(v) | Self::Int64(v) => Ok(Self::Float32(v as f32)),
                Self::Int32(v) => Ok(Self::Float32(v as f32)),
                Self::String(s) => s
                    .trim()
                    .parse::<f32>()
                    .map(Self::Float32)
                    .map_err(|e| Error::coercion(target, found, e.to_string())),
                other => Err(unsupported(target, &other)),
            },
            #[allow(clippy::cast_precision_loss)]
            ScalarType::Float64 => match self {
                Self::Float64(v) => Ok(Self::Float64(v)),
                Self::Float32(v) => Ok(Self::Float64(f64::from(v))),
                Self::Int(v) | Self::Int64(v) => Ok(Self::Float64(v as f64)),
                Self::Int32(v) => Ok(Self::Float64(f64::from(v))),
                Self::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Self::Float64)
                    .map_err(|e| Error::coercion(target, found, e.to_string())),
                other => Err(unsupported(target, &other)),
            },
            ScalarType::String => match self {
                Self::String(s) => Ok(Self::String(s)),
                other => Err(unsupported(target, &other)),
            },
            ScalarType::Bool => match self {
                Self::Bool(b) => Ok(Self::Bool(b)),
                Self::String(s) => s
                    .trim()
                    .parse::<bool>()
                    .map(Self::Bool)
                    .map_err(|e| Error::coercion(target, found, e.to_string())),
                other => Err(unsupported(target, &other)),
            },
            ScalarType::Datetime => match self {
                Self::Datetime(ts) => Ok(Self::Datetime(ts)),
                Self::String(s) => DateTime::parse_from_rfc3339(s.trim())
                    .map(|ts| Self::Datetime(ts.with_timezone(&Utc)))
                    .map_err(|e| Error::coercion(target, found, e.to_string())),
                Self::Int(secs) | Self::Int64(secs) => DateTime::from_timestamp(secs, 0)
                    .map(Self::Datetime)
                    .ok_or_else(|| {
                        Error::coercion(target, found, format!("{secs} is out of range"))
                    }),
                other => Err(unsupported(target, &other)),
            },
        }
    }

    fn to_i64(self, target: ScalarType) -> Result<i64> {
        let found = self.kind_name();
        match self {
            Self::Int(v) | Self::Int64(v) => Ok(v),
            Self::Int32(v) => Ok(i64::from(v)),
            Self::Float32(v) => integral_f64(f64::from(v), target, found),
            Self::Float64(v) => integral_f64(v, target, found),
            Self::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|e| Error::coercion(target, found, e.to_string())),
            other => Err(unsupported(target, &other)),
        }
    }

    fn coerce_vector(self, declared: &VectorType) -> Result<Self> {
        let Self::Vector(elements) = self else {
            return Err(Error::TypeCoercion {
                expected: declared.to_string(),
                found: self.kind_name().to_string(),
                message: "expected a vector".into(),
            });
        };
        if elements.len() != declared.dimension as usize {
            return Err(Error::TypeCoercion {
                expected: declared.to_string(),
                found: format!("vector<{}>", elements.len()),
                message: format!(
                    "dimension mismatch: expected {}, got {}",
                    declared.dimension,
                    elements.len()
                ),
            });
        }
        Ok(Self::Vector(elements))
    }

    /// Converts the value into its JSON representation.
    ///
    /// Datetimes are encoded as RFC 3339 strings and non-finite floats as
    /// `"NaN"`, `"inf"` or `"-inf"`; the declared type is needed to decode
    /// them again with [`Value::from_json`].
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Int(v) | Self::Int64(v) => serde_json::Value::from(*v),
            Self::Int32(v) => serde_json::Value::from(*v),
            Self::Float32(v) => f32_json(*v),
            Self::Float64(v) if v.is_finite() => serde_json::Value::from(*v),
            Self::Float64(v) => non_finite_json(*v),
            Self::String(s) => serde_json::Value::from(s.as_str()),
            Self::Bool(b) => serde_json::Value::from(*b),
            Self::Datetime(ts) => serde_json::Value::from(ts.to_rfc3339()),
            Self::Vector(elements) => {
                serde_json::Value::Array(elements.iter().copied().map(f32_json).collect())
            }
        }
    }

    /// Decodes a JSON value into the declared type.
    ///
    /// This is the path used when a backend stores values in a generic
    /// representation: a JSON number `1` read from an `int64` table decodes
    /// to `Value::Int64(1)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeCoercion`] if the JSON value cannot be coerced
    /// into the declared type.
    pub fn from_json(json: &serde_json::Value, declared: &ValueType) -> Result<Self> {
        let natural = match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float64(f)
                } else {
                    return Err(Error::TypeCoercion {
                        expected: declared.to_string(),
                        found: "number".into(),
                        message: format!("{n} is not representable"),
                    });
                }
            }
            serde_json::Value::String(s) => Self::String(s.clone()),
            #[allow(clippy::cast_possible_truncation)]
            serde_json::Value::Array(items) => {
                let elements = items
                    .iter()
                    .map(|item| {
                        item.as_f64().map(|f| f as f32).or_else(|| {
                            item.as_str()
                                .and_then(|s| s.parse::<f32>().ok())
                                .filter(|f| !f.is_finite())
                        })
                    })
                    .collect::<Option<Vec<f32>>>()
                    .ok_or_else(|| Error::TypeCoercion {
                        expected: declared.to_string(),
                        found: "array".into(),
                        message: "vector elements must be numbers".into(),
                    })?;
                Self::Vector(elements)
            }
            serde_json::Value::Object(_) => {
                return Err(Error::TypeCoercion {
                    expected: declared.to_string(),
                    found: "object".into(),
                    message: "objects are not feature values".into(),
                });
            }
        };
        natural.coerce(declared)
    }
}

fn f32_json(v: f32) -> serde_json::Value {
    if v.is_finite() {
        serde_json::Value::from(v)
    } else {
        non_finite_json(f64::from(v))
    }
}

fn non_finite_json(v: f64) -> serde_json::Value {
    let tag = if v.is_nan() {
        "NaN"
    } else if v.is_sign_positive() {
        "inf"
    } else {
        "-inf"
    };
    serde_json::Value::from(tag)
}

fn integral_f64(v: f64, target: ScalarType, found: &str) -> Result<i64> {
    #[allow(clippy::cast_precision_loss)]
    let in_range = v >= i64::MIN as f64 && v < i64::MAX as f64;
    if v.fract() != 0.0 || !in_range {
        return Err(Error::coercion(
            target,
            found,
            format!("{v} is not an integral value"),
        ));
    }
    #[allow(clippy::cast_possible_truncation)]
    Ok(v as i64)
}

fn unsupported(target: ScalarType, value: &Value) -> Error {
    Error::coercion(target, value.kind_name(), "unsupported conversion")
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Self::Vector(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Datetime(v)
    }
}
