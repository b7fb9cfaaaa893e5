//! Type/shape descriptors and the tensor materializer.

mod decode;
mod error;
mod format;

use std::fmt;
use std::str::FromStr;

use serde_json::Value as JsonValue;

pub use decode::{decode, PREVIEW_BUDGET, UNBOUNDED_BUDGET};
pub use error::TensorError;
pub use format::stringify;

/// Largest number of dimensions a tensor may have, as in numpy.
pub const MAX_DIMENSIONS: usize = 64;

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int32,
    Int64,
    Float32,
    Float64,
    UInt32,
    UInt64,
    /// Opaque record of the given width in bits.
    Void(usize),
}

impl DataType {
    /// Width of one element in bytes.
    pub fn itemsize(self) -> usize {
        match self {
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => 8,
            DataType::Void(bits) => bits / 8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int32 => f.write_str("int32"),
            DataType::Int64 => f.write_str("int64"),
            DataType::Float32 => f.write_str("float32"),
            DataType::Float64 => f.write_str("float64"),
            DataType::UInt32 => f.write_str("uint32"),
            DataType::UInt64 => f.write_str("uint64"),
            DataType::Void(bits) => write!(f, "void{bits}"),
        }
    }
}

impl FromStr for DataType {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "int32" => DataType::Int32,
            "int64" => DataType::Int64,
            "float32" => DataType::Float32,
            "float64" => DataType::Float64,
            "uint32" => DataType::UInt32,
            "uint64" => DataType::UInt64,
            _ => s
                .strip_prefix("void")
                .and_then(|bits| bits.parse().ok())
                .map(DataType::Void)
                .ok_or_else(|| TensorError::NotImplemented(s.to_owned()))?,
        })
    }
}

/// Element type plus shape. Displays as `float32[2,3]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorType {
    pub data_type: DataType,
    pub shape: Vec<usize>,
}

impl TensorType {
    pub fn new(data_type: DataType, shape: Vec<usize>) -> Self {
        Self { data_type, shape }
    }

    /// Number of elements described by the shape.
    pub fn element_count(&self) -> Option<usize> {
        self.shape.iter().try_fold(1usize, |n, &d| n.checked_mul(d))
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.shape.iter().map(ToString::to_string).collect();
        write!(f, "{}[{}]", self.data_type, dims.join(","))
    }
}

/// Materialized tensor content: nested arrays of typed scalars.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorValue {
    Array(Vec<TensorValue>),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    /// Stands for the remaining entries of a level cut off by the budget.
    Truncated,
}

impl TensorValue {
    pub fn as_array(&self) -> Option<&[TensorValue]> {
        match self {
            TensorValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// JSON rendering; truncation markers become `"..."`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            TensorValue::Array(items) => {
                JsonValue::Array(items.iter().map(TensorValue::to_json).collect())
            }
            TensorValue::Int32(v) => JsonValue::from(*v),
            TensorValue::Int64(v) => JsonValue::from(*v),
            TensorValue::UInt32(v) => JsonValue::from(*v),
            TensorValue::UInt64(v) => JsonValue::from(*v),
            TensorValue::Float32(v) => JsonValue::from(f64::from(*v)),
            TensorValue::Float64(v) => JsonValue::from(*v),
            TensorValue::Truncated => JsonValue::String("...".to_owned()),
        }
    }
}

impl fmt::Display for TensorValue {
    /// Scalars only; arrays render through [`stringify`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorValue::Int32(v) => write!(f, "{v}"),
            TensorValue::Int64(v) => write!(f, "{v}"),
            TensorValue::UInt32(v) => write!(f, "{v}"),
            TensorValue::UInt64(v) => write!(f, "{v}"),
            TensorValue::Float32(v) => write!(f, "{v}"),
            TensorValue::Float64(v) => write!(f, "{v}"),
            TensorValue::Truncated => f.write_str("..."),
            TensorValue::Array(_) => f.write_str(&stringify(self, "", "    ")),
        }
    }
}
