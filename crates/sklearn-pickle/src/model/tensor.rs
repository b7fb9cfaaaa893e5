//! Array-valued model fields and their on-demand rendering.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value as JsonValue;

use crate::reducers::NdArray;
use crate::tensor::{self, DataType, TensorError, TensorType, TensorValue, UNBOUNDED_BUDGET};

/// An array-valued field of the model, decoded on demand.
///
/// Shares its payload with the decoded array. Every call to [`value`](Self::value) or
/// [`preview`](Self::preview) decodes afresh; nothing is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    name: String,
    kind: &'static str,
    tensor_type: Option<TensorType>,
    data: Arc<[u8]>,
    big_endian: bool,
    preview_budget: usize,
}

impl Tensor {
    pub(crate) fn new(name: String, array: &NdArray, preview_budget: usize) -> Self {
        Self {
            name,
            kind: array.layout.label(),
            tensor_type: array.tensor_type(),
            data: Arc::clone(&array.data),
            big_endian: array.dtype.as_ref().is_some_and(|dt| dt.is_big_endian()),
            preview_budget,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"Array Wrapper"` for joblib arrays, `"Array"` for numpy ones.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn tensor_type(&self) -> Option<&TensorType> {
        self.tensor_type.as_ref()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn decodable(&self) -> Result<&TensorType, TensorError> {
        let tensor_type = self.tensor_type.as_ref().ok_or(TensorError::MissingDataType)?;
        if self.big_endian {
            return Err(TensorError::BigEndian);
        }
        // A zero budget validates type and payload size without decoding.
        tensor::decode(tensor_type, &self.data, 0)?;
        Ok(tensor_type)
    }

    /// Why the content cannot be decoded, if it cannot.
    pub fn state(&self) -> Option<TensorError> {
        self.decodable().err()
    }

    /// Every element.
    pub fn value(&self) -> Result<TensorValue, TensorError> {
        let tensor_type = self.decodable()?;
        tensor::decode(tensor_type, &self.data, UNBOUNDED_BUDGET)
    }

    /// Display text of the first elements. 64-bit integers are written one
    /// per line, everything else as indented JSON.
    pub fn preview(&self) -> Result<String, TensorError> {
        let tensor_type = self.decodable()?;
        let value = tensor::decode(tensor_type, &self.data, self.preview_budget)?;
        Ok(match tensor_type.data_type {
            DataType::Int64 | DataType::UInt64 => tensor::stringify(&value, "", "    "),
            _ => pretty_json(&value.to_json()),
        })
    }
}

impl fmt::Display for Tensor {
    /// The preview, or nothing when the tensor is not decodable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.preview() {
            Ok(text) => f.write_str(&text),
            Err(_) => Ok(()),
        }
    }
}

fn pretty_json(value: &JsonValue) -> String {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    if value.serialize(&mut serializer).is_err() {
        return value.to_string();
    }
    String::from_utf8(out).unwrap_or_else(|_| value.to_string())
}
