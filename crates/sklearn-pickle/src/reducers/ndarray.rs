//! Array reducers: joblib's `NumpyArrayWrapper`, numpy's `_reconstruct`,
//! and the `scalar` constructor.

use std::sync::Arc;

use sklearn_pickle_buffers::Reader;
use tracing::debug;

use super::dtype::{DType, DTYPE_TYPE_NAME};
use super::Reduced;
use crate::error::PickleError;
use crate::tensor::{TensorType, MAX_DIMENSIONS};
use crate::value::{Object, Value};

/// Which pickling scheme produced the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayLayout {
    /// joblib: the payload follows the `BUILD` opcode in the raw stream.
    Wrapper,
    /// numpy: the payload is inline in the state tuple.
    Reconstruct,
}

impl ArrayLayout {
    /// Display label of the tensor kind.
    pub fn label(self) -> &'static str {
        match self {
            ArrayLayout::Wrapper => "Array Wrapper",
            ArrayLayout::Reconstruct => "Array",
        }
    }
}

/// A numeric array with its element type, shape and raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    pub layout: ArrayLayout,
    pub subtype: Value,
    pub dtype: Option<DType>,
    pub shape: Vec<usize>,
    /// `C` or `F`.
    pub order: Option<String>,
    pub allow_mmap: Option<bool>,
    pub version: Option<i64>,
    pub data: Arc<[u8]>,
}

impl NdArray {
    fn new(layout: ArrayLayout, args: Vec<Value>) -> Self {
        let mut args = args.into_iter();
        let subtype = args.next().unwrap_or(Value::None);
        let shape = args.next().and_then(|s| s.as_shape()).unwrap_or_default();
        Self {
            layout,
            subtype,
            dtype: None,
            shape,
            order: None,
            allow_mmap: None,
            version: None,
            data: Arc::from(Vec::new()),
        }
    }

    /// `NumpyArrayWrapper(subtype, shape, dtype)`; usually built without
    /// arguments through the reconstructor shim.
    pub fn wrapper(args: Vec<Value>) -> Self {
        Self::new(ArrayLayout::Wrapper, args)
    }

    /// `_reconstruct(subtype, shape, dtype)`.
    pub fn reconstruct(args: Vec<Value>) -> Self {
        Self::new(ArrayLayout::Reconstruct, args)
    }

    pub fn restore(
        &mut self,
        type_name: &str,
        state: Value,
        stream: &mut Reader<'_>,
    ) -> Result<(), PickleError> {
        match self.layout {
            ArrayLayout::Wrapper => self.restore_wrapper(type_name, state, stream),
            ArrayLayout::Reconstruct => self.restore_reconstruct(type_name, state),
        }
    }

    fn restore_wrapper(
        &mut self,
        type_name: &str,
        state: Value,
        stream: &mut Reader<'_>,
    ) -> Result<(), PickleError> {
        if !matches!(state, Value::Dict(_)) {
            return Err(PickleError::malformed_state(
                type_name,
                format!("expected a dict, found {}", state.kind()),
            ));
        }
        let dtype = expect_dtype(type_name, state.get("dtype"))?;
        let shape = expect_shape(type_name, state.get("shape"))?;
        self.subtype = state.get("subclass").cloned().unwrap_or(Value::None);
        self.order = state.get("order").and_then(Value::as_str).map(str::to_owned);
        self.allow_mmap = state.get("allow_mmap").and_then(Value::as_bool);

        let size = shape
            .iter()
            .try_fold(dtype.itemsize, |size, &dim| size.checked_mul(dim))
            .ok_or_else(|| PickleError::malformed_state(type_name, "payload size overflows"))?;

        // Newer joblib versions pad the payload to a 16-byte boundary: one
        // length byte followed by that many padding bytes.
        if state
            .get("numpy_array_alignment_bytes")
            .is_some_and(|v| !v.is_none())
        {
            let padding = stream.u8()?;
            stream.skip(padding as usize)?;
        }

        debug!(type_name, size, offset = stream.position(), "reading array payload");
        self.data = Arc::from(stream.buf(size)?);
        self.dtype = Some(dtype);
        self.shape = shape;
        Ok(())
    }

    fn restore_reconstruct(&mut self, type_name: &str, state: Value) -> Result<(), PickleError> {
        let items = match state {
            Value::Tuple(items) | Value::List(items) => items,
            other => {
                return Err(PickleError::malformed_state(
                    type_name,
                    format!("expected a tuple, found {}", other.kind()),
                ))
            }
        };
        let [version, shape, typecode, is_f_order, rawdata]: [Value; 5] =
            items.try_into().map_err(|items: Vec<Value>| {
                PickleError::malformed_state(
                    type_name,
                    format!("expected 5 state items, found {}", items.len()),
                )
            })?;
        let dtype = expect_dtype(type_name, Some(&typecode))?;
        self.shape = expect_shape(type_name, Some(&shape))?;
        self.version = version.as_i64();
        self.order = Some(if is_f_order.as_bool().unwrap_or(false) { "F" } else { "C" }.to_owned());
        self.data = rawdata.to_shared_bytes().ok_or_else(|| {
            PickleError::malformed_state(
                type_name,
                format!("raw data is a {}, not bytes", rawdata.kind()),
            )
        })?;
        self.dtype = Some(dtype);
        Ok(())
    }

    /// Descriptor for the tensor materializer, when the element type is
    /// known.
    pub fn tensor_type(&self) -> Option<TensorType> {
        let data_type = self.dtype.as_ref()?.data_type()?;
        Some(TensorType::new(data_type, self.shape.clone()))
    }

    pub fn fields(&self) -> Vec<(String, Value)> {
        let dtype = self
            .dtype
            .as_ref()
            .map(|dt| {
                Value::Object(Box::new(Object::new(
                    DTYPE_TYPE_NAME,
                    Reduced::DType(dt.clone()),
                )))
            })
            .unwrap_or(Value::None);
        let shape = Value::Tuple(self.shape.iter().map(|&d| Value::Int(d as i64)).collect());
        let order = self.order.clone().map(Value::Str).unwrap_or(Value::None);
        match self.layout {
            ArrayLayout::Wrapper => vec![
                ("subclass".to_owned(), self.subtype.clone()),
                ("dtype".to_owned(), dtype),
                ("shape".to_owned(), shape),
                ("order".to_owned(), order),
                (
                    "allow_mmap".to_owned(),
                    self.allow_mmap.map(Value::Bool).unwrap_or(Value::None),
                ),
                ("data".to_owned(), Value::Bytes(Arc::clone(&self.data))),
            ],
            ArrayLayout::Reconstruct => vec![
                ("subtype".to_owned(), self.subtype.clone()),
                ("shape".to_owned(), shape),
                (
                    "version".to_owned(),
                    self.version.map(Value::Int).unwrap_or(Value::None),
                ),
                ("typecode".to_owned(), dtype),
                (
                    "is_f_order".to_owned(),
                    Value::Bool(self.order.as_deref() == Some("F")),
                ),
                ("rawdata".to_owned(), Value::Bytes(Arc::clone(&self.data))),
            ],
        }
    }
}

/// Shapes are capped at numpy's own dimension limit.
fn expect_shape(type_name: &str, value: Option<&Value>) -> Result<Vec<usize>, PickleError> {
    let shape = value
        .and_then(Value::as_shape)
        .ok_or_else(|| PickleError::malformed_state(type_name, "shape is not a tuple of sizes"))?;
    if shape.len() > MAX_DIMENSIONS {
        return Err(PickleError::malformed_state(
            type_name,
            format!("{} dimensions exceed the limit of {MAX_DIMENSIONS}", shape.len()),
        ));
    }
    Ok(shape)
}

fn expect_dtype(type_name: &str, value: Option<&Value>) -> Result<DType, PickleError> {
    match value.and_then(Value::as_object).map(|obj| &obj.body) {
        Some(Reduced::DType(dtype)) => Ok(dtype.clone()),
        _ => Err(PickleError::malformed_state(type_name, "dtype is not a numpy.dtype")),
    }
}

/// `numpy.core.multiarray.scalar(dtype, raw)`: decodes a single element and
/// returns it as a bare value. Only 64-bit signed integers are supported.
pub fn scalar(type_name: &str, args: Vec<Value>) -> Result<Value, PickleError> {
    let dtype = expect_dtype(type_name, args.first())?;
    let raw = args.get(1).and_then(Value::as_bytes).ok_or_else(|| {
        PickleError::malformed_state(type_name, "second argument is not a byte string")
    })?;
    match dtype.name.as_str() {
        "int64" => {
            let bytes: [u8; 8] = raw
                .get(..dtype.itemsize)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| {
                    PickleError::malformed_state(
                        type_name,
                        format!("expected {} bytes, found {}", dtype.itemsize, raw.len()),
                    )
                })?;
            Ok(Value::Int(i64::from_le_bytes(bytes)))
        }
        other => Err(PickleError::UnknownDataType(other.to_owned())),
    }
}
