//! `numpy.dtype` reducer.

use crate::error::PickleError;
use crate::tensor::DataType;
use crate::value::Value;

pub const DTYPE_TYPE_NAME: &str = "numpy.dtype";

/// An element-type descriptor rebuilt from `numpy.dtype(code, align, copy)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DType {
    /// Canonical name, e.g. `float32` or `void64`.
    pub name: String,
    /// Width of one element in bytes.
    pub itemsize: usize,
    pub align: Value,
    pub copy: Value,
    /// Filled in by `BUILD`.
    pub state: Option<DTypeState>,
}

/// The 8-tuple passed to `numpy.dtype.__setstate__`.
#[derive(Debug, Clone, PartialEq)]
pub struct DTypeState {
    pub version: Value,
    pub byteorder: Value,
    pub subarray: Value,
    pub names: Value,
    pub fields: Value,
    pub elsize: Value,
    pub alignment: Value,
    pub int_dtypeflags: Value,
}

/// Resolves a short array-protocol type code to `(name, itemsize)`.
///
/// ```
/// use sklearn_pickle::reducers::resolve_type_code;
///
/// assert_eq!(resolve_type_code("f4").unwrap(), ("float32".to_string(), 4));
/// assert_eq!(resolve_type_code("V16").unwrap(), ("void128".to_string(), 16));
/// assert!(resolve_type_code("O8").is_err());
/// ```
pub fn resolve_type_code(code: &str) -> Result<(String, usize), PickleError> {
    let (name, itemsize) = match code {
        "i4" => ("int32", 4),
        "i8" => ("int64", 8),
        "f4" => ("float32", 4),
        "f8" => ("float64", 8),
        _ => {
            let itemsize = code
                .strip_prefix('V')
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| PickleError::UnknownDataType(code.to_owned()))?;
            let bits = itemsize
                .checked_mul(8)
                .ok_or_else(|| PickleError::UnknownDataType(code.to_owned()))?;
            return Ok((format!("void{bits}"), itemsize));
        }
    };
    Ok((name.to_owned(), itemsize))
}

impl DType {
    pub fn construct(args: Vec<Value>) -> Result<Self, PickleError> {
        let mut args = args.into_iter();
        let code = args.next().unwrap_or(Value::None);
        let code = match &code {
            Value::Str(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            other => return Err(PickleError::UnknownDataType(format!("<{}>", other.kind()))),
        };
        let (name, itemsize) = resolve_type_code(&code)?;
        Ok(Self {
            name,
            itemsize,
            align: args.next().unwrap_or(Value::None),
            copy: args.next().unwrap_or(Value::None),
            state: None,
        })
    }

    pub fn restore(&mut self, state: Value) -> Result<(), PickleError> {
        let items = match state {
            Value::Tuple(items) | Value::List(items) => items,
            other => {
                return Err(PickleError::malformed_state(
                    DTYPE_TYPE_NAME,
                    format!("expected a tuple, found {}", other.kind()),
                ))
            }
        };
        let items: [Value; 8] = items
            .try_into()
            .map_err(|items: Vec<Value>| PickleError::MalformedDescriptorState(items.len()))?;
        let [version, byteorder, subarray, names, fields, elsize, alignment, int_dtypeflags] =
            items;
        self.state = Some(DTypeState {
            version,
            byteorder,
            subarray,
            names,
            fields,
            elsize,
            alignment,
            int_dtypeflags,
        });
        Ok(())
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.name.parse().ok()
    }

    /// `true` when the restored state declares big-endian element order.
    pub fn is_big_endian(&self) -> bool {
        self.state
            .as_ref()
            .is_some_and(|state| state.byteorder.as_str() == Some(">"))
    }

    pub(crate) fn children(&self) -> Vec<&Value> {
        let mut values = vec![&self.align, &self.copy];
        if let Some(state) = &self.state {
            values.extend([
                &state.version,
                &state.byteorder,
                &state.subarray,
                &state.names,
                &state.fields,
                &state.elsize,
                &state.alignment,
                &state.int_dtypeflags,
            ]);
        }
        values
    }

    pub fn fields(&self) -> Vec<(String, Value)> {
        let mut fields = vec![
            ("name".to_owned(), Value::Str(self.name.clone())),
            ("itemsize".to_owned(), Value::Int(self.itemsize as i64)),
            ("align".to_owned(), self.align.clone()),
            ("copy".to_owned(), self.copy.clone()),
        ];
        if let Some(state) = &self.state {
            fields.extend([
                ("version".to_owned(), state.version.clone()),
                ("byteorder".to_owned(), state.byteorder.clone()),
                ("subarray".to_owned(), state.subarray.clone()),
                ("names".to_owned(), state.names.clone()),
                ("fields".to_owned(), state.fields.clone()),
                ("elsize".to_owned(), state.elsize.clone()),
                ("alignment".to_owned(), state.alignment.clone()),
                ("int_dtypeflags".to_owned(), state.int_dtypeflags.clone()),
            ]);
        }
        fields
    }
}
