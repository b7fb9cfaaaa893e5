//! Budget-limited materialization of raw tensor payloads.

use sklearn_pickle_buffers::{BufferError, Reader};

use super::{DataType, TensorError, TensorType, TensorValue, MAX_DIMENSIONS};

/// Element budget for display previews.
pub const PREVIEW_BUDGET: usize = 10_000;
/// Element budget for full value access.
pub const UNBOUNDED_BUDGET: usize = usize::MAX;

struct DecodeContext<'a> {
    reader: Reader<'a>,
    data_type: DataType,
    shape: &'a [usize],
    count: usize,
    budget: usize,
}

impl DecodeContext<'_> {
    fn exhausted(&self) -> bool {
        self.count >= self.budget
    }

    fn element(&mut self) -> Result<TensorValue, TensorError> {
        let reader = &mut self.reader;
        let value = match self.data_type {
            DataType::Float32 => reader.f32_le().map(TensorValue::Float32),
            DataType::Float64 => reader.f64_le().map(TensorValue::Float64),
            DataType::Int32 => reader.i32_le().map(TensorValue::Int32),
            DataType::UInt32 => reader.u32_le().map(TensorValue::UInt32),
            DataType::Int64 => reader.i64_le().map(TensorValue::Int64),
            DataType::UInt64 => reader.u64_le().map(TensorValue::UInt64),
            DataType::Void(_) => return Err(TensorError::NotImplemented(self.data_type.to_string())),
        }
        .map_err(|err| TensorError::DataTooShort {
            expected: err_offset(&err),
            actual: reader.position() + reader.size(),
        })?;
        self.count += 1;
        Ok(value)
    }

    fn dimension(&mut self, dimension: usize) -> Result<TensorValue, TensorError> {
        let size = self.shape[dimension];
        let innermost = dimension + 1 == self.shape.len();
        let mut results = Vec::new();
        for _ in 0..size {
            if self.exhausted() {
                results.push(TensorValue::Truncated);
                break;
            }
            let item = if innermost {
                self.element()?
            } else {
                self.dimension(dimension + 1)?
            };
            results.push(item);
        }
        Ok(TensorValue::Array(results))
    }
}

/// Decodes `data` as a little-endian tensor of `tensor_type`, producing at
/// most `budget` elements.
///
/// Once the budget is reached, the current level gets a single
/// [`TensorValue::Truncated`] marker and every enclosing level stops at its
/// next entry. Decoding is pure: the same inputs always produce the same
/// structure, and a larger budget only replaces markers with values.
///
/// The budget is a hard maximum: a level stops as soon as `budget`
/// elements have been produced, so a preview never shows more than
/// [`PREVIEW_BUDGET`] values. Shapes with more than
/// [`MAX_DIMENSIONS`](super::MAX_DIMENSIONS) dimensions are rejected before
/// any element is read.
///
/// ```
/// use sklearn_pickle::tensor::{decode, DataType, TensorType, TensorValue};
///
/// let data: Vec<u8> = [1i32, 2, 3].iter().flat_map(|v| v.to_le_bytes()).collect();
/// let tt = TensorType::new(DataType::Int32, vec![3]);
/// let value = decode(&tt, &data, 2).unwrap();
/// assert_eq!(
///     value,
///     TensorValue::Array(vec![
///         TensorValue::Int32(1),
///         TensorValue::Int32(2),
///         TensorValue::Truncated,
///     ])
/// );
/// ```
pub fn decode(
    tensor_type: &TensorType,
    data: &[u8],
    budget: usize,
) -> Result<TensorValue, TensorError> {
    if tensor_type.shape.len() > MAX_DIMENSIONS {
        return Err(TensorError::TooManyDimensions(tensor_type.shape.len()));
    }
    let count = tensor_type.element_count();
    if data.is_empty() && count != Some(0) {
        return Err(TensorError::EmptyData);
    }
    let data_type = tensor_type.data_type;
    if let DataType::Void(_) = data_type {
        return Err(TensorError::NotImplemented(data_type.to_string()));
    }
    let expected = count
        .and_then(|n| n.checked_mul(data_type.itemsize()))
        .unwrap_or(usize::MAX);
    if expected > data.len() {
        return Err(TensorError::DataTooShort {
            expected,
            actual: data.len(),
        });
    }

    let mut context = DecodeContext {
        reader: Reader::new(data),
        data_type,
        shape: &tensor_type.shape,
        count: 0,
        budget,
    };
    if tensor_type.shape.is_empty() {
        if context.exhausted() {
            return Ok(TensorValue::Truncated);
        }
        return context.element();
    }
    context.dimension(0)
}

fn err_offset(err: &BufferError) -> usize {
    let BufferError::UnexpectedEndOfStream { offset, needed, .. } = err;
    offset.saturating_add(*needed)
}
