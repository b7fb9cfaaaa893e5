//! Tensor value-access errors.

use thiserror::Error;

use super::MAX_DIMENSIONS;

/// Why a tensor's numeric content cannot be produced. Never aborts graph
/// construction; surfaces as the tensor's `state`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TensorError {
    #[error("Tensor has no data type.")]
    MissingDataType,
    #[error("Tensor data is empty.")]
    EmptyData,
    #[error("Tensor data is big-endian.")]
    BigEndian,
    #[error("Tensor data type '{0}' is not implemented.")]
    NotImplemented(String),
    #[error("Tensor has {0} dimensions, more than {max}.", max = MAX_DIMENSIONS)]
    TooManyDimensions(usize),
    #[error("Tensor data is too short: expected {expected} bytes, found {actual}.")]
    DataTooShort { expected: usize, actual: usize },
}
