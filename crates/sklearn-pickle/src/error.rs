//! Error types for decoding and loading.

use sklearn_pickle_buffers::BufferError;
use thiserror::Error;

use crate::host::HostError;

/// Errors raised while interpreting a pickle stream and running reducers.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PickleError {
    /// Structural violation of the stack machine: underflow, unknown or
    /// unsupported opcode, bad memo reference, bad terminal stack.
    #[error("malformed stream: {0}")]
    MalformedStream(String),
    #[error("malformed stream: {0}")]
    UnexpectedEndOfStream(#[from] BufferError),
    #[error("unknown dtype '{0}'")]
    UnknownDataType(String),
    #[error("unknown numpy.dtype setstate length '{0}'")]
    MalformedDescriptorState(usize),
    #[error("malformed state for '{type_name}': {reason}")]
    MalformedState { type_name: String, reason: String },
    /// Non-fatal: reported as a diagnostic while decoding continues.
    #[error("unknown function '{0}'")]
    UnresolvedTypeName(String),
}

impl PickleError {
    pub(crate) fn malformed_state(type_name: &str, reason: impl Into<String>) -> Self {
        PickleError::MalformedState {
            type_name: type_name.to_owned(),
            reason: reason.into(),
        }
    }

    /// `true` for every variant that aborts a decode.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PickleError::UnresolvedTypeName(_))
    }
}

/// Top-level failure of [`ModelFactory::open`](crate::ModelFactory::open).
#[derive(Debug, Error)]
pub enum Error {
    /// The host could not provide the decoding capability. The host error is
    /// surfaced unchanged.
    #[error(transparent)]
    CapabilityUnavailable(HostError),
    #[error("error loading scikit-learn model: {0}")]
    Decode(#[from] PickleError),
    #[error("error loading scikit-learn model: {0}")]
    Model(String),
}
