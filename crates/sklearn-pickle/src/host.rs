//! The embedding application's side of a model load: capability checks,
//! resource requests and error reporting, plus the options that name them.

use thiserror::Error;

use crate::error::Error;
use crate::tensor::PREVIEW_BUDGET;

/// Failure reported by a [`Host`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("capability '{0}' is not available")]
    CapabilityUnavailable(String),
    #[error("resource '{0}' not found")]
    ResourceNotFound(String),
    #[error("{0}")]
    Other(String),
}

/// Services the embedding application provides to the loader.
pub trait Host {
    /// Makes the named decoding capability available.
    fn require(&self, name: &str) -> Result<(), HostError>;

    /// Reads a UTF-8 text resource shipped alongside the loader.
    fn request(&self, file: &str) -> Result<String, HostError>;

    /// Receives errors. `fatal` is `false` for diagnostics that did not stop
    /// the load.
    fn exception(&self, error: &Error, fatal: bool);
}

/// A file handed to the loader.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub identifier: &'a str,
    pub buffer: &'a [u8],
}

impl<'a> Context<'a> {
    pub fn new(identifier: &'a str, buffer: &'a [u8]) -> Self {
        Self { identifier, buffer }
    }

    /// Text after the last `.` of the identifier, case preserved.
    pub fn extension(&self) -> &'a str {
        self.identifier.rsplit('.').next().unwrap_or_default()
    }
}

/// Loader settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Element budget for [`Tensor::preview`](crate::Tensor::preview).
    pub preview_budget: usize,
    /// Resource holding the operator metadata document.
    pub metadata_resource: String,
    /// Capability requested from the host before decoding.
    pub capability: String,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            preview_budget: PREVIEW_BUDGET,
            metadata_resource: "sklearn-metadata.json".to_owned(),
            capability: "pickle".to_owned(),
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_preview_budget(mut self, budget: usize) -> Self {
        self.preview_budget = budget;
        self
    }

    pub fn with_metadata_resource(mut self, resource: impl Into<String>) -> Self {
        self.metadata_resource = resource.into();
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capability = capability.into();
        self
    }
}
