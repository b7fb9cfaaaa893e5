//! Entry point: recognizes scikit-learn pickles and opens them as models.

use tracing::debug;

use crate::error::{Error, PickleError};
use crate::host::{Context, DecodeOptions, Host};
use crate::metadata::MetadataStore;
use crate::model::Model;
use crate::reducers::ReducerRegistry;
use crate::unpickler::Unpickler;

const EXTENSIONS: &[&str] = &["pkl", "joblib"];

/// Opens scikit-learn models.
///
/// Clones share the metadata cache, so the metadata resource is requested
/// once no matter how many models are opened.
#[derive(Debug, Clone, Default)]
pub struct ModelFactory {
    options: DecodeOptions,
    registry: ReducerRegistry,
    metadata: MetadataStore,
}

impl ModelFactory {
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Replaces the reducer vocabulary.
    pub fn with_registry(mut self, registry: ReducerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Shares a metadata cache with other factories.
    pub fn with_metadata(mut self, metadata: MetadataStore) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// `true` for `.pkl` and `.joblib` files.
    pub fn matches(&self, context: &Context<'_>) -> bool {
        EXTENSIONS.contains(&context.extension())
    }

    /// Decodes the pickle in `context` and assembles the model.
    ///
    /// Unknown type names do not fail the load; each one is passed to
    /// [`Host::exception`] as a non-fatal error.
    pub fn open(&self, context: &Context<'_>, host: &dyn Host) -> Result<Model, Error> {
        host.require(&self.options.capability)
            .map_err(Error::CapabilityUnavailable)?;

        debug!(
            identifier = context.identifier,
            size = context.buffer.len(),
            "decoding pickle"
        );
        let mut report = |error: PickleError| host.exception(&Error::Decode(error), false);
        let root = Unpickler::new(context.buffer).load(&self.registry, &mut report)?;

        let metadata = self
            .metadata
            .get_or_load(host, &self.options.metadata_resource);
        Model::new(&root, metadata, self.options.preview_budget)
    }
}
