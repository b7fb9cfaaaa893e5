//! Loader for scikit-learn models serialized with Python's pickle protocol
//! (plain `pickle` and joblib).
//!
//! The stream is decoded by a pickle stack machine whose calls are routed
//! through a [`ReducerRegistry`] of numpy, joblib and scikit-learn
//! reconstructors. The resulting object graph is assembled into a [`Model`]
//! of one graph with one node; array fields become [`Tensor`]s whose content
//! is decoded on demand under an element budget.
//!
//! ```no_run
//! use sklearn_pickle::{Context, ModelFactory};
//! # fn host() -> Box<dyn sklearn_pickle::Host> { unimplemented!() }
//!
//! let bytes = std::fs::read("model.pkl").unwrap();
//! let context = Context::new("model.pkl", &bytes);
//! let factory = ModelFactory::default();
//! assert!(factory.matches(&context));
//! let model = factory.open(&context, host().as_ref()).unwrap();
//! for node in model.graphs()[0].nodes() {
//!     println!("{}", node.operator());
//! }
//! ```

mod error;
mod factory;
mod host;
mod value;

pub mod metadata;
pub mod model;
pub mod reducers;
pub mod tensor;
pub mod unpickler;

pub use error::{Error, PickleError};
pub use factory::ModelFactory;
pub use host::{Context, DecodeOptions, Host, HostError};
pub use metadata::{MetadataStore, OperatorMetadata};
pub use model::{Argument, Attribute, Connection, Graph, Model, Node, Tensor};
pub use reducers::{Reduced, Reducer, ReducerRegistry};
pub use unpickler::{loads, Unpickler};
pub use value::{Object, Value};
