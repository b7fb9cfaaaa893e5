//! Reducer registry: type name → reconstruction function.
//!
//! Construction is two-phase. [`Reducer::construct`] builds an intermediate
//! [`Reduced`] body from the positional arguments of a `REDUCE`/`NEWOBJ`
//! call, and [`Reduced::restore`] applies the state popped by `BUILD`.

mod dtype;
mod instance;
mod ndarray;
mod tree;

use std::collections::HashMap;

use sklearn_pickle_buffers::Reader;
use tracing::debug;

pub use dtype::{resolve_type_code, DType, DTypeState, DTYPE_TYPE_NAME};
pub use instance::Instance;
pub use ndarray::{scalar, ArrayLayout, NdArray};
pub use tree::Tree;

use crate::error::PickleError;
use crate::value::Value;

/// Reconstruction strategy registered for a type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    DType,
    ArrayWrapper,
    Reconstruct,
    Tree,
    /// Estimators and other objects populated from their `__dict__`.
    Estimator,
}

impl Reducer {
    pub fn construct(self, args: Vec<Value>) -> Result<Reduced, PickleError> {
        Ok(match self {
            Reducer::DType => Reduced::DType(DType::construct(args)?),
            Reducer::ArrayWrapper => Reduced::Array(NdArray::wrapper(args)),
            Reducer::Reconstruct => Reduced::Array(NdArray::reconstruct(args)),
            Reducer::Tree => Reduced::Tree(Tree::construct(args)),
            Reducer::Estimator => Reduced::Instance(Instance::default()),
        })
    }
}

/// Body of a reconstructed [`Object`](crate::Object).
#[derive(Debug, Clone, PartialEq)]
pub enum Reduced {
    DType(DType),
    Array(NdArray),
    Tree(Tree),
    Instance(Instance),
    /// No reducer was registered for the type name.
    Unresolved,
}

impl Reduced {
    /// Applies `BUILD` state. Only array wrappers read from `stream`.
    pub fn restore(
        &mut self,
        type_name: &str,
        state: Value,
        stream: &mut Reader<'_>,
    ) -> Result<(), PickleError> {
        match self {
            Reduced::DType(dtype) => dtype.restore(state),
            Reduced::Array(array) => array.restore(type_name, state, stream),
            Reduced::Tree(tree) => tree.restore(type_name, state),
            Reduced::Instance(instance) => instance.restore(type_name, state),
            Reduced::Unresolved => {
                debug!(type_name, "ignoring state of unresolved object");
                Ok(())
            }
        }
    }

    /// Values held by the body, without copying them.
    pub(crate) fn children(&self) -> Vec<&Value> {
        match self {
            Reduced::DType(dtype) => dtype.children(),
            Reduced::Array(array) => {
                let mut values = vec![&array.subtype];
                if let Some(dtype) = &array.dtype {
                    values.extend(dtype.children());
                }
                values
            }
            Reduced::Tree(tree) => vec![
                &tree.n_features,
                &tree.n_classes,
                &tree.n_outputs,
                &tree.max_depth,
                &tree.node_count,
                &tree.nodes,
                &tree.values,
            ],
            Reduced::Instance(instance) => instance.attributes.iter().map(|(_, v)| v).collect(),
            Reduced::Unresolved => Vec::new(),
        }
    }

    pub fn fields(&self) -> Vec<(String, Value)> {
        match self {
            Reduced::DType(dtype) => dtype.fields(),
            Reduced::Array(array) => array.fields(),
            Reduced::Tree(tree) => tree.fields(),
            Reduced::Instance(instance) => instance.attributes.clone(),
            Reduced::Unresolved => Vec::new(),
        }
    }
}

const ESTIMATORS: &[&str] = &[
    "sklearn.linear_model.LogisticRegression",
    "sklearn.linear_model.logistic.LogisticRegression",
    "sklearn.linear_model._logistic.LogisticRegression",
    "sklearn.naive_bayes.GaussianNB",
    "sklearn.preprocessing.data.Binarizer",
    "sklearn.preprocessing._data.Binarizer",
    "sklearn.svm.classes.SVC",
    "sklearn.svm._classes.SVC",
    "sklearn.tree.tree.DecisionTreeClassifier",
    "sklearn.tree._classes.DecisionTreeClassifier",
    "sklearn.tree.tree.ExtraTreeClassifier",
    "sklearn.tree._classes.ExtraTreeClassifier",
    "sklearn.ensemble.forest.RandomForestClassifier",
    "sklearn.ensemble._forest.RandomForestClassifier",
    "sklearn.ensemble.forest.ExtraTreesClassifier",
    "sklearn.ensemble._forest.ExtraTreesClassifier",
    "sklearn.ensemble.weight_boosting.AdaBoostClassifier",
    "sklearn.ensemble._weight_boosting.AdaBoostClassifier",
];

/// Closed mapping from fully-qualified type name to [`Reducer`].
#[derive(Debug, Clone)]
pub struct ReducerRegistry {
    reducers: HashMap<String, Reducer>,
}

impl Default for ReducerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(DTYPE_TYPE_NAME, Reducer::DType);
        registry.register("numpy.core.multiarray._reconstruct", Reducer::Reconstruct);
        registry.register("numpy._core.multiarray._reconstruct", Reducer::Reconstruct);
        registry.register("joblib.numpy_pickle.NumpyArrayWrapper", Reducer::ArrayWrapper);
        registry.register(
            "sklearn.externals.joblib.numpy_pickle.NumpyArrayWrapper",
            Reducer::ArrayWrapper,
        );
        registry.register("sklearn.tree._tree.Tree", Reducer::Tree);
        for name in ESTIMATORS {
            registry.register(*name, Reducer::Estimator);
        }
        registry
    }
}

impl ReducerRegistry {
    /// A registry pre-populated with the numpy, joblib and scikit-learn
    /// vocabulary.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with no entries.
    pub fn empty() -> Self {
        Self {
            reducers: HashMap::new(),
        }
    }

    pub fn register(&mut self, type_name: impl Into<String>, reducer: Reducer) {
        self.reducers.insert(type_name.into(), reducer);
    }

    pub fn resolve(&self, type_name: &str) -> Option<Reducer> {
        self.reducers.get(type_name).copied()
    }
}
