//! `sklearn.tree._tree.Tree` reducer.

use crate::error::PickleError;
use crate::value::Value;

/// The Cython tree structure shared by decision-tree estimators.
///
/// `nodes` and `values` are arrays; `nodes` uses a structured record dtype
/// that the tensor materializer reports as not implemented.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub n_features: Value,
    pub n_classes: Value,
    pub n_outputs: Value,
    pub max_depth: Value,
    pub node_count: Value,
    pub nodes: Value,
    pub values: Value,
}

impl Tree {
    /// `Tree(n_features, n_classes, n_outputs)`.
    pub fn construct(args: Vec<Value>) -> Self {
        let mut args = args.into_iter();
        Self {
            n_features: args.next().unwrap_or(Value::None),
            n_classes: args.next().unwrap_or(Value::None),
            n_outputs: args.next().unwrap_or(Value::None),
            max_depth: Value::None,
            node_count: Value::None,
            nodes: Value::None,
            values: Value::None,
        }
    }

    pub fn restore(&mut self, type_name: &str, state: Value) -> Result<(), PickleError> {
        if !matches!(state, Value::Dict(_)) {
            return Err(PickleError::malformed_state(
                type_name,
                format!("expected a dict, found {}", state.kind()),
            ));
        }
        let field = |name: &str| state.get(name).cloned().unwrap_or(Value::None);
        self.max_depth = field("max_depth");
        self.node_count = field("node_count");
        self.nodes = field("nodes");
        self.values = field("values");
        Ok(())
    }

    pub fn fields(&self) -> Vec<(String, Value)> {
        [
            ("n_features", &self.n_features),
            ("n_classes", &self.n_classes),
            ("n_outputs", &self.n_outputs),
            ("max_depth", &self.max_depth),
            ("node_count", &self.node_count),
            ("nodes", &self.nodes),
            ("values", &self.values),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value.clone()))
        .collect()
    }
}
