//! Model assembly: one graph holding one node built from the root object.
//!
//! Fields of the root whose value is a reconstructed array become tensor
//! initializers; every other field becomes an attribute. Fields starting
//! with `_` are internal and skipped.

mod tensor;

use std::sync::Arc;

use crate::error::Error;
use crate::metadata::{OperatorMetadata, OperatorSchema};
use crate::reducers::Reduced;
use crate::tensor::TensorType;
use crate::value::{Object, Value};

pub use tensor::Tensor;

#[derive(Debug, Clone)]
pub struct Model {
    format: String,
    graphs: Vec<Graph>,
}

impl Model {
    /// Builds the model from a decoded root value, which must be an object.
    pub fn new(
        root: &Value,
        metadata: Arc<OperatorMetadata>,
        preview_budget: usize,
    ) -> Result<Self, Error> {
        let obj = root.as_object().ok_or_else(|| {
            Error::Model(format!("root is a {}, not an estimator", root.kind()))
        })?;
        let format = match obj.field("_sklearn_version") {
            Some(Value::Str(version)) => format!("scikit-learn {version}"),
            Some(Value::None) | None => "scikit-learn".to_owned(),
            Some(version) => format!("scikit-learn {}", Attribute::text(&version)),
        };
        Ok(Self {
            format,
            graphs: vec![Graph {
                nodes: vec![Node::new(obj, metadata, preview_budget)],
            }],
        })
    }

    /// `scikit-learn`, followed by the pickling library version when known.
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn graphs(&self) -> &[Graph] {
        &self.graphs
    }
}

#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn inputs(&self) -> Vec<Argument<'_>> {
        Vec::new()
    }

    pub fn outputs(&self) -> Vec<Argument<'_>> {
        Vec::new()
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    operator: String,
    type_name: String,
    resolved: bool,
    attributes: Vec<Attribute>,
    initializers: Vec<Tensor>,
    metadata: Arc<OperatorMetadata>,
}

impl Node {
    fn new(obj: &Object, metadata: Arc<OperatorMetadata>, preview_budget: usize) -> Self {
        let operator = obj
            .type_name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_owned();
        let mut attributes = Vec::new();
        let mut initializers = Vec::new();
        for (name, value) in obj.fields() {
            if name.starts_with('_') {
                continue;
            }
            if let Some(Reduced::Array(array)) = value.as_object().map(|field| &field.body) {
                initializers.push(Tensor::new(name, array, preview_budget));
                continue;
            }
            let visible = metadata.attribute_visible(&operator, &name, &value.to_json());
            attributes.push(Attribute {
                name,
                value,
                visible,
            });
        }
        Self {
            operator,
            type_name: obj.type_name.clone(),
            resolved: obj.is_resolved(),
            attributes,
            initializers,
            metadata,
        }
    }

    /// Last dotted segment of the type name, e.g. `SVC`.
    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// `false` when no reducer knew the root type; the node then has no
    /// attributes.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn initializers(&self) -> &[Tensor] {
        &self.initializers
    }

    /// One input per initializer, named after its field.
    pub fn inputs(&self) -> Vec<Argument<'_>> {
        self.initializers
            .iter()
            .map(|tensor| Argument {
                name: tensor.name(),
                connections: vec![Connection {
                    initializer: tensor,
                    tensor_type: tensor.tensor_type(),
                }],
            })
            .collect()
    }

    pub fn outputs(&self) -> Vec<Argument<'_>> {
        Vec::new()
    }

    pub fn documentation(&self) -> Option<OperatorSchema> {
        self.metadata.documentation(&self.operator)
    }

    pub fn category(&self) -> Option<&str> {
        self.metadata.category(&self.operator)
    }
}

#[derive(Debug, Clone)]
pub struct Argument<'a> {
    pub name: &'a str,
    pub connections: Vec<Connection<'a>>,
}

#[derive(Debug, Clone)]
pub struct Connection<'a> {
    pub initializer: &'a Tensor,
    pub tensor_type: Option<&'a TensorType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    name: String,
    value: Value,
    visible: bool,
}

impl Attribute {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// JSON text of the value; integers of any width are plain decimals.
    pub fn value_text(&self) -> String {
        Self::text(&self.value)
    }

    fn text(value: &Value) -> String {
        match value {
            Value::Int(i) => i.to_string(),
            Value::BigInt(i) => i.to_string(),
            other => other.to_json().to_string(),
        }
    }

    pub fn visible(&self) -> bool {
        self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducers::{ArrayLayout, DType, Instance, NdArray};

    fn estimator(type_name: &str, attributes: Vec<(&str, Value)>) -> Value {
        let mut instance = Instance::default();
        for (name, value) in attributes {
            instance.set(name.to_owned(), value);
        }
        Value::Object(Box::new(Object::new(type_name, Reduced::Instance(instance))))
    }

    fn array_value() -> Value {
        let array = NdArray {
            layout: ArrayLayout::Wrapper,
            subtype: Value::None,
            dtype: Some(DType::construct(vec![Value::Str("f4".into())]).unwrap()),
            shape: vec![1],
            order: Some("C".into()),
            allow_mmap: Some(false),
            version: None,
            data: 1f32.to_le_bytes()[..].into(),
        };
        Value::Object(Box::new(Object::new(
            "joblib.numpy_pickle.NumpyArrayWrapper",
            Reduced::Array(array),
        )))
    }

    fn model(root: &Value) -> Model {
        Model::new(root, Arc::default(), 10).unwrap()
    }

    #[test]
    fn fields_partition_into_attributes_and_initializers() {
        let root = estimator(
            "sklearn.svm.classes.SVC",
            vec![
                ("C", Value::Float(1.0)),
                ("support_", array_value()),
                ("_sklearn_version", Value::Str("0.20.3".into())),
                ("_gamma", Value::Float(0.5)),
            ],
        );
        let model = model(&root);
        assert_eq!(model.format(), "scikit-learn 0.20.3");
        let graph = &model.graphs()[0];
        assert!(graph.inputs().is_empty() && graph.outputs().is_empty());
        let node = &graph.nodes()[0];
        assert_eq!(node.operator(), "SVC");
        let names: Vec<_> = node.attributes().iter().map(Attribute::name).collect();
        assert_eq!(names, ["C"]);
        let inputs = node.inputs();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].name, "support_");
        assert_eq!(inputs[0].connections[0].initializer.kind(), "Array Wrapper");
        assert_eq!(
            inputs[0].connections[0].tensor_type.map(ToString::to_string),
            Some("float32[1]".to_owned())
        );
        assert!(node.outputs().is_empty());
    }

    #[test]
    fn non_object_root_is_rejected() {
        let err = Model::new(&Value::List(vec![]), Arc::default(), 10).unwrap_err();
        assert!(err.to_string().contains("root is a list"), "{err}");
    }

    #[test]
    fn attribute_text() {
        let root = estimator(
            "sklearn.naive_bayes.GaussianNB",
            vec![
                ("big", Value::BigInt(1 << 70)),
                ("priors", Value::None),
                ("classes", Value::List(vec![Value::Int(0), Value::Str("a".into())])),
            ],
        );
        let model = model(&root);
        let texts: Vec<_> = model.graphs()[0].nodes()[0]
            .attributes()
            .iter()
            .map(Attribute::value_text)
            .collect();
        assert_eq!(texts, ["1180591620717411303424", "null", "[0,\"a\"]"]);
        assert_eq!(model.format(), "scikit-learn");
    }

    #[test]
    fn unresolved_root_yields_empty_node() {
        let root = Value::Object(Box::new(Object::unresolved("sklearn.pipeline.Pipeline")));
        let model = model(&root);
        let node = &model.graphs()[0].nodes()[0];
        assert_eq!(node.operator(), "Pipeline");
        assert!(!node.is_resolved());
        assert!(node.attributes().is_empty() && node.inputs().is_empty());
        assert_eq!(node.category(), None);
    }
}
