//! Operator metadata: per-operator schemas loaded from the host's
//! `sklearn-metadata.json` resource.
//!
//! The document is a JSON array of `{ "name": ..., "schema": { ... } }`
//! entries. Schemas drive attribute visibility, node documentation and node
//! category.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, warn};

use crate::host::Host;

/// Schema of one operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatorSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<JsonValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<JsonValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<JsonValue>,
    /// Keys this crate does not interpret, kept for documentation.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Schema of one operator attribute.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `"optional"` hides the attribute while its value is null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    /// `Some(Null)` for an explicit `"default": null`, `None` when absent.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<JsonValue>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<JsonValue>, D::Error> {
    JsonValue::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
struct Entry {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    schema: Option<OperatorSchema>,
}

/// Operator name → schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorMetadata {
    schemas: HashMap<String, OperatorSchema>,
}

impl OperatorMetadata {
    /// Parses the metadata document. Entries without a name or schema are
    /// skipped.
    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        let entries: Option<Vec<Entry>> = serde_json::from_str(data)?;
        let schemas = entries
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| Some((entry.name?, entry.schema?)))
            .collect();
        Ok(Self { schemas })
    }

    pub fn schema(&self, operator: &str) -> Option<&OperatorSchema> {
        self.schemas.get(operator)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Whether an attribute is worth showing.
    ///
    /// Hidden when the schema marks it optional and the value is null;
    /// otherwise an explicit `visible` wins; otherwise hidden when the value
    /// equals the schema default. Attributes without a schema are visible.
    pub fn attribute_visible(&self, operator: &str, attribute: &str, value: &JsonValue) -> bool {
        let Some(schema) = self
            .schema(operator)
            .and_then(|op| op.attributes.iter().find(|a| a.name == attribute))
        else {
            return true;
        };
        if schema.option.as_deref() == Some("optional") && value.is_null() {
            return false;
        }
        if let Some(visible) = schema.visible {
            return visible;
        }
        if let Some(default) = &schema.default {
            return !is_equivalent(default, value);
        }
        true
    }

    /// A copy of the operator's schema with `name` filled in.
    pub fn documentation(&self, operator: &str) -> Option<OperatorSchema> {
        let mut schema = self.schema(operator)?.clone();
        schema.name = Some(operator.to_owned());
        Some(schema)
    }

    pub fn category(&self, operator: &str) -> Option<&str> {
        self.schema(operator)?
            .category
            .as_deref()
            .filter(|category| !category.is_empty())
    }
}

/// Structural equality where numbers compare by value, so a schema default
/// of `1.0` matches an attribute value of `1`. Positive and negative zero
/// are distinct.
pub fn is_equivalent(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                return x == y;
            }
            if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                return x == y;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y && (x != 0.0 || x.is_sign_negative() == y.is_sign_negative()),
                _ => false,
            }
        }
        (JsonValue::Array(x), JsonValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| is_equivalent(x, y))
        }
        (JsonValue::Object(x), JsonValue::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, x)| y.get(key).is_some_and(|y| is_equivalent(x, y)))
        }
        _ => a == b,
    }
}

/// Lazily loaded, shared [`OperatorMetadata`].
///
/// Clones share one cache: the resource is requested from the host at most
/// once per store, and a failed load is cached as empty metadata.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    cell: Arc<OnceCell<Arc<OperatorMetadata>>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that never consults the host.
    pub fn preloaded(metadata: OperatorMetadata) -> Self {
        Self {
            cell: Arc::new(OnceCell::with_value(Arc::new(metadata))),
        }
    }

    pub fn get(&self) -> Option<Arc<OperatorMetadata>> {
        self.cell.get().cloned()
    }

    pub fn get_or_load(&self, host: &dyn Host, resource: &str) -> Arc<OperatorMetadata> {
        self.cell
            .get_or_init(|| {
                let metadata = match host.request(resource) {
                    Ok(data) => OperatorMetadata::from_json(&data).unwrap_or_else(|error| {
                        warn!(resource, %error, "invalid operator metadata");
                        OperatorMetadata::default()
                    }),
                    Err(error) => {
                        warn!(resource, %error, "operator metadata unavailable");
                        OperatorMetadata::default()
                    }
                };
                debug!(resource, operators = metadata.len(), "operator metadata loaded");
                Arc::new(metadata)
            })
            .clone()
    }
}
