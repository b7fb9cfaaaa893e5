//! Opaque model objects (estimators, transformers).

use crate::error::PickleError;
use crate::value::Value;

/// An object with no intrinsic payload. Its attributes come from the
/// generic `BUILD` protocol: a `__dict__` mapping, optionally paired with a
/// slot-state mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instance {
    pub attributes: Vec<(String, Value)>,
}

impl Instance {
    pub fn set(&mut self, name: String, value: Value) {
        match self.attributes.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn restore(&mut self, type_name: &str, state: Value) -> Result<(), PickleError> {
        match state {
            Value::None => Ok(()),
            Value::Dict(entries) => {
                for (key, value) in entries {
                    match key {
                        Value::Str(name) => self.set(name, value),
                        other => {
                            return Err(PickleError::malformed_state(
                                type_name,
                                format!("attribute name is a {}", other.kind()),
                            ))
                        }
                    }
                }
                Ok(())
            }
            Value::Tuple(items) if items.len() == 2 => {
                let [state, slots]: [Value; 2] = items.try_into().map_err(|_| {
                    PickleError::malformed_state(type_name, "expected (state, slotstate)")
                })?;
                self.restore(type_name, state)?;
                self.restore(type_name, slots)
            }
            other => Err(PickleError::malformed_state(
                type_name,
                format!("expected a dict, found {}", other.kind()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "sklearn.svm._classes.SVC";

    fn entry(key: &str, value: Value) -> (Value, Value) {
        (Value::Str(key.into()), value)
    }

    #[test]
    fn dict_state_sets_attributes_in_order() {
        let mut instance = Instance::default();
        instance
            .restore(
                NAME,
                Value::Dict(vec![entry("C", Value::Float(1.0)), entry("kernel", Value::Str("rbf".into()))]),
            )
            .unwrap();
        instance
            .restore(NAME, Value::Dict(vec![entry("C", Value::Float(2.0))]))
            .unwrap();
        assert_eq!(
            instance.attributes,
            vec![
                ("C".to_owned(), Value::Float(2.0)),
                ("kernel".to_owned(), Value::Str("rbf".into())),
            ]
        );
    }

    #[test]
    fn slot_state_is_merged() {
        let mut instance = Instance::default();
        let state = Value::Tuple(vec![
            Value::None,
            Value::Dict(vec![entry("n_jobs", Value::Int(2))]),
        ]);
        instance.restore(NAME, state).unwrap();
        assert_eq!(instance.attributes, vec![("n_jobs".to_owned(), Value::Int(2))]);
    }

    #[test]
    fn list_state_is_rejected() {
        let mut instance = Instance::default();
        let err = instance.restore(NAME, Value::List(Vec::new())).unwrap_err();
        assert!(matches!(err, PickleError::MalformedState { .. }));
    }
}
