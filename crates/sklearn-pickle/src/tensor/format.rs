//! Text rendering of materialized tensors.

use super::TensorValue;

/// One element per line, nested arrays bracketed on their own lines.
///
/// Used for 64-bit integer tensors, whose values do not survive a trip
/// through JSON numbers in every consumer.
///
/// ```
/// use sklearn_pickle::tensor::{stringify, TensorValue};
///
/// let value = TensorValue::Array(vec![TensorValue::Int64(1), TensorValue::Int64(-2)]);
/// assert_eq!(stringify(&value, "", "    "), "[\n    1,\n    -2\n]");
/// ```
pub fn stringify(value: &TensorValue, indentation: &str, indent: &str) -> String {
    match value {
        TensorValue::Array(items) => {
            let nested = format!("{indentation}{indent}");
            let mut lines = vec!["[".to_owned()];
            if !items.is_empty() {
                lines.push(
                    items
                        .iter()
                        .map(|item| stringify(item, &nested, indent))
                        .collect::<Vec<_>>()
                        .join(",\n"),
                );
            }
            lines.push("]".to_owned());
            lines.join("\n")
        }
        scalar => format!("{indentation}{scalar}"),
    }
}
