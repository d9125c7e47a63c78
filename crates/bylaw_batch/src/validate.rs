//! Extraction result validity checks.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Share of expected fields a result must carry to count as valid.
pub const MIN_FIELD_SHARE: f64 = 0.7;

/// Whether an extraction result has the expected shape.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResultStatus {
    /// Structured result with enough of the expected fields
    Valid,
    /// Raw model response or a result missing too many fields
    Invalid,
}

impl ResultStatus {
    /// True for [`ResultStatus::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, ResultStatus::Valid)
    }
}

/// Checks results against the fields the response schema asks for.
///
/// A result is invalid when it still carries the top-level `candidates` of a
/// raw model response, or when fewer than [`MIN_FIELD_SHARE`] of the expected
/// fields are present. With no expected fields only the first check applies.
///
/// ```
/// use bylaw_batch::{ResultStatus, ResultValidator};
/// use serde_json::json;
///
/// let validator = ResultValidator::new(["bylawNumber", "bylawYear"]);
/// assert_eq!(
///     validator.check(&json!({ "bylawNumber": "12", "bylawYear": "1990" })),
///     ResultStatus::Valid
/// );
/// assert_eq!(validator.check(&json!({ "bylawNumber": "12" })), ResultStatus::Invalid);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultValidator {
    expected: Vec<String>,
}

impl ResultValidator {
    /// Validator expecting the given top-level fields.
    pub fn new<I, S>(expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            expected: expected.into_iter().map(Into::into).collect(),
        }
    }

    /// Expected fields from a JSON schema: its `required` list, or the keys
    /// of `properties` when nothing is required.
    pub fn from_schema(schema: Option<&Value>) -> Self {
        let Some(schema) = schema else {
            return Self::default();
        };

        let required: Vec<String> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| {
                fields
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if !required.is_empty() {
            return Self { expected: required };
        }

        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            expected: properties,
        }
    }

    /// Fields a valid result should carry.
    pub fn expected(&self) -> &[String] {
        &self.expected
    }

    /// Classify a result.
    pub fn check(&self, result: &Value) -> ResultStatus {
        if result.get("candidates").is_some() {
            warn!("Response appears to be an error - found 'candidates' at top level");
            return ResultStatus::Invalid;
        }
        if self.expected.is_empty() {
            return ResultStatus::Valid;
        }

        let found = self
            .expected
            .iter()
            .filter(|field| result.get(field.as_str()).is_some())
            .count();
        let share = found as f64 / self.expected.len() as f64;
        if share < MIN_FIELD_SHARE {
            warn!(
                "Response appears to be invalid - only {:.1}% of expected fields present",
                share * 100.0
            );
            return ResultStatus::Invalid;
        }
        ResultStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_response_is_invalid_even_without_expectations() {
        let validator = ResultValidator::default();
        assert_eq!(validator.check(&json!({ "candidates": [] })), ResultStatus::Invalid);
        assert_eq!(validator.check(&json!({ "anything": 1 })), ResultStatus::Valid);
    }

    #[test]
    fn seventy_percent_is_enough() {
        let fields: Vec<String> = (0..10).map(|i| format!("f{}", i)).collect();
        let validator = ResultValidator::new(fields.clone());

        let mut result = serde_json::Map::new();
        for field in &fields[..7] {
            result.insert(field.clone(), json!(true));
        }
        assert_eq!(validator.check(&Value::Object(result.clone())), ResultStatus::Valid);

        result.remove("f6");
        assert_eq!(validator.check(&Value::Object(result)), ResultStatus::Invalid);
    }

    #[test]
    fn schema_required_list_wins_over_properties() {
        let schema = json!({
            "type": "object",
            "properties": { "a": {}, "b": {}, "c": {} },
            "required": ["a", "b"]
        });
        assert_eq!(ResultValidator::from_schema(Some(&schema)).expected(), ["a", "b"]);

        let schema = json!({ "properties": { "a": {}, "b": {} } });
        let mut expected = ResultValidator::from_schema(Some(&schema)).expected().to_vec();
        expected.sort();
        assert_eq!(expected, ["a", "b"]);

        assert!(ResultValidator::from_schema(None).expected().is_empty());
    }
}
