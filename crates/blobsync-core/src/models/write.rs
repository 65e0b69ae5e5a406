use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::Record;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("record {index}: missing {field}")]
    MissingField { index: usize, field: &'static str },
    #[error("record {index}: {reason}")]
    Malformed { index: usize, reason: String },
    #[error("request body must be a record object or an array of records")]
    UnexpectedShape,
}

/// Outcome of a batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
}

impl UpsertSummary {
    pub fn count(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Checks the two fields every stored record must carry.
pub fn validate(index: usize, record: &Record) -> Result<(), ValidationError> {
    if record.id.is_empty() {
        return Err(ValidationError::MissingField { index, field: "id" });
    }
    if !record.has_payload() {
        return Err(ValidationError::MissingField { index, field: "encryptedData" });
    }
    Ok(())
}

/// Turns an upsert body (one record object or an array of them) into a
/// validated batch. Any bad element rejects the whole batch.
pub fn parse_batch(body: Value) -> Result<Vec<Record>, ValidationError> {
    let items = match body {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => return Err(ValidationError::UnexpectedShape),
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(ValidationError::Malformed {
                    index,
                    reason: "expected a JSON object".to_string(),
                });
            }
            let record: Record = serde_json::from_value(item)
                .map_err(|e| ValidationError::Malformed { index, reason: e.to_string() })?;
            validate(index, &record)?;
            Ok(record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_object_is_a_batch_of_one() {
        let batch = parse_batch(json!({ "id": "a1", "encryptedData": "xyz" })).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, "a1");
    }

    #[test]
    fn test_array_batch() {
        let batch = parse_batch(json!([
            { "id": "c1", "encryptedData": "one" },
            { "id": "c2", "encryptedData": "two", "version": 4 }
        ]))
        .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].version, Some(json!(4)));
    }

    #[test]
    fn test_missing_payload_names_field_and_index() {
        let err = parse_batch(json!([
            { "id": "c1", "encryptedData": "..." },
            { "id": "c2" }
        ]))
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingField { index: 1, field: "encryptedData" });
        assert_eq!(err.to_string(), "record 1: missing encryptedData");
    }

    #[test]
    fn test_missing_or_empty_id() {
        let err = parse_batch(json!({ "encryptedData": "x" })).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { index: 0, field: "id" });

        let err = parse_batch(json!({ "id": "", "encryptedData": "x" })).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { index: 0, field: "id" });
    }

    #[test]
    fn test_null_payload_is_missing() {
        let err = parse_batch(json!({ "id": "a", "encryptedData": null })).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { index: 0, field: "encryptedData" });
    }

    #[test]
    fn test_non_string_id_is_malformed() {
        let err = parse_batch(json!({ "id": 7, "encryptedData": "x" })).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed { index: 0, .. }));
    }

    #[test]
    fn test_rejects_scalars_and_nested_scalars() {
        assert_eq!(parse_batch(json!("nope")).unwrap_err(), ValidationError::UnexpectedShape);
        assert!(matches!(
            parse_batch(json!([{ "id": "a", "encryptedData": "x" }, 5])).unwrap_err(),
            ValidationError::Malformed { index: 1, .. }
        ));
    }

    #[test]
    fn test_empty_array_is_an_empty_batch() {
        assert!(parse_batch(json!([])).unwrap().is_empty());
    }
}
