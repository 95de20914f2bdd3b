use crate::error::AppError;
use crate::model::DescribedTimestamp;

/// Decode a batch of JSON-encoded described timestamps.
///
/// The first element that fails to decode aborts the whole batch; nothing
/// decoded before it is returned.
pub fn parse_timestamps<S: AsRef<str>>(encoded: &[S]) -> Result<Vec<DescribedTimestamp>, AppError> {
    let mut timestamps = Vec::with_capacity(encoded.len());
    for (index, text) in encoded.iter().enumerate() {
        let timestamp = serde_json::from_str::<DescribedTimestamp>(text.as_ref()).map_err(|e| {
            AppError::MalformedTimestamp {
                index,
                reason: e.to_string(),
            }
        })?;
        log::debug!("decoded timestamp {:?}", timestamp);
        timestamps.push(timestamp);
    }
    Ok(timestamps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_capitalized_and_lowercase_keys() {
        let parsed = parse_timestamps(&[
            r#"{"ID":1,"Description":"x","Timestamp":1.5}"#,
            r#"{"id":2,"description":"chemo schedule","timestamp":93}"#,
        ])
        .unwrap();
        assert_eq!(
            parsed,
            vec![
                DescribedTimestamp {
                    id: 1,
                    description: "x".to_string(),
                    timestamp: 1.5
                },
                DescribedTimestamp {
                    id: 2,
                    description: "chemo schedule".to_string(),
                    timestamp: 93.0
                },
            ]
        );
    }

    #[test]
    fn test_fails_at_first_bad_index_without_partial_result() {
        let result = parse_timestamps(&[r#"{"ID":1,"Description":"x","Timestamp":1.5}"#, "not-json"]);
        match result {
            Err(AppError::MalformedTimestamp { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected MalformedTimestamp, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_keys_take_zero_values() {
        let parsed = parse_timestamps(&[r#"{"Timestamp":12.25}"#]).unwrap();
        assert_eq!(parsed[0].id, 0);
        assert_eq!(parsed[0].description, "");
        assert_eq!(parsed[0].timestamp, 12.25);
    }

    #[test]
    fn test_rejects_wrong_types() {
        let err = parse_timestamps(&[r#"{"ID":"one"}"#]).unwrap_err();
        assert!(matches!(err, AppError::MalformedTimestamp { index: 0, .. }));
    }

    #[test]
    fn test_empty_batch() {
        let empty: [&str; 0] = [];
        assert!(parse_timestamps(&empty).unwrap().is_empty());
    }
}
