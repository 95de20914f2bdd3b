use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::error::AppError;
use crate::model::ObjectId;

/// Key under which the identifier appears in every returned document.
pub const ID_FIELD: &str = "_id";

/// A stored field/value record. The body is kept schemaless so that fields
/// added by the store or by older clients survive a read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Serialize a typed record into a document body.
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self, AppError> {
        match serde_json::to_value(record) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(AppError::ValidationFailed(format!(
                "expected an object, got {}",
                other
            ))),
            Err(e) => Err(AppError::ValidationFailed(e.to_string())),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn id(&self) -> Option<ObjectId> {
        self.0
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| ObjectId::parse_hex(s).ok())
    }

    /// Attach the identifier, putting it first when rendered.
    pub fn with_id(self, id: &ObjectId) -> Self {
        let mut map = Map::with_capacity(self.0.len() + 1);
        map.insert(ID_FIELD.to_string(), Value::String(id.to_hex()));
        for (k, v) in self.0 {
            if k != ID_FIELD {
                map.insert(k, v);
            }
        }
        Self(map)
    }

    /// The body without the identifier, as persisted.
    pub fn into_body(mut self) -> Map<String, Value> {
        self.0.remove(ID_FIELD);
        self.0
    }
}

/// Ascending sort order used by `find` with a sort field, matching jsonb.
///
/// Missing fields sort first, then null < string < number < boolean < array
/// < object. Scalars of the same kind compare naturally; arrays and objects
/// keep their stored order.
pub fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::Bool(_)) => 4,
            Some(Value::Array(_)) => 5,
            Some(Value::Object(_)) => 6,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .unwrap_or(0.0)
            .partial_cmp(&y.as_f64().unwrap_or(0.0))
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_id_places_identifier_first() {
        let id = ObjectId::parse_hex("5f1d7a3b9c2e4d6f8a0b1c2d").unwrap();
        let doc = Document::from_record(&json!({"doctor": "Dr. Who"}))
            .unwrap()
            .with_id(&id);
        let rendered = serde_json::to_string(&doc).unwrap();
        assert!(rendered.starts_with("{\"_id\":\"5f1d7a3b9c2e4d6f8a0b1c2d\""));
        assert_eq!(doc.id(), Some(id));
        assert!(!doc.into_body().contains_key(ID_FIELD));
    }

    #[test]
    fn test_from_record_rejects_non_objects() {
        assert!(Document::from_record(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_compare_field_ordering() {
        let a = json!("1995-01-01T12:00:00+00:00");
        let b = json!("2020-06-01T09:30:00+00:00");
        assert_eq!(compare_field(Some(&a), Some(&b)), Ordering::Less);
        assert_eq!(compare_field(None, Some(&a)), Ordering::Less);
        assert_eq!(
            compare_field(Some(&json!(2.5)), Some(&json!(10))),
            Ordering::Less
        );
    }

    #[test]
    fn test_mixed_kinds_follow_jsonb_order() {
        let ascending = [
            None,
            Some(json!(null)),
            Some(json!("10")),
            Some(json!(10)),
            Some(json!(false)),
            Some(json!([1])),
            Some(json!({"a": 1})),
        ];
        for pair in ascending.windows(2) {
            assert_eq!(
                compare_field(pair[0].as_ref(), pair[1].as_ref()),
                Ordering::Less,
                "{:?} should sort before {:?}",
                pair[0],
                pair[1]
            );
        }
    }
}
