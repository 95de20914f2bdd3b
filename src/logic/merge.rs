use serde_json::{Map, Value};

use crate::error::AppError;
use crate::model::{
    AppointmentPatch, DescribedTimestamp, FormFields, ObjectId, QuestionPatch,
};

use super::timestamps::parse_timestamps;

/// A converted value for one recognized field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    IdList(Vec<ObjectId>),
    TimestampList(Vec<DescribedTimestamp>),
}

impl FieldValue {
    pub fn to_json(&self) -> Result<Value, AppError> {
        match self {
            Self::Text(s) => Ok(Value::String(s.clone())),
            Self::Flag(b) => Ok(Value::Bool(*b)),
            Self::IdList(ids) => Ok(Value::Array(
                ids.iter().map(|id| Value::String(id.to_hex())).collect(),
            )),
            Self::TimestampList(ts) => serde_json::to_value(ts).map_err(|e| {
                AppError::ValidationFailed(format!("cannot encode described timestamps: {}", e))
            }),
        }
    }
}

/// Sparse "set these fields" instruction. Fields not listed keep their stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetInstruction {
    fields: Vec<(&'static str, FieldValue)>,
}

impl SetInstruction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field if the patch carries it.
    pub fn set_if<T>(&mut self, key: &'static str, value: Option<T>, wrap: impl FnOnce(T) -> FieldValue) {
        if let Some(v) = value {
            self.fields.push((key, wrap(v)));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[(&'static str, FieldValue)] {
        &self.fields
    }

    pub fn to_json(&self) -> Result<Map<String, Value>, AppError> {
        self.fields
            .iter()
            .map(|(k, v)| Ok((k.to_string(), v.to_json()?)))
            .collect()
    }
}

/// A per-collection patch: a fixed set of optional fields.
pub trait MergePatch: Sized + Send {
    /// Convert every present field, failing before anything touches the store.
    fn from_form(form: &FormFields) -> Result<Self, AppError>;

    fn into_instruction(self) -> SetInstruction;
}

/// Parse a boolean form value. Accepts the usual textual spellings only.
pub fn parse_flag(key: &str, text: &str) -> Result<bool, AppError> {
    match text {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(AppError::ValidationFailed(format!(
            "{} must be a boolean, got {:?}",
            key, other
        ))),
    }
}

/// Check that a date field is RFC 3339; the text is stored unchanged.
pub fn parse_date(key: &str, text: &str) -> Result<String, AppError> {
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|_| text.to_string())
        .map_err(|e| AppError::ValidationFailed(format!("{} must be an RFC 3339 date: {}", key, e)))
}

/// A date form value as stored: an empty value means no date.
pub(crate) fn date_value(text: &str) -> Result<String, AppError> {
    if text.is_empty() {
        Ok(String::new())
    } else {
        parse_date(keys::DATE, text)
    }
}

/// A `pin` form value as stored: an empty value means unpinned.
pub(crate) fn flag_value(text: &str) -> Result<bool, AppError> {
    if text.is_empty() {
        Ok(false)
    } else {
        parse_flag(keys::PIN, text)
    }
}

pub(crate) mod keys {
    pub const DOCTOR: &str = "doctor";
    pub const LOCATION: &str = "location";
    pub const DATE: &str = "RC3339date";
    pub const DESCRIBED_TIMESTAMPS: &str = "describedTimestamps";
    pub const QUESTION_IDS: &str = "questionIDs";

    pub const QUESTION_STRING: &str = "questionString";
    pub const DESCRIPTION: &str = "description";
    pub const PIN: &str = "pin";
    pub const APPOINTMENT_IDS: &str = "appointmentIDs";
}

impl MergePatch for AppointmentPatch {
    fn from_form(form: &FormFields) -> Result<Self, AppError> {
        Ok(Self {
            doctor: form.first(keys::DOCTOR).map(str::to_string),
            location: form.first(keys::LOCATION).map(str::to_string),
            date: form.first(keys::DATE).map(date_value).transpose()?,
            described_timestamps: form
                .list(keys::DESCRIBED_TIMESTAMPS)
                .map(|values| parse_timestamps(&values))
                .transpose()?,
            question_ids: form
                .list(keys::QUESTION_IDS)
                .map(|values| ObjectId::parse_list(&values))
                .transpose()?,
        })
    }

    fn into_instruction(self) -> SetInstruction {
        let mut set = SetInstruction::new();
        set.set_if(keys::DOCTOR, self.doctor, FieldValue::Text);
        set.set_if(keys::LOCATION, self.location, FieldValue::Text);
        set.set_if(keys::DATE, self.date, FieldValue::Text);
        set.set_if(keys::DESCRIBED_TIMESTAMPS, self.described_timestamps, FieldValue::TimestampList);
        set.set_if(keys::QUESTION_IDS, self.question_ids, FieldValue::IdList);
        set
    }
}

impl MergePatch for QuestionPatch {
    fn from_form(form: &FormFields) -> Result<Self, AppError> {
        Ok(Self {
            question_string: form.first(keys::QUESTION_STRING).map(str::to_string),
            description: form.first(keys::DESCRIPTION).map(str::to_string),
            pin: form.first(keys::PIN).map(flag_value).transpose()?,
            appointment_ids: form
                .list(keys::APPOINTMENT_IDS)
                .map(|values| ObjectId::parse_list(&values))
                .transpose()?,
        })
    }

    fn into_instruction(self) -> SetInstruction {
        let mut set = SetInstruction::new();
        set.set_if(keys::QUESTION_STRING, self.question_string, FieldValue::Text);
        set.set_if(keys::DESCRIPTION, self.description, FieldValue::Text);
        set.set_if(keys::PIN, self.pin, FieldValue::Flag);
        set.set_if(keys::APPOINTMENT_IDS, self.appointment_ids, FieldValue::IdList);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(pairs: &[(&str, &str)]) -> FormFields {
        FormFields::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn test_absent_fields_are_omitted() {
        let patch = QuestionPatch::from_form(&form(&[("pin", "true")])).unwrap();
        let set = patch.into_instruction();
        assert_eq!(set.fields(), &[("pin", FieldValue::Flag(true))]);
        assert_eq!(set.to_json().unwrap(), json!({"pin": true}).as_object().unwrap().clone());
    }

    #[test]
    fn test_no_recognized_fields_gives_empty_instruction() {
        let set = AppointmentPatch::from_form(&form(&[("unknown", "x")]))
            .unwrap()
            .into_instruction();
        assert!(set.is_empty());
    }

    #[test]
    fn test_one_bad_field_rejects_whole_patch() {
        let result = AppointmentPatch::from_form(&form(&[
            ("doctor", "Dr. Grey"),
            ("describedTimestamps", r#"{"ID":1,"Description":"ok","Timestamp":2}"#),
            ("describedTimestamps", "{broken"),
        ]));
        assert!(matches!(result, Err(AppError::MalformedTimestamp { index: 1, .. })));

        let result = QuestionPatch::from_form(&form(&[
            ("questionString", "Side effects?"),
            ("appointmentIDs", "not-an-id"),
        ]));
        assert!(matches!(result, Err(AppError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_pin_must_be_boolean() {
        assert!(parse_flag("pin", "true").unwrap());
        assert!(!parse_flag("pin", "0").unwrap());
        assert!(matches!(parse_flag("pin", "yes"), Err(AppError::ValidationFailed(_))));
    }

    #[test]
    fn test_date_must_be_rfc3339() {
        assert!(parse_date("RC3339date", "1995-01-01T12:00:00+00:00").is_ok());
        assert!(parse_date("RC3339date", "01/01/1995").is_err());
    }

    #[test]
    fn test_full_appointment_instruction() {
        let set = AppointmentPatch::from_form(&form(&[
            ("doctor", "Dr. Grey"),
            ("location", "Ward 4"),
            ("RC3339date", "2021-03-04T10:00:00Z"),
            ("describedTimestamps", r#"{"ID":3,"Description":"dosage","Timestamp":42.5}"#),
            ("questionIDs", "5f1d7a3b9c2e4d6f8a0b1c2d"),
        ]))
        .unwrap()
        .into_instruction();

        assert_eq!(set.len(), 5);
        assert_eq!(
            serde_json::Value::Object(set.to_json().unwrap()),
            json!({
                "doctor": "Dr. Grey",
                "location": "Ward 4",
                "RC3339date": "2021-03-04T10:00:00Z",
                "describedTimestamps": [{"id": 3, "description": "dosage", "timestamp": 42.5}],
                "questionIDs": ["5f1d7a3b9c2e4d6f8a0b1c2d"],
            })
        );
    }

    #[test]
    fn test_empty_date_and_pin_reset_the_field() {
        let set = AppointmentPatch::from_form(&form(&[("RC3339date", "")]))
            .unwrap()
            .into_instruction();
        assert_eq!(set.fields(), &[("RC3339date", FieldValue::Text(String::new()))]);

        let set = QuestionPatch::from_form(&form(&[("pin", "")]))
            .unwrap()
            .into_instruction();
        assert_eq!(set.fields(), &[("pin", FieldValue::Flag(false))]);
    }

    #[test]
    fn test_empty_list_value_clears_field() {
        let set = QuestionPatch::from_form(&form(&[("appointmentIDs", "")]))
            .unwrap()
            .into_instruction();
        assert_eq!(set.fields(), &[("appointmentIDs", FieldValue::IdList(vec![]))]);
    }
}
