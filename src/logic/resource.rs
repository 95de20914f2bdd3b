use crate::error::AppError;
use crate::model::{Appointment, AppointmentPatch, Document, FormFields, ObjectId, Question, QuestionPatch};

use super::merge::{date_value, flag_value, keys, MergePatch};
use super::timestamps::parse_timestamps;

/// A document collection exposed over HTTP.
pub trait Resource: Send + Sync + 'static {
    /// Collection name in the store.
    const COLLECTION: &'static str;
    /// Field that listings are sorted by, ascending.
    const SORT_FIELD: Option<&'static str>;

    type Patch: MergePatch;

    /// Build the record for an insert. Absent fields take empty values.
    fn from_form(form: &FormFields) -> Result<Self, AppError>
    where
        Self: Sized;

    fn to_document(&self) -> Result<Document, AppError>;
}

impl Resource for Appointment {
    const COLLECTION: &'static str = "appointments";
    const SORT_FIELD: Option<&'static str> = Some(keys::DATE);

    type Patch = AppointmentPatch;

    fn from_form(form: &FormFields) -> Result<Self, AppError> {
        let date = form.first(keys::DATE).map(date_value).transpose()?.unwrap_or_default();
        let timestamps = form.list(keys::DESCRIBED_TIMESTAMPS).unwrap_or_default();
        let question_ids = form.list(keys::QUESTION_IDS).unwrap_or_default();

        Ok(Self {
            id: None,
            doctor: form.first(keys::DOCTOR).unwrap_or_default().to_string(),
            location: form.first(keys::LOCATION).unwrap_or_default().to_string(),
            date,
            described_timestamps: parse_timestamps(&timestamps)?,
            question_ids: ObjectId::parse_list(&question_ids)?,
        })
    }

    fn to_document(&self) -> Result<Document, AppError> {
        Document::from_record(self)
    }
}

impl Resource for Question {
    const COLLECTION: &'static str = "questions";
    const SORT_FIELD: Option<&'static str> = None;

    type Patch = QuestionPatch;

    fn from_form(form: &FormFields) -> Result<Self, AppError> {
        let pin = form.first(keys::PIN).map(flag_value).transpose()?.unwrap_or_default();
        let appointment_ids = form.list(keys::APPOINTMENT_IDS).unwrap_or_default();

        Ok(Self {
            id: None,
            question_string: form.first(keys::QUESTION_STRING).unwrap_or_default().to_string(),
            description: form.first(keys::DESCRIPTION).unwrap_or_default().to_string(),
            pin,
            appointment_ids: ObjectId::parse_list(&appointment_ids)?,
        })
    }

    fn to_document(&self) -> Result<Document, AppError> {
        Document::from_record(self)
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
    fn test_question_defaults() {
        let q = Question::from_form(&form(&[("questionString", "Allergies?")])).unwrap();
        assert_eq!(q.question_string, "Allergies?");
        assert_eq!(q.description, "");
        assert!(!q.pin);
        assert!(q.appointment_ids.is_empty());

        let doc = q.to_document().unwrap();
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({"questionString": "Allergies?", "description": "", "pin": false, "appointmentIDs": []})
        );
    }

    #[test]
    fn test_appointment_from_form() {
        let a = Appointment::from_form(&form(&[
            ("doctor", "Dr. Grey"),
            ("location", "Ward 4"),
            ("RC3339date", "1995-01-01T12:00:00+00:00"),
            ("describedTimestamps", r#"{"ID":1,"Description":"intro","Timestamp":0.5}"#),
            ("questionIDs", "5F1D7A3B9C2E4D6F8A0B1C2D"),
        ]))
        .unwrap();

        let doc = a.to_document().unwrap();
        assert_eq!(doc.get("RC3339date"), Some(&json!("1995-01-01T12:00:00+00:00")));
        assert_eq!(doc.get("questionIDs"), Some(&json!(["5f1d7a3b9c2e4d6f8a0b1c2d"])));
        assert_eq!(
            doc.get("describedTimestamps"),
            Some(&json!([{"id": 1, "description": "intro", "timestamp": 0.5}]))
        );
        assert!(doc.get("_id").is_none());
    }

    #[test]
    fn test_create_rejects_bad_reference() {
        let err = Appointment::from_form(&form(&[("questionIDs", "123")])).unwrap_err();
        assert!(matches!(err, AppError::InvalidIdentifier(_)));
    }
}
