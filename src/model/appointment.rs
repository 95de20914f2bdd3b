use serde::{Deserialize, Serialize};

use crate::model::ObjectId;

/// A point of interest inside an appointment's recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribedTimestamp {
    #[serde(default, alias = "ID", alias = "Id")]
    pub id: i64,
    #[serde(default, alias = "Description")]
    pub description: String,
    /// Offset into the recording, in seconds.
    #[serde(default, alias = "Timestamp")]
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub doctor: String,
    #[serde(default)]
    pub location: String,
    /// RFC 3339 date-time, kept as the client sent it.
    #[serde(rename = "RC3339date", default)]
    pub date: String,
    #[serde(rename = "describedTimestamps", default)]
    pub described_timestamps: Vec<DescribedTimestamp>,
    #[serde(rename = "questionIDs", default)]
    pub question_ids: Vec<ObjectId>,
}

/// Fields of an appointment that a partial update may set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentPatch {
    pub doctor: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
    pub described_timestamps: Option<Vec<DescribedTimestamp>>,
    pub question_ids: Option<Vec<ObjectId>>,
}
