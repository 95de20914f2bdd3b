use serde::{Deserialize, Serialize};

use crate::model::ObjectId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "questionString", default)]
    pub question_string: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pin: bool,
    #[serde(rename = "appointmentIDs", default)]
    pub appointment_ids: Vec<ObjectId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuestionPatch {
    pub question_string: Option<String>,
    pub description: Option<String>,
    pub pin: Option<bool>,
    pub appointment_ids: Option<Vec<ObjectId>>,
}
