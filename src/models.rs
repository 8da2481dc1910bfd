//! Wire types for the Heidi API and the portal's own response payloads.
//!
//! Upstream fields are `Option` across the board; the clinical API's shapes
//! are observed, not contractually guaranteed, and a missing field must not
//! fail a request.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One clinical annotation within a patient session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Note {
    pub id: Option<String>,
    pub content: Option<String>,
    /// Some deployments carry the body under `note` instead of `content`.
    pub note: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "type")]
    pub note_type: Option<String>,
}

impl Note {
    pub fn body(&self) -> &str {
        self.content
            .as_deref()
            .or(self.note.as_deref())
            .unwrap_or("")
    }

    pub fn created_at_parsed(&self) -> Option<DateTime<Utc>> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }
}

/// Notes arrive either as a bare array or wrapped in `{notes: [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum NotesPayload {
    List(Vec<Note>),
    Wrapped { notes: Vec<Note> },
    Other(serde_json::Value),
}

impl NotesPayload {
    pub fn into_notes(self) -> Vec<Note> {
        match self {
            NotesPayload::List(notes) => notes,
            NotesPayload::Wrapped { notes } => notes,
            NotesPayload::Other(_) => Vec::new(),
        }
    }
}

/// Structured clinical record attached to a session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encounter {
    pub id: Option<String>,
    pub reason_for_visit: Option<String>,
    pub diagnosis: Option<String>,
    pub findings: Option<String>,
    pub plan: Option<String>,
    pub procedures: Option<String>,
    pub note: Option<String>,
    pub summary: Option<String>,
}

/// Session metadata; only the first encounter is consumed downstream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Option<String>,
    pub patient_id: Option<String>,
    #[serde(default)]
    pub encounters: Vec<Encounter>,
}

/// Structured interpretation of the AI reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSummary {
    pub summary: String,
    pub condition: String,
    pub key_issues: Vec<String>,
    pub treatments: Vec<String>,
    pub next_steps: Vec<String>,
    pub clinical_brief: String,
}

impl AiSummary {
    /// Fixed payload used when the pipeline cannot run at all.
    pub fn unavailable() -> Self {
        Self {
            summary: "Unable to process transcript at this time".to_string(),
            condition: "Service temporarily unavailable".to_string(),
            key_issues: vec!["Please try again later".to_string()],
            treatments: vec!["Please try again later".to_string()],
            next_steps: vec!["Contact support if issue persists".to_string()],
            clinical_brief: "Service error".to_string(),
        }
    }
}

/// Payload returned by the transcript route, in both the success and the
/// degraded case.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub transcript: String,
    pub consult_note: String,
    pub ai_summary: AiSummary,
    #[serde(rename = "rawAIResponse", skip_serializing_if = "Option::is_none")]
    pub raw_ai_response: Option<String>,
}

/// Generic `{data: [...]}` wrapper used by the session collections.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Collection<T> {
    #[serde(default)]
    pub data: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAppointment {
    pub id: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub description: Option<String>,
    pub provider: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEncounterEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub summary: Option<String>,
    pub provider: Option<String>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMedication {
    pub id: Option<String>,
    pub name: Option<String>,
    pub start_date: Option<String>,
    pub time: Option<String>,
    pub description: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub prescriber: Option<String>,
    pub status: Option<String>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTreatment {
    pub id: Option<String>,
    pub name: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub description: Option<String>,
    pub provider: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNoteEvent {
    pub id: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub content: Option<String>,
}

/// Category of a timeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Appointment,
    Medication,
    Encounter,
    Treatment,
    Note,
}

/// One entry in the patient timeline, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub title: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// One patient document reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Option<String>,
    pub title: Option<String>,
    /// Passed through as-is; the upstream kind union is not guaranteed.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Document lists arrive under `documents` or `data`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum DocumentsPayload {
    Keyed { documents: Vec<Document> },
    Data { data: Vec<Document> },
    Other(serde_json::Value),
}

impl DocumentsPayload {
    pub fn into_documents(self) -> Vec<Document> {
        match self {
            DocumentsPayload::Keyed { documents } => documents,
            DocumentsPayload::Data { data } => data,
            DocumentsPayload::Other(_) => Vec::new(),
        }
    }
}

/// Patient demographics passthrough.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub date_of_birth: Option<String>,
    pub blood_type: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    pub primary_physician: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// The profile arrives bare or wrapped in `{profile: {...}}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ProfilePayload {
    Wrapped { profile: PatientProfile },
    Bare(PatientProfile),
}

impl ProfilePayload {
    pub fn into_profile(self) -> PatientProfile {
        match self {
            ProfilePayload::Wrapped { profile } => profile,
            ProfilePayload::Bare(profile) => profile,
        }
    }
}

/// Parse the loose timestamp formats the upstream API emits: RFC 3339,
/// naive datetime, or bare date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notes_payload_bare_array() {
        let payload: NotesPayload =
            serde_json::from_value(json!([{ "id": "n1", "content": "hello" }])).unwrap();
        let notes = payload.into_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].body(), "hello");
    }

    #[test]
    fn test_notes_payload_wrapped() {
        let payload: NotesPayload =
            serde_json::from_value(json!({ "notes": [{ "id": "n1", "note": "fallback body" }] }))
                .unwrap();
        let notes = payload.into_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].body(), "fallback body");
    }

    #[test]
    fn test_notes_payload_unexpected_shape_is_empty() {
        let payload: NotesPayload =
            serde_json::from_value(json!({ "unexpected": true })).unwrap();
        assert!(payload.into_notes().is_empty());
    }

    #[test]
    fn test_note_body_prefers_content() {
        let note = Note {
            content: Some("primary".to_string()),
            note: Some("secondary".to_string()),
            ..Default::default()
        };
        assert_eq!(note.body(), "primary");
    }

    #[test]
    fn test_documents_payload_both_keys() {
        let keyed: DocumentsPayload =
            serde_json::from_value(json!({ "documents": [{ "id": "d1" }] })).unwrap();
        assert_eq!(keyed.into_documents().len(), 1);

        let data: DocumentsPayload =
            serde_json::from_value(json!({ "data": [{ "id": "d2" }] })).unwrap();
        assert_eq!(data.into_documents().len(), 1);
    }

    #[test]
    fn test_profile_payload_wrapped_and_bare() {
        let wrapped: ProfilePayload =
            serde_json::from_value(json!({ "profile": { "name": "Sarah" } })).unwrap();
        assert_eq!(wrapped.into_profile().name.as_deref(), Some("Sarah"));

        let bare: ProfilePayload = serde_json::from_value(json!({ "name": "Sarah" })).unwrap();
        assert_eq!(bare.into_profile().name.as_deref(), Some("Sarah"));
    }

    #[test]
    fn test_ai_summary_serializes_camel_case() {
        let value = serde_json::to_value(AiSummary::unavailable()).unwrap();
        assert!(value.get("keyIssues").is_some());
        assert!(value.get("nextSteps").is_some());
        assert!(value.get("clinicalBrief").is_some());
    }

    #[test]
    fn test_transcript_envelope_field_names() {
        let envelope = TranscriptEnvelope {
            error: None,
            transcript: "t".to_string(),
            consult_note: "c".to_string(),
            ai_summary: AiSummary::unavailable(),
            raw_ai_response: Some("raw".to_string()),
        };
        let value = serde_json::to_value(envelope).unwrap();
        assert!(value.get("consultNote").is_some());
        assert!(value.get("aiSummary").is_some());
        assert_eq!(value["rawAIResponse"], "raw");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-03-15T10:30:00Z").is_some());
        assert!(parse_timestamp("2024-03-15T10:30:00+02:00").is_some());
        assert!(parse_timestamp("2024-03-15T10:30:00").is_some());
        assert!(parse_timestamp("2024-03-15").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn test_timeline_event_kind_serializes_lowercase() {
        let event = TimelineEvent {
            id: "e1".to_string(),
            kind: EventKind::Appointment,
            title: "Checkup".to_string(),
            date: "2024-03-15".to_string(),
            time: None,
            description: None,
            provider: None,
            status: Some("scheduled".to_string()),
            details: None,
        };
        let value = serde_json::to_value(event).unwrap();
        assert_eq!(value["type"], "appointment");
        assert!(value.get("time").is_none());
    }
}
