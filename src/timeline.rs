//! Patient timeline assembled from the Heidi session collections.
//!
//! Five collections are fetched concurrently; each failure degrades to an
//! empty list so one missing collection never empties the whole feed.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::heidi::{HeidiClient, HeidiError};
use crate::models::{
    parse_timestamp, Collection, EventKind, RawAppointment, RawEncounterEvent, RawMedication,
    RawNoteEvent, RawTreatment, TimelineEvent,
};

/// Fetch all session collections and merge them into one feed, newest
/// first.
pub async fn build_timeline(client: &HeidiClient) -> Vec<TimelineEvent> {
    let (appointments, encounters, medications, treatments, notes) = tokio::join!(
        client.session_collection::<RawAppointment>("appointments"),
        client.session_collection::<RawEncounterEvent>("encounters"),
        client.session_collection::<RawMedication>("medications"),
        client.session_collection::<RawTreatment>("treatments"),
        client.session_collection::<RawNoteEvent>("notes"),
    );

    let mut events = Vec::new();
    events.extend(
        collection_or_empty(appointments, "appointments")
            .data
            .into_iter()
            .map(appointment_event),
    );
    events.extend(
        collection_or_empty(encounters, "encounters")
            .data
            .into_iter()
            .map(encounter_event),
    );
    events.extend(
        collection_or_empty(medications, "medications")
            .data
            .into_iter()
            .map(medication_event),
    );
    events.extend(
        collection_or_empty(treatments, "treatments")
            .data
            .into_iter()
            .map(treatment_event),
    );
    events.extend(
        collection_or_empty(notes, "notes")
            .data
            .into_iter()
            .map(note_event),
    );

    sort_events(&mut events);
    info!("Timeline assembled with {} events", events.len());
    events
}

fn collection_or_empty<T>(
    result: Result<Collection<T>, HeidiError>,
    name: &str,
) -> Collection<T> {
    result.unwrap_or_else(|e| {
        warn!("Failed to fetch /sessions/{}: {}", name, e);
        Collection::default()
    })
}

fn fallback_id(id: Option<String>) -> String {
    id.unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn fallback_date(date: Option<String>) -> String {
    date.unwrap_or_else(|| Utc::now().to_rfc3339())
}

fn appointment_event(raw: RawAppointment) -> TimelineEvent {
    TimelineEvent {
        id: fallback_id(raw.id),
        kind: EventKind::Appointment,
        title: raw
            .title
            .unwrap_or_else(|| "Medical Appointment".to_string()),
        date: fallback_date(raw.date),
        time: raw.time,
        description: raw.description,
        provider: raw.provider,
        status: Some(raw.status.unwrap_or_else(|| "scheduled".to_string())),
        details: raw.notes,
    }
}

fn encounter_event(raw: RawEncounterEvent) -> TimelineEvent {
    TimelineEvent {
        id: fallback_id(raw.id),
        kind: EventKind::Encounter,
        title: raw.kind.unwrap_or_else(|| "Medical Encounter".to_string()),
        date: fallback_date(raw.date),
        time: raw.time,
        description: raw.summary,
        provider: raw.provider,
        status: Some("completed".to_string()),
        details: raw.details,
    }
}

fn medication_event(raw: RawMedication) -> TimelineEvent {
    let description = raw.description.or_else(|| {
        match (raw.dosage.as_deref(), raw.frequency.as_deref()) {
            (None, None) => None,
            (dosage, frequency) => Some(format!(
                "{} - {}",
                dosage.unwrap_or_default(),
                frequency.unwrap_or_default()
            )),
        }
    });

    TimelineEvent {
        id: fallback_id(raw.id),
        kind: EventKind::Medication,
        title: format!("Started {}", raw.name.as_deref().unwrap_or("medication")),
        date: fallback_date(raw.start_date),
        time: raw.time,
        description,
        provider: raw.prescriber,
        status: Some(raw.status.unwrap_or_else(|| "ongoing".to_string())),
        details: raw.instructions,
    }
}

fn treatment_event(raw: RawTreatment) -> TimelineEvent {
    TimelineEvent {
        id: fallback_id(raw.id),
        kind: EventKind::Treatment,
        title: raw.name.unwrap_or_else(|| "Treatment Session".to_string()),
        date: fallback_date(raw.date),
        time: raw.time,
        description: raw.description,
        provider: raw.provider,
        status: Some(raw.status.unwrap_or_else(|| "completed".to_string())),
        details: raw.notes,
    }
}

fn note_event(raw: RawNoteEvent) -> TimelineEvent {
    TimelineEvent {
        id: fallback_id(raw.id),
        kind: EventKind::Note,
        title: raw.title.unwrap_or_else(|| "Clinical Note".to_string()),
        date: fallback_date(raw.date),
        time: None,
        description: raw.summary,
        provider: raw.author,
        status: Some("completed".to_string()),
        details: raw.content,
    }
}

/// Newest first; undated entries sink to the end.
fn sort_events(events: &mut [TimelineEvent]) {
    events.sort_by(|a, b| parse_timestamp(&b.date).cmp(&parse_timestamp(&a.date)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appointment_defaults() {
        let event = appointment_event(RawAppointment::default());
        assert!(!event.id.is_empty());
        assert_eq!(event.kind, EventKind::Appointment);
        assert_eq!(event.title, "Medical Appointment");
        assert_eq!(event.status.as_deref(), Some("scheduled"));
        assert!(parse_timestamp(&event.date).is_some());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = appointment_event(RawAppointment::default());
        let b = appointment_event(RawAppointment::default());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_medication_title_and_description() {
        let raw = RawMedication {
            name: Some("Lisinopril".to_string()),
            dosage: Some("10mg".to_string()),
            frequency: Some("daily".to_string()),
            ..Default::default()
        };
        let event = medication_event(raw);
        assert_eq!(event.title, "Started Lisinopril");
        assert_eq!(event.description.as_deref(), Some("10mg - daily"));
        assert_eq!(event.status.as_deref(), Some("ongoing"));
    }

    #[test]
    fn test_medication_explicit_description_wins() {
        let raw = RawMedication {
            name: Some("Lisinopril".to_string()),
            description: Some("Blood pressure medication".to_string()),
            dosage: Some("10mg".to_string()),
            ..Default::default()
        };
        let event = medication_event(raw);
        assert_eq!(
            event.description.as_deref(),
            Some("Blood pressure medication")
        );
    }

    #[test]
    fn test_encounter_and_treatment_defaults() {
        let encounter = encounter_event(RawEncounterEvent::default());
        assert_eq!(encounter.title, "Medical Encounter");
        assert_eq!(encounter.status.as_deref(), Some("completed"));

        let treatment = treatment_event(RawTreatment::default());
        assert_eq!(treatment.title, "Treatment Session");
        assert_eq!(treatment.status.as_deref(), Some("completed"));
    }

    #[test]
    fn test_note_event_mapping() {
        let raw = RawNoteEvent {
            id: Some("n1".to_string()),
            title: Some("Discharge note".to_string()),
            date: Some("2024-03-01".to_string()),
            summary: Some("Going home".to_string()),
            author: Some("Dr. Chen".to_string()),
            content: Some("Full note body".to_string()),
        };
        let event = note_event(raw);
        assert_eq!(event.id, "n1");
        assert_eq!(event.kind, EventKind::Note);
        assert_eq!(event.provider.as_deref(), Some("Dr. Chen"));
        assert_eq!(event.details.as_deref(), Some("Full note body"));
    }

    #[test]
    fn test_sort_newest_first() {
        let mut events = vec![
            note_event(RawNoteEvent {
                id: Some("old".to_string()),
                date: Some("2024-01-01".to_string()),
                ..Default::default()
            }),
            note_event(RawNoteEvent {
                id: Some("new".to_string()),
                date: Some("2024-03-01".to_string()),
                ..Default::default()
            }),
            note_event(RawNoteEvent {
                id: Some("mid".to_string()),
                date: Some("2024-02-01".to_string()),
                ..Default::default()
            }),
        ];
        sort_events(&mut events);
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }
}
