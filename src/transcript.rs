//! Transcript aggregation and AI summarization pipeline.
//!
//! One request flows sign → fetch → prompt → invoke → parse; the notes and
//! session fetches run concurrently and each tolerates failure on its own,
//! so partial upstream outages still produce a usable response.

use tracing::{info, warn};

use crate::heidi::{HeidiClient, HeidiError};
use crate::models::{AiSummary, Encounter, Note, Session};
use crate::summary;

/// Stands in for an empty transcript. The prompt keeps the section present
/// either way; the downstream parser relies on that.
pub const EMPTY_TRANSCRIPT: &str = "No transcript available";

pub const NO_CONSULT_NOTE: &str = "No consult note available";
pub const EMPTY_CONSULT_NOTE: &str = "No consult note details available";

const NOTE_DELIMITER: &str = "\n\n---\n\n";
const CONVERSATION_TITLE: &str = "Patient Transcript Analysis";

const SYSTEM_PROMPT: &str = "\
You are a clinical assistant designed to summarise a patient's full longitudinal transcript.
Your goal is to extract only medically meaningful information and present it in a clear,
patient-friendly manner.

Generate:

Brief Summary: (2-3 sentences)

Current Patient Condition: plain language

Key Clinical Issues: bullet points

Treatments & Medications: simple explanation

What the Patient Should Expect Next: reassurance + clarity

Clinical Brief: a short interpretation in simple language

If applicable: red flags or follow-up recommendations (gentle, non-alarming)

Avoid medical jargon unless necessary, and always explain it.";

/// Derived strings for one session.
#[derive(Debug, Clone)]
pub struct SessionDigest {
    pub transcript: String,
    pub consult_note: String,
}

/// Full pipeline output for one session.
#[derive(Debug, Clone)]
pub struct TranscriptSummary {
    pub transcript: String,
    pub consult_note: String,
    pub ai_summary: AiSummary,
    pub raw_response: String,
}

/// Fetch notes and session metadata concurrently. A failure on either side
/// degrades that side to empty and the other side's data is kept.
pub async fn aggregate(client: &HeidiClient, session_id: &str) -> SessionDigest {
    let (notes, session) = tokio::join!(
        client.session_notes(session_id),
        client.session(session_id)
    );

    let mut notes = notes.unwrap_or_else(|e| {
        warn!("Failed to fetch session notes: {}", e);
        Vec::new()
    });
    let session = session.unwrap_or_else(|e| {
        warn!("Failed to fetch session data: {}", e);
        Session::default()
    });

    info!("Aggregated {} notes for session {}", notes.len(), session_id);

    sort_notes(&mut notes);
    SessionDigest {
        transcript: render_transcript(&notes),
        consult_note: render_consult_note(session.encounters.first()),
    }
}

/// Stable ascending sort by creation time. Notes without a parseable
/// timestamp keep their input order, ahead of dated ones.
fn sort_notes(notes: &mut [Note]) {
    notes.sort_by_key(Note::created_at_parsed);
}

fn render_transcript(notes: &[Note]) -> String {
    notes
        .iter()
        .map(|note| {
            let date = note
                .created_at_parsed()
                .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                .or_else(|| note.created_at.clone().filter(|raw| !raw.is_empty()))
                .unwrap_or_else(|| "Date unknown".to_string());
            match note.note_type.as_deref().filter(|kind| !kind.is_empty()) {
                Some(kind) => format!("{} [{}]\n{}", date, kind, note.body()),
                None => format!("{}\n{}", date, note.body()),
            }
        })
        .collect::<Vec<_>>()
        .join(NOTE_DELIMITER)
}

/// Non-empty structured fields of the first encounter, in fixed order.
fn render_consult_note(encounter: Option<&Encounter>) -> String {
    let Some(encounter) = encounter else {
        return NO_CONSULT_NOTE.to_string();
    };

    let fields = [
        ("Reason for Visit", &encounter.reason_for_visit),
        ("Diagnosis", &encounter.diagnosis),
        ("Findings", &encounter.findings),
        ("Plan", &encounter.plan),
        ("Procedures", &encounter.procedures),
        ("Note", &encounter.note),
        ("Summary", &encounter.summary),
    ];

    let parts: Vec<String> = fields
        .iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| format!("{}: {}", label, v))
        })
        .collect();

    if parts.is_empty() {
        EMPTY_CONSULT_NOTE.to_string()
    } else {
        parts.join("\n\n")
    }
}

/// Render the combined prompt. An empty transcript is replaced by a literal
/// placeholder rather than dropping the section.
pub fn build_prompt(transcript: &str, consult_note: &str) -> String {
    let transcript = if transcript.is_empty() {
        EMPTY_TRANSCRIPT
    } else {
        transcript
    };
    format!(
        "{}\n\nHere is the patient's full transcript and consult note. Please summarise:\n\
         - What happened\n\
         - The condition\n\
         - Key findings\n\
         - What the patient should expect next\n\n\
         Transcript:\n{}\n\nConsult Note:\n{}",
        SYSTEM_PROMPT, transcript, consult_note
    )
}

/// Run the full pipeline for one session.
pub async fn summarize_session(
    client: &HeidiClient,
    session_id: &str,
) -> Result<TranscriptSummary, HeidiError> {
    let digest = aggregate(client, session_id).await;
    let prompt = build_prompt(&digest.transcript, &digest.consult_note);

    let raw_response = client.ask_ai(CONVERSATION_TITLE, &prompt).await?;
    info!(
        "AI response received for session {} ({} chars)",
        session_id,
        raw_response.len()
    );

    let ai_summary = summary::parse_sections(&raw_response);
    let transcript = if digest.transcript.is_empty() {
        EMPTY_TRANSCRIPT.to_string()
    } else {
        digest.transcript
    };

    Ok(TranscriptSummary {
        transcript,
        consult_note: digest.consult_note,
        ai_summary,
        raw_response,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, created_at: &str, content: &str) -> Note {
        Note {
            id: Some(id.to_string()),
            content: Some(content.to_string()),
            note: None,
            created_at: Some(created_at.to_string()),
            note_type: None,
        }
    }

    #[test]
    fn test_sort_notes_ascending_by_created_at() {
        let mut notes = vec![
            note("b", "2024-03-02T09:00:00Z", "second"),
            note("c", "2024-03-03T09:00:00Z", "third"),
            note("a", "2024-03-01T09:00:00Z", "first"),
        ];
        sort_notes(&mut notes);
        let ids: Vec<_> = notes.iter().filter_map(|n| n.id.as_deref()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sort_is_stable_under_reordering() {
        let mut forward = vec![
            note("a", "2024-03-01T09:00:00Z", "first"),
            note("b", "2024-03-02T09:00:00Z", "second"),
        ];
        let mut reversed = vec![
            note("b", "2024-03-02T09:00:00Z", "second"),
            note("a", "2024-03-01T09:00:00Z", "first"),
        ];
        sort_notes(&mut forward);
        sort_notes(&mut reversed);
        assert_eq!(render_transcript(&forward), render_transcript(&reversed));
    }

    #[test]
    fn test_render_transcript_format() {
        let mut first = note("a", "2024-03-01T09:30:00Z", "Patient seen today.");
        first.note_type = Some("Consult".to_string());
        let second = note("b", "2024-03-02T10:00:00Z", "Follow-up call.");

        let transcript = render_transcript(&[first, second]);
        assert_eq!(
            transcript,
            "2024-03-01 09:30 [Consult]\nPatient seen today.\n\n---\n\n2024-03-02 10:00\nFollow-up call."
        );
    }

    #[test]
    fn test_render_transcript_unknown_date() {
        let mut n = note("a", "", "Body");
        n.created_at = None;
        assert_eq!(render_transcript(&[n]), "Date unknown\nBody");
    }

    #[test]
    fn test_render_transcript_empty_notes() {
        assert_eq!(render_transcript(&[]), "");
    }

    #[test]
    fn test_consult_note_fixed_field_order() {
        let encounter = Encounter {
            plan: Some("Rest and fluids".to_string()),
            diagnosis: Some("Viral URI".to_string()),
            reason_for_visit: Some("Cough".to_string()),
            ..Default::default()
        };
        assert_eq!(
            render_consult_note(Some(&encounter)),
            "Reason for Visit: Cough\n\nDiagnosis: Viral URI\n\nPlan: Rest and fluids"
        );
    }

    #[test]
    fn test_consult_note_skips_blank_fields() {
        let encounter = Encounter {
            diagnosis: Some("  ".to_string()),
            plan: Some("Review in two weeks".to_string()),
            ..Default::default()
        };
        assert_eq!(
            render_consult_note(Some(&encounter)),
            "Plan: Review in two weeks"
        );
    }

    #[test]
    fn test_consult_note_placeholders() {
        assert_eq!(render_consult_note(None), NO_CONSULT_NOTE);
        assert_eq!(
            render_consult_note(Some(&Encounter::default())),
            EMPTY_CONSULT_NOTE
        );
    }

    #[test]
    fn test_prompt_substitutes_transcript_placeholder() {
        let prompt = build_prompt("", "Plan: rest");
        assert!(prompt.contains("Transcript:\nNo transcript available"));
        assert!(prompt.contains("Consult Note:\nPlan: rest"));
    }

    #[test]
    fn test_prompt_embeds_both_sections() {
        let prompt = build_prompt("2024-03-01 09:30\nSeen today.", "Diagnosis: URI");
        assert!(prompt.contains("Transcript:\n2024-03-01 09:30\nSeen today."));
        assert!(prompt.contains("Consult Note:\nDiagnosis: URI"));
        assert!(prompt.starts_with("You are a clinical assistant"));
    }
}
