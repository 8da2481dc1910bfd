//! Heuristic parsing of the AI reply into named sections.
//!
//! The model's output format is not contractually guaranteed, so structure
//! is recovered by keyword matching rather than a strict schema. Parsing
//! never fails; anything that cannot be placed degrades to fixed
//! placeholder text. Callers depend only on [`parse_sections`], so a
//! schema-constrained prompt could replace the heuristics without touching
//! them.

use crate::models::AiSummary;

const NO_SUMMARY: &str = "No summary available";
const NO_CONDITION: &str = "No condition summary available";
const NO_KEY_ISSUES: &str = "See transcript for details";
const NO_TREATMENTS: &str = "No treatments recorded";
const NO_NEXT_STEPS: &str = "Follow up as recommended";
const NO_SECOND_PARAGRAPH: &str = "See full response for details";

/// Prefix length used when the reply has no paragraph break to fall back on.
const FALLBACK_SUMMARY_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Summary,
    Condition,
    KeyIssues,
    Treatments,
    NextSteps,
    ClinicalBrief,
}

/// Match a line against the section header cues.
///
/// The check order is load-bearing: a `key clinical` line lands in key
/// issues even though it also satisfies the clinical-brief cue, and
/// `next`/`expect`/`follow` wins over a simultaneous clinical-brief match.
fn match_header(line: &str) -> Option<Section> {
    let lower = line.to_lowercase();
    if lower.contains("brief summary") {
        Some(Section::Summary)
    } else if lower.contains("current patient condition") {
        Some(Section::Condition)
    } else if lower.contains("key") && (lower.contains("issue") || lower.contains("clinical")) {
        Some(Section::KeyIssues)
    } else if lower.contains("treatments") || lower.contains("medications") {
        Some(Section::Treatments)
    } else if lower.contains("next") || lower.contains("expect") || lower.contains("follow") {
        Some(Section::NextSteps)
    } else if lower.contains("clinical") && lower.contains("brief") {
        Some(Section::ClinicalBrief)
    } else {
        None
    }
}

/// Strip one leading bullet marker and surrounding whitespace.
fn strip_bullet(line: &str) -> &str {
    let trimmed = line.trim();
    let stripped = trimmed
        .strip_prefix('-')
        .or_else(|| trimmed.strip_prefix('•'))
        .or_else(|| trimmed.strip_prefix('*'))
        .unwrap_or(trimmed);
    stripped.trim()
}

/// Carve the free-text reply into the summary fields.
pub fn parse_sections(raw: &str) -> AiSummary {
    let mut summary = String::new();
    let mut condition = String::new();
    let mut key_issues: Vec<String> = Vec::new();
    let mut treatments: Vec<String> = Vec::new();
    let mut next_steps: Vec<String> = Vec::new();
    let mut clinical_brief = String::new();

    let mut current: Option<Section> = None;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // Bullet lines are always content: cues like `follow` appear
        // routinely inside list items.
        let is_bullet =
            line.starts_with('-') || line.starts_with('•') || line.starts_with('*');
        if !is_bullet {
            if let Some(section) = match_header(line) {
                current = Some(section);
                continue;
            }
        }

        let content = strip_bullet(line);
        if content.is_empty() {
            continue;
        }

        match current {
            Some(Section::Summary) => {
                summary.push_str(content);
                summary.push(' ');
            }
            Some(Section::Condition) => {
                condition.push_str(content);
                condition.push(' ');
            }
            Some(Section::KeyIssues) => key_issues.push(content.to_string()),
            Some(Section::Treatments) => treatments.push(content.to_string()),
            Some(Section::NextSteps) => next_steps.push(content.to_string()),
            Some(Section::ClinicalBrief) => {
                clinical_brief.push_str(content);
                clinical_brief.push(' ');
            }
            None => {}
        }
    }

    let mut summary = summary.trim().to_string();
    let mut condition = condition.trim().to_string();
    let clinical_brief = clinical_brief.trim().to_string();

    // No recognizable header anywhere: the first two paragraphs stand in
    // for summary and condition.
    if current.is_none() && summary.is_empty() && condition.is_empty() {
        let mut paragraphs = raw.split("\n\n").map(str::trim).filter(|p| !p.is_empty());
        summary = paragraphs
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| raw.chars().take(FALLBACK_SUMMARY_CHARS).collect());
        condition = paragraphs
            .next()
            .map(str::to_string)
            .unwrap_or_else(|| NO_SECOND_PARAGRAPH.to_string());
    }

    let summary = if summary.is_empty() {
        NO_SUMMARY.to_string()
    } else {
        summary
    };
    let condition = if condition.is_empty() {
        NO_CONDITION.to_string()
    } else {
        condition
    };
    let clinical_brief = if clinical_brief.is_empty() {
        summary.clone()
    } else {
        clinical_brief
    };
    if key_issues.is_empty() {
        key_issues.push(NO_KEY_ISSUES.to_string());
    }
    if treatments.is_empty() {
        treatments.push(NO_TREATMENTS.to_string());
    }
    if next_steps.is_empty() {
        next_steps.push(NO_NEXT_STEPS.to_string());
    }

    AiSummary {
        summary,
        condition,
        key_issues,
        treatments,
        next_steps,
        clinical_brief,
    }
}
