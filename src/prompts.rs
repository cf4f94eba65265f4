//! Prompt templates for LLM anchor scoring.
//!
//! Domain logic for rendering scoring prompts and parsing the strict-JSON
//! responses back into per-anchor scores. Provider-agnostic.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::framework::NormalizedFramework;

// =============================================================================
// Scoring prompt
// =============================================================================

/// Escape XML special characters to prevent prompt injection via tag breaking.
fn escape_xml_chars(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

const SCORING_SYSTEM: &str = r#"You are an expert discourse analyst. You read one document and rate how strongly it expresses each listed anchor concept, on a continuous scale from 0.0 (entirely absent) to 1.0 (dominant throughout).

Output only valid JSON: one key per anchor identifier, each value a number in [0.0, 1.0]. No prose, no markdown fences.
Example:
{"hope_anchor": 0.8, "fear_anchor": 0.15}"#;

/// Render the scoring prompt for one document against a framework's anchors.
///
/// Anchor identifiers are listed in sorted order so the same framework always
/// produces the same prompt text.
pub fn scoring_prompt(framework: &NormalizedFramework, document_text: &str) -> String {
    let mut anchor_lines = String::new();
    for id in framework.anchors.keys() {
        anchor_lines.push_str("- ");
        anchor_lines.push_str(&escape_xml_chars(id));
        anchor_lines.push('\n');
    }

    format!(
        "{SCORING_SYSTEM}\n\n\
         Framework: <framework_name>{}</framework_name>\n\
         <anchors>\n{}</anchors>\n\n\
         <document>\n{}\n</document>\n\n\
         Return a JSON object with one score per anchor.\njson:",
        escape_xml_chars(&framework.name),
        anchor_lines,
        escape_xml_chars(document_text.trim()),
    )
}

// =============================================================================
// Response parsing
// =============================================================================

#[derive(Debug, Error)]
pub enum ScoreParseError {
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response JSON is not an object")]
    NotAnObject,

    #[error("anchor `{anchor}` has a non-numeric score")]
    NonNumericScore { anchor: String },

    #[error("anchor `{anchor}` score {value} outside [0.0, 1.0]")]
    ScoreOutOfRange { anchor: String, value: f64 },
}

/// Strip a leading/trailing markdown code fence if the model wrapped its JSON
/// despite instructions.
fn strip_json_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse a scoring response into per-anchor scores.
///
/// Every value must be a number in [0.0, 1.0]; anything else is an error
/// rather than a silent clamp, since a malformed response usually means the
/// model ignored the contract entirely.
pub fn parse_scores(raw: &str) -> Result<BTreeMap<String, f64>, ScoreParseError> {
    let parsed: JsonValue = serde_json::from_str(strip_json_fence(raw))?;
    let object = parsed.as_object().ok_or(ScoreParseError::NotAnObject)?;

    let mut scores = BTreeMap::new();
    for (anchor, value) in object {
        let score = value
            .as_f64()
            .ok_or_else(|| ScoreParseError::NonNumericScore {
                anchor: anchor.clone(),
            })?;
        if !(0.0..=1.0).contains(&score) {
            return Err(ScoreParseError::ScoreOutOfRange {
                anchor: anchor.clone(),
                value: score,
            });
        }
        scores.insert(anchor.clone(), score);
    }
    Ok(scores)
}

// =============================================================================
// TESTS
// =============================================================================
