//! Markdown document wire format.
//!
//! Framework and experiment documents are Markdown files carrying a fenced
//! YAML appendix. Three marker conventions are accepted:
//!
//! - a heading containing "Machine-Readable Appendix"
//!   (e.g. `## Part 2: The Machine-Readable Appendix`)
//! - the `## Configuration Appendix` heading used by experiment documents
//! - the older `--- Start of Machine-Readable Appendix ---` /
//!   `--- End of Machine-Readable Appendix ---` comment-delimited block
//!
//! This module only locates and parses the appendix; structural validation
//! lives in `framework` and `experiment`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;
use thiserror::Error;

static APPENDIX_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?mi)^#{1,6}\s.*(machine-readable appendix|configuration appendix)")
        .expect("appendix heading pattern")
});

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ms)^```(?:ya?ml)?[ \t]*\r?\n(.*?)^```").expect("fenced block pattern")
});

const BLOCK_START: &str = "--- Start of Machine-Readable Appendix ---";
const BLOCK_END: &str = "--- End of Machine-Readable Appendix ---";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("no machine-readable appendix found in document")]
    MissingAppendix,

    #[error("appendix block is empty")]
    EmptyAppendix,

    #[error("appendix is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Extract and parse the YAML appendix from a Markdown document.
pub fn extract_appendix(markdown: &str) -> Result<Value, DocumentError> {
    let body = appendix_body(markdown).ok_or(DocumentError::MissingAppendix)?;
    if body.trim().is_empty() {
        return Err(DocumentError::EmptyAppendix);
    }
    Ok(serde_yaml::from_str(&body)?)
}

/// Parse a document that is either Markdown-with-appendix or bare YAML.
///
/// CLI convenience: authors sometimes hand the appendix YAML around as its
/// own file. If no appendix marker is present and the whole input parses as
/// a YAML mapping, use it directly.
pub fn parse_document(text: &str) -> Result<Value, DocumentError> {
    match extract_appendix(text) {
        Ok(value) => Ok(value),
        Err(DocumentError::MissingAppendix) => {
            let parsed: Value = serde_yaml::from_str(text)?;
            if parsed.is_mapping() {
                Ok(parsed)
            } else {
                Err(DocumentError::MissingAppendix)
            }
        }
        Err(other) => Err(other),
    }
}

fn appendix_body(markdown: &str) -> Option<String> {
    // Older comment-delimited format takes precedence: its body is the
    // appendix whether or not it is additionally fenced.
    if let Some(start) = markdown.find(BLOCK_START) {
        let after = &markdown[start + BLOCK_START.len()..];
        let end = after.find(BLOCK_END)?;
        let body = &after[..end];
        return Some(strip_fence(body));
    }

    let heading = APPENDIX_HEADING.find(markdown)?;
    let after = &markdown[heading.end()..];
    let captures = FENCED_BLOCK.captures(after)?;
    Some(captures.get(1)?.as_str().to_string())
}

/// Remove a surrounding code fence, if any, from a delimited block body.
fn strip_fence(body: &str) -> String {
    match FENCED_BLOCK.captures(body) {
        Some(captures) => captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        None => body.to_string(),
    }
}
