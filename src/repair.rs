//! Lenient JSON recovery for model-produced text.
//!
//! Responses rarely arrive as clean JSON: they come fenced in markdown,
//! wrapped in prose, decorated with comments or reasoning blocks, or with
//! small syntax slips a strict parser rejects. [`extract_json`] walks an
//! escalating ladder of strategies, from a plain parse down to synthesizing
//! a minimal document, and reports which repairs were applied. The module is
//! schema-agnostic; it produces a raw tree, not a decoded dashboard.

use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::RepairError;

/// A recovered JSON tree plus the repairs that contributed to it.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub value: Value,
    pub warnings: Vec<String>,
}

/// Drop `<think>…</think>` reasoning blocks, including multi-line ones.
pub fn strip_think_blocks(text: &str) -> String {
    Regex::new(r"(?s)<think>.*?</think>")
        .unwrap()
        .replace_all(text, "")
        .into_owned()
}

/// Remove commas that sit directly before a closing brace or bracket.
pub fn remove_trailing_commas(text: &str) -> String {
    Regex::new(r",(\s*[}\]])")
        .unwrap()
        .replace_all(text, "${1}")
        .into_owned()
}

/// Rewrite single-quoted keys and values into double-quoted form.
pub fn normalize_quotes(text: &str) -> String {
    let keys = Regex::new(r"'([^']*)':")
        .unwrap()
        .replace_all(text, "\"${1}\":");
    Regex::new(r":(\s*)'([^']*)'")
        .unwrap()
        .replace_all(&keys, ":${1}\"${2}\"")
        .into_owned()
}

/// Strip `//` comments to the end of each line.
pub fn strip_line_comments(text: &str) -> String {
    Regex::new(r"//.*")
        .unwrap()
        .replace_all(text, "")
        .into_owned()
}

/// Put double quotes around bare object keys.
pub fn quote_bare_keys(text: &str) -> String {
    Regex::new(r"([{,]\s*)(\w+)(\s*:)")
        .unwrap()
        .replace_all(text, "${1}\"${2}\"${3}")
        .into_owned()
}

fn strip_fences(text: &str) -> (String, Vec<String>) {
    let mut cleaned = text;
    let mut warnings = Vec::new();

    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
        warnings.push("Removed JSON markdown formatting".to_string());
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
        warnings.push("Removed markdown formatting".to_string());
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }

    (cleaned.trim().to_string(), warnings)
}

// Candidate slices from the first opening delimiter to every point the
// nesting depth returns to zero, longest last, then the whole span from the
// first opener to the last closer.
fn balanced_candidates(text: &str, open: char, close: char) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut depth: i64 = 0;
    let mut anchor: Option<usize> = None;

    for (i, ch) in text.char_indices() {
        if ch == open {
            if anchor.is_none() {
                anchor = Some(i);
            }
            depth += 1;
        } else if ch == close && depth > 0 {
            depth -= 1;
            if depth == 0 {
                if let Some(start) = anchor {
                    candidates.push(&text[start..i + close.len_utf8()]);
                }
            }
        }
    }

    if let (Some(first), Some(last)) = (text.find(open), text.rfind(close)) {
        if first < last {
            candidates.push(&text[first..last + close.len_utf8()]);
        }
    }

    candidates
}

// Line-oriented salvage: skip prose and comment lines, start collecting at
// the first brace, stop once the brace depth closes.
fn salvage_lines(text: &str) -> Option<String> {
    let mut collected = Vec::new();
    let mut in_json = false;
    let mut depth: i64 = 0;

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('#')
            || line.starts_with("//")
            || line.starts_with("Here")
            || line.starts_with("The")
        {
            continue;
        }
        if line.contains('{') || line.contains('[') || in_json {
            collected.push(line);
            in_json = true;
            depth += line.matches('{').count() as i64 - line.matches('}').count() as i64;
            if depth <= 0 {
                break;
            }
        }
    }

    if collected.is_empty() {
        None
    } else {
        Some(collected.join("\n"))
    }
}

/// Recover a JSON tree from free-form response text.
///
/// Strategies are tried in order and the first success wins:
///
/// 1. parse the text as-is,
/// 2. strip markdown code fences,
/// 3. apply a cumulative battery of textual fixes (trailing commas, quote
///    normalization, line comments, bare keys), parsing after each one,
/// 4. scan for a balanced object or array embedded in surrounding text,
/// 5. salvage line by line, skipping prose,
/// 6. synthesize a minimal dashboard around a recognizable `"title"`.
///
/// Each success carries the warnings naming the repairs that were applied.
pub fn extract_json(text: &str) -> Result<Extraction, RepairError> {
    let without_think = strip_think_blocks(text);
    let original = without_think.trim();
    if original.is_empty() {
        return Err(RepairError::EmptyInput);
    }

    if let Ok(value) = serde_json::from_str::<Value>(original) {
        return Ok(Extraction {
            value,
            warnings: Vec::new(),
        });
    }
    debug!("Direct parse failed, entering recovery strategies");

    let (cleaned, fence_warnings) = strip_fences(original);
    if cleaned != original {
        if let Ok(value) = serde_json::from_str::<Value>(&cleaned) {
            return Ok(Extraction {
                value,
                warnings: fence_warnings,
            });
        }
    }

    let fixes: [(fn(&str) -> String, &str); 4] = [
        (remove_trailing_commas, "Removed trailing commas"),
        (normalize_quotes, "Fixed single quotes"),
        (strip_line_comments, "Removed comments"),
        (quote_bare_keys, "Fixed unquoted keys"),
    ];
    let mut repaired = cleaned.clone();
    for (fix, note) in fixes {
        repaired = fix(&repaired);
        if let Ok(value) = serde_json::from_str::<Value>(&repaired) {
            let mut warnings = fence_warnings.clone();
            warnings.push(note.to_string());
            debug!("Recovered JSON after fix: {}", note);
            return Ok(Extraction { value, warnings });
        }
    }

    for candidate in balanced_candidates(original, '{', '}') {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            debug!("Recovered embedded JSON object ({} chars)", candidate.len());
            return Ok(Extraction {
                value,
                warnings: vec!["Recovered JSON object embedded in surrounding text".to_string()],
            });
        }
    }
    for candidate in balanced_candidates(original, '[', ']') {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            debug!("Recovered embedded JSON array ({} chars)", candidate.len());
            return Ok(Extraction {
                value,
                warnings: vec!["Recovered JSON array embedded in surrounding text".to_string()],
            });
        }
    }

    if let Some(candidate) = salvage_lines(original) {
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            return Ok(Extraction {
                value,
                warnings: vec!["Recovered JSON from line-oriented salvage".to_string()],
            });
        }
    }

    let title_re = Regex::new(r#""title":\s*"([^"]*)""#).unwrap();
    if let Some(caps) = title_re.captures(original) {
        let title = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        warn!(
            "All parse strategies failed, synthesizing minimal dashboard '{}'",
            title
        );
        let value = json!({
            "title": title,
            "panels": [],
            "time": {"from": "now-1h", "to": "now"},
            "refresh": "5s",
            "tags": [],
            "templating": {"list": []},
            "annotations": {"list": []},
            "schemaVersion": 1,
            "version": 1
        });
        return Ok(Extraction {
            value,
            warnings: vec![
                "Warning: Generated minimal dashboard structure due to JSON parsing issues"
                    .to_string(),
            ],
        });
    }

    Err(RepairError::Exhausted {
        length: original.chars().count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_json_passes_through_without_warnings() {
        let extraction = extract_json(r#"{"title": "CPU", "panels": []}"#).unwrap();
        assert_eq!(extraction.value["title"], json!("CPU"));
        assert!(extraction.warnings.is_empty());
    }

    #[test]
    fn json_fence_is_stripped() {
        let text = "```json\n{\"title\": \"X\"}\n```";
        let extraction = extract_json(text).unwrap();
        assert_eq!(extraction.value["title"], json!("X"));
        assert_eq!(
            extraction.warnings,
            vec!["Removed JSON markdown formatting".to_string()]
        );
    }

    #[test]
    fn bare_fence_is_stripped() {
        let text = "```\n{\"title\": \"X\"}\n```";
        let extraction = extract_json(text).unwrap();
        assert_eq!(
            extraction.warnings,
            vec!["Removed markdown formatting".to_string()]
        );
    }

    #[test]
    fn trailing_comma_is_removed() {
        let extraction = extract_json("{\"a\": 1,}").unwrap();
        assert_eq!(extraction.value, json!({"a": 1}));
        assert_eq!(
            extraction.warnings,
            vec!["Removed trailing commas".to_string()]
        );
    }

    #[test]
    fn battery_recovers_sloppy_object() {
        let extraction = extract_json("{title: 'X',}").unwrap();
        assert_eq!(extraction.value, json!({"title": "X"}));
        assert_eq!(
            extraction.warnings,
            vec!["Fixed unquoted keys".to_string()]
        );
    }

    #[test]
    fn line_comments_are_stripped() {
        let text = "{\n  \"a\": 1 // inline note\n}";
        let extraction = extract_json(text).unwrap();
        assert_eq!(extraction.value, json!({"a": 1}));
        assert!(extraction
            .warnings
            .contains(&"Removed comments".to_string()));
    }

    #[test]
    fn embedded_object_is_recovered_from_prose() {
        let text = "Sure thing! {\"title\": \"Embedded\", \"panels\": []} Hope that helps.";
        let extraction = extract_json(text).unwrap();
        assert_eq!(extraction.value["title"], json!("Embedded"));
        assert_eq!(
            extraction.warnings,
            vec!["Recovered JSON object embedded in surrounding text".to_string()]
        );
    }

    #[test]
    fn embedded_array_is_recovered_from_prose() {
        let text = "Counts follow: [1, 2, 3] as requested";
        let extraction = extract_json(text).unwrap();
        assert_eq!(extraction.value, json!([1, 2, 3]));
        assert_eq!(
            extraction.warnings,
            vec!["Recovered JSON array embedded in surrounding text".to_string()]
        );
    }

    #[test]
    fn think_blocks_are_ignored() {
        let text = "<think>\nnot json { at all\n</think>{\"title\": \"Clean\"}";
        let extraction = extract_json(text).unwrap();
        assert_eq!(extraction.value["title"], json!("Clean"));
        assert!(extraction.warnings.is_empty());
    }

    #[test]
    fn title_synthesis_as_last_resort() {
        let text = "resulting dashboard should use \"title\": \"Recovered\" roughly";
        let extraction = extract_json(text).unwrap();
        assert_eq!(extraction.value["title"], json!("Recovered"));
        assert_eq!(extraction.value["panels"], json!([]));
        assert_eq!(extraction.value["schemaVersion"], json!(1));
        assert_eq!(
            extraction.warnings,
            vec![
                "Warning: Generated minimal dashboard structure due to JSON parsing issues"
                    .to_string()
            ]
        );
    }

    #[test]
    fn pure_prose_fails_with_length() {
        let err = extract_json("This response contains no structured data at all.").unwrap_err();
        match err {
            RepairError::Exhausted { length } => assert_eq!(length, 49),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn empty_input_fails() {
        assert_eq!(extract_json("   \n  ").unwrap_err(), RepairError::EmptyInput);
        assert_eq!(
            extract_json("<think>only reasoning</think>").unwrap_err(),
            RepairError::EmptyInput
        );
    }

    #[test]
    fn transforms_compose() {
        let sloppy = "{env: 'prod', // env name\n 'ids': [1, 2,],}";
        let fixed = quote_bare_keys(&strip_line_comments(&normalize_quotes(
            &remove_trailing_commas(sloppy),
        )));
        let value: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value, json!({"env": "prod", "ids": [1, 2]}));
    }
}
