use anyhow::Result;
use tracing::info;

use crate::dashboard::Dashboard;
use crate::errors::RepairError;
use crate::repair::{extract_json, Extraction};

/// A decoded dashboard plus everything worth telling the caller about it:
/// the repairs applied during recovery followed by validation findings.
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub dashboard: Dashboard,
    pub messages: Vec<String>,
}

/// Parse free-form text into a dashboard.
///
/// The text runs through the recovery pipeline and the lenient decoder.
/// Validation findings are advisory and never fail the parse; the only
/// error case is recovery exhausting all strategies.
pub fn parse_dashboard_text(text: &str) -> Result<ParseOutcome, RepairError> {
    let Extraction { value, warnings } = extract_json(text)?;
    let dashboard = Dashboard::from_value(&value);

    let mut messages = warnings;
    if let Err(findings) = dashboard.validate() {
        messages.extend(findings);
    }

    Ok(ParseOutcome {
        dashboard,
        messages,
    })
}

pub fn parse_dashboard_file(path: &str) -> Result<ParseOutcome> {
    info!("Parsing dashboard file: {}", path);
    let text = std::fs::read_to_string(path)?;
    let outcome = parse_dashboard_text(&text)?;
    Ok(outcome)
}
