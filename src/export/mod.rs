//! Per-respondent CSV export of a poll.

use crate::models::{Poll, RespondentRow};
use chrono::SecondsFormat;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to flush CSV: {0}")]
    Io(#[from] std::io::Error),
}

/// Render one row per respondent: session, time of first vote, and every
/// answer they gave, joined with "; " when there is more than one.
pub fn poll_csv(poll: &Poll, rows: &[RespondentRow]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["respondent", "session_id", "voted_at", poll.question.as_str()])?;

    for (n, row) in rows.iter().enumerate() {
        let voted_at = row.first_voted_at.to_rfc3339_opts(SecondsFormat::Secs, true);
        writer.write_record([
            (n + 1).to_string(),
            row.session_id.clone().unwrap_or_default(),
            voted_at,
            row.answers.join("; "),
        ])?;
    }

    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// Download name for a poll's export.
pub fn file_name(poll: &Poll) -> String {
    format!("poll-{}-responses.csv", poll.id)
}
