use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    pub id: i64,
    pub question: String,
    pub options: Vec<PollOption>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOption {
    pub id: i64,
    pub poll_id: i64,
    pub label: String,
    pub position: i64,
    pub votes: i64,
}

// A single recorded vote, as shown in the admin's recent activity list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    pub option_id: i64,
    pub option_label: String,
    pub client_addr: Option<String>,
    pub session_id: Option<String>,
    pub voted_at: DateTime<Utc>,
}

/// Everything one respondent answered in a poll, for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespondentRow {
    pub session_id: Option<String>,
    pub first_voted_at: DateTime<Utc>,
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollStats {
    pub poll_id: i64,
    pub total_votes: i64,
    pub recent_votes: Vec<VoteRecord>,
}

impl Poll {
    /// Sum of the per-option counts.
    pub fn total_votes(&self) -> i64 {
        self.options.iter().map(|option| option.votes).sum()
    }

    pub fn option(&self, option_id: i64) -> Option<&PollOption> {
        self.options.iter().find(|option| option.id == option_id)
    }
}

/// Normalise admin input into a list of option labels.
///
/// Labels are trimmed and blank entries dropped. Returns `None` when fewer
/// than two labels remain, since a poll needs at least two choices.
pub fn parse_option_labels(raw: &str) -> Option<Vec<String>> {
    let labels: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    if labels.len() < 2 { None } else { Some(labels) }
}
