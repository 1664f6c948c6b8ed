pub mod plurality;

pub use plurality::calculate_results;

// Tallied view of a poll, ready for display
#[derive(Debug, Clone, serde::Serialize)]
pub struct PollResults {
    pub total_votes: i64,
    pub leaders: Vec<i64>,       // IDs of the option(s) holding the most votes
    pub summary: String,         // One line per option, highest first
    pub counts: Vec<VoteCount>,  // Sorted by votes, then by display position
}

// Structure to hold vote counts
#[derive(Debug, Clone, serde::Serialize)]
pub struct VoteCount {
    pub option_id: i64,
    pub option_label: String,
    pub votes: i64,
    pub percent: f64,
    pub rank: usize,
}
