use crate::models::Poll;
use crate::voting::{PollResults, VoteCount};

pub fn calculate_results(poll: &Poll) -> PollResults {
    let total_votes = poll.total_votes();

    // Sort options by vote count, keeping the admin's order for ties
    let mut sorted: Vec<_> = poll.options.iter().collect();
    sorted.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.position.cmp(&b.position)));

    // Competition ranking: tied options share a rank
    let mut counts: Vec<VoteCount> = Vec::with_capacity(sorted.len());
    for (i, option) in sorted.iter().enumerate() {
        let rank = match counts.last() {
            Some(prev) if prev.votes == option.votes => prev.rank,
            _ => i + 1,
        };
        counts.push(VoteCount {
            option_id: option.id,
            option_label: option.label.clone(),
            votes: option.votes,
            percent: percent_of(option.votes, total_votes),
            rank,
        });
    }

    // If no votes were cast there is no leader
    let leaders: Vec<i64> = if total_votes == 0 {
        Vec::new()
    } else {
        counts
            .iter()
            .filter(|count| count.rank == 1)
            .map(|count| count.option_id)
            .collect()
    };

    let mut summary = String::new();
    if total_votes == 0 {
        summary.push_str("No votes were cast in this poll.");
    } else {
        for count in &counts {
            summary.push_str(&format!(
                "{}: {} votes ({:.1}%)\n",
                count.option_label, count.votes, count.percent
            ));
        }
        summary.push_str(&format!("\n{} votes in total.", total_votes));
    }

    PollResults {
        total_votes,
        leaders,
        summary,
        counts,
    }
}

fn percent_of(votes: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        votes as f64 * 100.0 / total as f64
    }
}
