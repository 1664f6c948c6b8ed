//! Server-rendered HTML pages.
//!
//! Every piece of user-supplied text goes through [`escape`] before it is
//! spliced into markup.

use crate::models::{Poll, PollStats};
use crate::voting::PollResults;

const STYLE: &str = r#"
body {
  font-family: system-ui, sans-serif;
  margin: 0;
  padding: 2rem;
  background: #f4f5f7;
  color: #1d1f23;
}
main { max-width: 56rem; margin: 0 auto; }
h1 { font-size: 2.4rem; }
.choices { display: grid; gap: 1rem; }
.choice button {
  width: 100%;
  padding: 1.6rem;
  font-size: 1.6rem;
  border: 0;
  border-radius: .6rem;
  background: #2f6fde;
  color: #fff;
  cursor: pointer;
}
.notice { font-size: 1.4rem; color: #5a5f69; }
.bar { background: #dde1e8; border-radius: .3rem; height: 1rem; }
.bar span { display: block; height: 100%; background: #2f6fde; border-radius: .3rem; }
table { border-collapse: collapse; width: 100%; background: #fff; }
th, td {
  text-align: left;
  padding: .5rem;
  border-bottom: 1px solid #dde1e8;
  vertical-align: top;
}
form.inline { display: inline; }
.current { font-weight: bold; color: #1a7f37; }
.closed { color: #a40e26; }
textarea, input[type=text] { width: 100%; box-sizing: border-box; }
"#;

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, head_extra: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
{head_extra}
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
<main>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
    )
}

// Kiosk pages reload periodically so a newly selected poll shows up
const KIOSK_REFRESH: &str = r#"<meta http-equiv="refresh" content="60">"#;

pub fn poll_page(poll: &Poll, results: &PollResults) -> String {
    if !poll.is_active {
        let body = format!(
            "<h1>{}</h1>\n<p class=\"notice\">Voting has closed. Final results:</p>\n{}",
            escape(&poll.question),
            results_table(results),
        );
        return layout(&poll.question, KIOSK_REFRESH, &body);
    }

    let mut choices = String::new();
    for option in &poll.options {
        choices.push_str(&format!(
            r#"<form class="choice" method="post" action="/vote">
<input type="hidden" name="poll_id" value="{poll_id}">
<input type="hidden" name="option_id" value="{option_id}">
<button type="submit">{label}</button>
</form>
"#,
            poll_id = poll.id,
            option_id = option.id,
            label = escape(&option.label),
        ));
    }

    let body = format!(
        "<h1>{}</h1>\n<div class=\"choices\">\n{}</div>",
        escape(&poll.question),
        choices
    );
    layout(&poll.question, KIOSK_REFRESH, &body)
}

pub fn no_poll_page() -> String {
    layout(
        "No active poll",
        KIOSK_REFRESH,
        "<h1>No active poll</h1>\n<p class=\"notice\">Please check back soon.</p>",
    )
}

pub fn thanks_page() -> String {
    layout(
        "Thank you",
        r#"<meta http-equiv="refresh" content="3;url=/">"#,
        concat!(
            "<h1>Thank you for voting!</h1>\n",
            "<p class=\"notice\"><a href=\"/\">Back to the poll</a></p>",
        ),
    )
}

pub fn error_page(status: u16, message: &str) -> String {
    let body = format!(
        "<h1>Something went wrong</h1>\n<p class=\"notice\">{}</p>\n{}",
        escape(message),
        "<p><a href=\"/\">Back</a></p>",
    );
    layout(&format!("Error {status}"), "", &body)
}

fn results_table(results: &PollResults) -> String {
    let mut rows = String::new();
    for count in &results.counts {
        rows.push_str(&format!(
            "<tr><td>{rank}</td><td>{label}</td><td>{votes}</td><td>{percent:.1}%</td>\
             <td><div class=\"bar\"><span style=\"width: {percent:.1}%\"></span></div></td></tr>\n",
            rank = count.rank,
            label = escape(&count.option_label),
            votes = count.votes,
            percent = count.percent,
        ));
    }
    format!(
        "<table>\n<tr><th>#</th><th>Option</th><th>Votes</th><th>Share</th><th></th></tr>\n\
         {rows}</table>\n<p>{} votes in total.</p>",
        results.total_votes
    )
}

fn post_button(action: &str, label: &str) -> String {
    format!(
        "<form class=\"inline\" method=\"post\" action=\"{}\">\
         <button type=\"submit\">{}</button></form>",
        escape(action),
        escape(label)
    )
}

fn poll_action(poll: &Poll, action: &str) -> String {
    format!("/admin/poll/{}/{action}", poll.id)
}

pub fn admin_page(polls: &[Poll], current_poll_id: Option<i64>) -> String {
    let mut body = String::from("<h1>Poll administration</h1>\n");

    match current_poll_id.and_then(|id| polls.iter().find(|p| p.id == id)) {
        Some(poll) => body.push_str(&format!(
            "<p>Now showing: <span class=\"current\">#{} {}</span> {}</p>\n",
            poll.id,
            escape(&poll.question),
            post_button("/admin/current/clear", "Stop showing"),
        )),
        None => body.push_str("<p>No poll is being shown on the kiosk.</p>\n"),
    }

    body.push_str(
        r#"<h2>New poll</h2>
<form method="post" action="/admin/poll">
<p><label>Question<br><input type="text" name="question" required></label></p>
<p><label>Options, one per line<br>
<textarea name="options" rows="5" required></textarea></label></p>
<p><label><input type="checkbox" name="activate" value="on">
Show on the kiosk right away</label></p>
<p><button type="submit">Create poll</button></p>
</form>
<h2>All polls</h2>
"#,
    );

    if polls.is_empty() {
        body.push_str("<p>No polls yet.</p>\n");
        return layout("Poll administration", "", &body);
    }

    body.push_str(
        "<table>\n<tr><th>#</th><th>Question</th><th>Votes</th><th>Created</th>\
         <th>Status</th><th></th></tr>\n",
    );
    for poll in polls {
        let is_current = Some(poll.id) == current_poll_id;
        let status = match (is_current, poll.is_active) {
            (true, true) => "<span class=\"current\">current</span>",
            (true, false) => {
                "<span class=\"current\">current</span> <span class=\"closed\">closed</span>"
            }
            (false, true) => "open",
            (false, false) => "<span class=\"closed\">closed</span>",
        };

        let mut actions = String::new();
        if !is_current {
            actions.push_str(&post_button(&poll_action(poll, "select"), "Show"));
        }
        if poll.is_active {
            actions.push_str(&post_button(&poll_action(poll, "close"), "Close"));
        } else {
            actions.push_str(&post_button(&poll_action(poll, "reopen"), "Reopen"));
        }

        body.push_str(&format!(
            "<tr><td>{id}</td><td><a href=\"/admin/poll/{id}\">{question}</a></td>\
             <td>{votes}</td><td>{created}</td><td>{status}</td><td>{actions}</td></tr>\n",
            id = poll.id,
            question = escape(&poll.question),
            votes = poll.total_votes(),
            created = poll.created_at.format("%Y-%m-%d %H:%M UTC"),
        ));
    }
    body.push_str("</table>\n");

    layout("Poll administration", "", &body)
}

pub fn poll_detail_page(
    poll: &Poll,
    results: &PollResults,
    stats: &PollStats,
    is_current: bool,
) -> String {
    let mut body = format!(
        "<p><a href=\"/admin\">&larr; All polls</a></p>\n<h1>#{} {}</h1>\n",
        poll.id,
        escape(&poll.question)
    );

    let state = if poll.is_active { "open" } else { "closed" };
    body.push_str(&format!(
        "<p>Status: {}{}. Created {}.</p>\n",
        state,
        if is_current { ", shown on the kiosk" } else { "" },
        poll.created_at.format("%Y-%m-%d %H:%M UTC"),
    ));

    body.push_str("<h2>Results</h2>\n");
    body.push_str(&results_table(results));

    body.push_str("<h2>Recent votes</h2>\n");
    if stats.recent_votes.is_empty() {
        body.push_str("<p>No votes yet.</p>\n");
    } else {
        body.push_str(
            "<table>\n<tr><th>Time</th><th>Option</th><th>Client</th><th>Session</th></tr>\n",
        );
        for vote in &stats.recent_votes {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                vote.voted_at.format("%Y-%m-%d %H:%M:%S"),
                escape(&vote.option_label),
                escape(vote.client_addr.as_deref().unwrap_or("-")),
                escape(vote.session_id.as_deref().unwrap_or("-")),
            ));
        }
        body.push_str("</table>\n");
    }
    body.push_str(&format!(
        "<p><a href=\"/admin/poll/{}/export\">Download responses (CSV)</a></p>\n",
        poll.id
    ));

    body.push_str("<h2>Actions</h2>\n<p>");
    if !is_current {
        body.push_str(&post_button(&poll_action(poll, "select"), "Show on kiosk"));
    }
    if poll.is_active {
        body.push_str(&post_button(&poll_action(poll, "close"), "Close voting"));
    } else {
        body.push_str(&post_button(&poll_action(poll, "reopen"), "Reopen voting"));
    }
    body.push_str(&post_button(&poll_action(poll, "reset"), "Reset votes"));
    if !is_current {
        body.push_str(&post_button(&poll_action(poll, "delete"), "Delete poll"));
    }
    body.push_str("</p>\n");

    if stats.total_votes == 0 {
        let options: Vec<String> = poll.options.iter().map(|o| escape(&o.label)).collect();
        body.push_str(&format!(
            r#"<h2>Edit</h2>
<form method="post" action="/admin/poll/{id}">
<p><label>Question<br>
<input type="text" name="question" value="{question}" required></label></p>
<p><label>Options, one per line<br>
<textarea name="options" rows="5" required>{options}</textarea></label></p>
<p><button type="submit">Save</button></p>
</form>
"#,
            id = poll.id,
            question = escape(&poll.question),
            options = options.join("\n"),
        ));
    }

    layout(&poll.question, "", &body)
}
