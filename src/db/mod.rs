use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
    Row, Sqlite,
};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::models::{Poll, PollOption, PollStats, RespondentRow, VoteRecord};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Poll {0} not found")]
    PollNotFound(i64),

    #[error("Poll option {0} not found")]
    OptionNotFound(i64),

    #[error("Poll {0} is closed")]
    PollClosed(i64),

    #[error("Poll {0} already has votes")]
    PollHasVotes(i64),

    #[error("Corrupt data in database: {0}")]
    Corrupt(String),

    #[error("Failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(db_url: &str) -> Result<Self, DbError> {
        // SQLite creates the file but not the directory holding it
        if let Some(dir) = sqlite_file_path(db_url).and_then(Path::parent) {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }

        let options = SqliteConnectOptions::from_str(db_url)?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    // Initialize the database schema
    async fn init_schema(pool: &SqlitePool) -> Result<(), DbError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TEXT NOT NULL,
                closed_at TEXT
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_options (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                poll_id INTEGER NOT NULL,
                label TEXT NOT NULL,
                position INTEGER NOT NULL,
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                poll_id INTEGER NOT NULL,
                option_id INTEGER NOT NULL,
                client_addr TEXT,
                session_id TEXT,
                voted_at TEXT NOT NULL,
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE,
                FOREIGN KEY (option_id) REFERENCES poll_options(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        // Files created before respondent tagging lack the session column
        let has_session: i64 = sqlx::query(
            "SELECT COUNT(*) AS found FROM pragma_table_info('votes') WHERE name = 'session_id'",
        )
        .fetch_one(pool)
        .await?
        .get("found");
        if has_session == 0 {
            sqlx::query("ALTER TABLE votes ADD COLUMN session_id TEXT")
                .execute(pool)
                .await?;
        }

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_votes_poll_id ON votes(poll_id)")
            .execute(pool)
            .await?;

        Ok(())
    }

    // Create a new poll with its options, returning the poll ID
    pub async fn create_poll(&self, question: &str, options: &[String]) -> Result<i64, DbError> {
        let mut tx = self.pool.begin().await?;

        let poll_id = sqlx::query(
            r#"
            INSERT INTO polls (question, is_active, created_at)
            VALUES (?, TRUE, ?)
            "#,
        )
        .bind(question)
        .bind(timestamp(Utc::now()))
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        insert_options(&mut tx, poll_id, options).await?;
        tx.commit().await?;

        Ok(poll_id)
    }

    // Replace the question and options of a poll nobody has voted on yet
    pub async fn update_poll(
        &self,
        poll_id: i64,
        question: &str,
        options: &[String],
    ) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        let votes: i64 = sqlx::query("SELECT COUNT(*) AS total FROM votes WHERE poll_id = ?")
            .bind(poll_id)
            .fetch_one(&mut *tx)
            .await?
            .get("total");
        if votes > 0 {
            return Err(DbError::PollHasVotes(poll_id));
        }

        let updated = sqlx::query("UPDATE polls SET question = ? WHERE id = ?")
            .bind(question)
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(DbError::PollNotFound(poll_id));
        }

        sqlx::query("DELETE FROM poll_options WHERE poll_id = ?")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;
        insert_options(&mut tx, poll_id, options).await?;

        tx.commit().await?;
        Ok(())
    }

    // Get a poll by ID, with options and their vote counts
    pub async fn get_poll(&self, poll_id: i64) -> Result<Option<Poll>, DbError> {
        let row = sqlx::query(
            r#"
            SELECT id, question, is_active, created_at, closed_at
            FROM polls
            WHERE id = ?
            "#,
        )
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let options = sqlx::query(
            r#"
            SELECT o.id, o.poll_id, o.label, o.position, COUNT(v.id) AS votes
            FROM poll_options o
            LEFT JOIN votes v ON v.option_id = o.id
            WHERE o.poll_id = ?
            GROUP BY o.id
            ORDER BY o.position
            "#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(option_from_row)
        .collect();

        poll_from_row(&row, options).map(Some)
    }

    /// Resolve the configured current poll. A dangling ID reads as no poll.
    pub async fn get_current_poll(
        &self,
        current_poll_id: Option<i64>,
    ) -> Result<Option<Poll>, DbError> {
        match current_poll_id {
            Some(poll_id) => self.get_poll(poll_id).await,
            None => Ok(None),
        }
    }

    // All polls, newest first
    pub async fn list_polls(&self) -> Result<Vec<Poll>, DbError> {
        let mut options_by_poll: HashMap<i64, Vec<PollOption>> = HashMap::new();
        let option_rows = sqlx::query(
            r#"
            SELECT o.id, o.poll_id, o.label, o.position, COUNT(v.id) AS votes
            FROM poll_options o
            LEFT JOIN votes v ON v.option_id = o.id
            GROUP BY o.id
            ORDER BY o.poll_id, o.position
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        for row in &option_rows {
            let option = option_from_row(row);
            options_by_poll.entry(option.poll_id).or_default().push(option);
        }

        let rows = sqlx::query(
            r#"
            SELECT id, question, is_active, created_at, closed_at
            FROM polls
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let poll_id: i64 = row.get("id");
                let options = options_by_poll.remove(&poll_id).unwrap_or_default();
                poll_from_row(row, options)
            })
            .collect()
    }

    /// Record one vote for an option, returning the poll it belongs to.
    ///
    /// Votes against a missing option or a closed poll are rejected without
    /// touching any count. `session_id` only tags the respondent; repeated
    /// votes from one session are all kept.
    pub async fn cast_vote(
        &self,
        option_id: i64,
        client_addr: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<i64, DbError> {
        // First verify the option exists and its poll is open
        let target = sqlx::query(
            r#"
            SELECT o.poll_id, p.is_active
            FROM poll_options o
            JOIN polls p ON p.id = o.poll_id
            WHERE o.id = ?
            "#,
        )
        .bind(option_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::OptionNotFound(option_id))?;

        let poll_id: i64 = target.get("poll_id");
        if !target.get::<bool, _>("is_active") {
            return Err(DbError::PollClosed(poll_id));
        }

        // The poll may have been closed since the check above
        let inserted = sqlx::query(
            r#"
            INSERT INTO votes (poll_id, option_id, client_addr, session_id, voted_at)
            SELECT o.poll_id, o.id, ?, ?, ?
            FROM poll_options o
            JOIN polls p ON p.id = o.poll_id
            WHERE o.id = ? AND p.is_active = TRUE
            "#,
        )
        .bind(client_addr)
        .bind(session_id)
        .bind(timestamp(Utc::now()))
        .bind(option_id)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(DbError::PollClosed(poll_id));
        }

        Ok(poll_id)
    }

    // Close a poll (set is_active = false). Closing twice is a no-op.
    pub async fn close_poll(&self, poll_id: i64) -> Result<(), DbError> {
        let updated = sqlx::query(
            r#"
            UPDATE polls
            SET is_active = FALSE, closed_at = ?
            WHERE id = ? AND is_active = TRUE
            "#,
        )
        .bind(timestamp(Utc::now()))
        .bind(poll_id)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            self.ensure_poll_exists(poll_id).await?;
        }
        Ok(())
    }

    pub async fn reopen_poll(&self, poll_id: i64) -> Result<(), DbError> {
        let updated =
            sqlx::query("UPDATE polls SET is_active = TRUE, closed_at = NULL WHERE id = ?")
                .bind(poll_id)
                .execute(&self.pool)
                .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::PollNotFound(poll_id));
        }
        Ok(())
    }

    // Delete a poll together with its options and votes
    pub async fn delete_poll(&self, poll_id: i64) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM votes WHERE poll_id = ?")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM poll_options WHERE poll_id = ?")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM polls WHERE id = ?")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(DbError::PollNotFound(poll_id));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Remove every vote cast in a poll, returning how many were deleted.
    pub async fn reset_votes(&self, poll_id: i64) -> Result<u64, DbError> {
        self.ensure_poll_exists(poll_id).await?;

        let deleted = sqlx::query("DELETE FROM votes WHERE poll_id = ?")
            .bind(poll_id)
            .execute(&self.pool)
            .await?;

        Ok(deleted.rows_affected())
    }

    // Total votes plus the most recent ones, newest first
    pub async fn get_poll_stats(
        &self,
        poll_id: i64,
        recent_limit: u32,
    ) -> Result<PollStats, DbError> {
        self.ensure_poll_exists(poll_id).await?;

        let total_votes: i64 = sqlx::query("SELECT COUNT(*) AS total FROM votes WHERE poll_id = ?")
            .bind(poll_id)
            .fetch_one(&self.pool)
            .await?
            .get("total");

        let rows = sqlx::query(
            r#"
            SELECT v.option_id, o.label, v.client_addr, v.session_id, v.voted_at
            FROM votes v
            JOIN poll_options o ON o.id = v.option_id
            WHERE v.poll_id = ?
            ORDER BY v.voted_at DESC, v.id DESC
            LIMIT ?
            "#,
        )
        .bind(poll_id)
        .bind(recent_limit)
        .fetch_all(&self.pool)
        .await?;

        let recent_votes = rows
            .iter()
            .map(|row| {
                Ok(VoteRecord {
                    option_id: row.get("option_id"),
                    option_label: row.get("label"),
                    client_addr: row.get("client_addr"),
                    session_id: row.get("session_id"),
                    voted_at: parse_timestamp(&row.get::<String, _>("voted_at"))?,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PollStats {
            poll_id,
            total_votes,
            recent_votes,
        })
    }

    /// One row per respondent, in order of their first vote.
    ///
    /// Votes sharing a session id are folded into a single row. Votes without
    /// one each count as their own respondent.
    pub async fn respondent_rows(&self, poll_id: i64) -> Result<Vec<RespondentRow>, DbError> {
        self.ensure_poll_exists(poll_id).await?;

        let rows = sqlx::query(
            r#"
            SELECT v.session_id, o.label, v.voted_at
            FROM votes v
            JOIN poll_options o ON o.id = v.option_id
            WHERE v.poll_id = ?
            ORDER BY v.voted_at, v.id
            "#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        let mut respondents: Vec<RespondentRow> = Vec::new();
        let mut by_session: HashMap<String, usize> = HashMap::new();
        for row in &rows {
            let session_id: Option<String> = row.get("session_id");
            let answer: String = row.get("label");

            if let Some(&index) = session_id.as_ref().and_then(|id| by_session.get(id)) {
                respondents[index].answers.push(answer);
                continue;
            }

            if let Some(id) = &session_id {
                by_session.insert(id.clone(), respondents.len());
            }
            respondents.push(RespondentRow {
                session_id,
                first_voted_at: parse_timestamp(&row.get::<String, _>("voted_at"))?,
                answers: vec![answer],
            });
        }

        Ok(respondents)
    }

    async fn ensure_poll_exists(&self, poll_id: i64) -> Result<(), DbError> {
        sqlx::query("SELECT 1 FROM polls WHERE id = ?")
            .bind(poll_id)
            .fetch_optional(&self.pool)
            .await?
            .map(|_| ())
            .ok_or(DbError::PollNotFound(poll_id))
    }
}

async fn insert_options(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    poll_id: i64,
    options: &[String],
) -> Result<(), DbError> {
    for (i, label) in options.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO poll_options (poll_id, label, position)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(poll_id)
        .bind(label)
        .bind(i as i64)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn poll_from_row(row: &SqliteRow, options: Vec<PollOption>) -> Result<Poll, DbError> {
    let closed_at = row
        .get::<Option<String>, _>("closed_at")
        .map(|raw| parse_timestamp(&raw))
        .transpose()?;

    Ok(Poll {
        id: row.get("id"),
        question: row.get("question"),
        options,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        closed_at,
        is_active: row.get("is_active"),
    })
}

fn option_from_row(row: &SqliteRow) -> PollOption {
    PollOption {
        id: row.get("id"),
        poll_id: row.get("poll_id"),
        label: row.get("label"),
        position: row.get("position"),
        votes: row.get("votes"),
    }
}

// Fixed-width UTC timestamps so that text ordering matches time ordering
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Corrupt(format!("bad timestamp {raw:?}: {e}")))
}

/// Filesystem path behind a `sqlite:` URL, if it names a file.
fn sqlite_file_path(db_url: &str) -> Option<&Path> {
    let rest = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);

    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(Path::new(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    async fn test_db() -> (TempDir, Database) {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("polls.db").display());
        let db = Database::connect(&url).await.unwrap();
        (dir, db)
    }

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sqlite_paths_from_urls() {
        assert_eq!(sqlite_file_path("sqlite:data/polls.db"), Some(Path::new("data/polls.db")));
        assert_eq!(
            sqlite_file_path("sqlite:///app/data/polls.db?mode=rwc"),
            Some(Path::new("/app/data/polls.db"))
        );
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
        assert_eq!(sqlite_file_path("postgres://localhost/db"), None);
    }

    #[tokio::test]
    async fn create_and_fetch_poll() {
        let (_dir, db) = test_db().await;
        let poll_id = db
            .create_poll("Favourite colour?", &labels(&["Red", "Blue", "Green"]))
            .await
            .unwrap();

        let poll = db.get_poll(poll_id).await.unwrap().unwrap();
        assert_eq!(poll.question, "Favourite colour?");
        assert!(poll.is_active);
        assert!(poll.closed_at.is_none());

        let option_labels: Vec<&str> = poll.options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(option_labels, vec!["Red", "Blue", "Green"]);
        assert!(poll.options.iter().all(|o| o.votes == 0 && o.poll_id == poll_id));
    }

    #[tokio::test]
    async fn missing_poll_is_none() {
        let (_dir, db) = test_db().await;
        assert!(db.get_poll(42).await.unwrap().is_none());
        assert!(db.get_current_poll(None).await.unwrap().is_none());
        assert!(db.get_current_poll(Some(42)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn one_vote_per_option_tallies_one_each() {
        let (_dir, db) = test_db().await;
        let poll_id = db.create_poll("Q", &labels(&["A", "B", "C", "D"])).await.unwrap();
        let poll = db.get_poll(poll_id).await.unwrap().unwrap();

        for option in &poll.options {
            let voted_in = db.cast_vote(option.id, Some("10.0.0.1"), None).await.unwrap();
            assert_eq!(voted_in, poll_id);
        }

        let poll = db.get_current_poll(Some(poll_id)).await.unwrap().unwrap();
        assert!(poll.options.iter().all(|o| o.votes == 1));
        assert_eq!(poll.total_votes(), 4);
    }

    #[tokio::test]
    async fn option_counts_sum_to_total_votes() {
        let (_dir, db) = test_db().await;
        let first = db.create_poll("First", &labels(&["A", "B", "C"])).await.unwrap();
        let second = db.create_poll("Second", &labels(&["X", "Y"])).await.unwrap();
        let first_poll = db.get_poll(first).await.unwrap().unwrap();
        let second_poll = db.get_poll(second).await.unwrap().unwrap();

        for (i, n) in [3, 0, 5].iter().enumerate() {
            for _ in 0..*n {
                db.cast_vote(first_poll.options[i].id, None, None).await.unwrap();
            }
        }
        db.cast_vote(second_poll.options[1].id, None, None).await.unwrap();

        for poll in db.list_polls().await.unwrap() {
            let stats = db.get_poll_stats(poll.id, 20).await.unwrap();
            assert_eq!(poll.total_votes(), stats.total_votes);
        }
        assert_eq!(db.get_poll(first).await.unwrap().unwrap().total_votes(), 8);
    }

    #[tokio::test]
    async fn vote_on_missing_option_fails() {
        let (_dir, db) = test_db().await;
        let err = db.cast_vote(999, None, None).await.unwrap_err();
        assert!(matches!(err, DbError::OptionNotFound(999)));
    }

    #[tokio::test]
    async fn closed_poll_rejects_votes() {
        let (_dir, db) = test_db().await;
        let poll_id = db.create_poll("Q", &labels(&["A", "B"])).await.unwrap();
        let option_id = db.get_poll(poll_id).await.unwrap().unwrap().options[0].id;
        db.cast_vote(option_id, None, None).await.unwrap();

        db.close_poll(poll_id).await.unwrap();
        let err = db.cast_vote(option_id, None, None).await.unwrap_err();
        assert!(matches!(err, DbError::PollClosed(id) if id == poll_id));

        let poll = db.get_poll(poll_id).await.unwrap().unwrap();
        assert!(!poll.is_active);
        assert!(poll.closed_at.is_some());
        assert_eq!(poll.total_votes(), 1);

        // Closing again is harmless, reopening accepts votes again
        db.close_poll(poll_id).await.unwrap();
        db.reopen_poll(poll_id).await.unwrap();
        db.cast_vote(option_id, None, None).await.unwrap();
        assert_eq!(db.get_poll(poll_id).await.unwrap().unwrap().total_votes(), 2);
    }

    #[tokio::test]
    async fn lifecycle_on_missing_poll_fails() {
        let (_dir, db) = test_db().await;
        assert!(matches!(db.close_poll(5).await, Err(DbError::PollNotFound(5))));
        assert!(matches!(db.reopen_poll(5).await, Err(DbError::PollNotFound(5))));
        assert!(matches!(db.delete_poll(5).await, Err(DbError::PollNotFound(5))));
        assert!(matches!(db.reset_votes(5).await, Err(DbError::PollNotFound(5))));
        assert!(matches!(db.get_poll_stats(5, 20).await, Err(DbError::PollNotFound(5))));
    }

    #[tokio::test]
    async fn list_polls_newest_first() {
        let (_dir, db) = test_db().await;
        let first = db.create_poll("First", &labels(&["A", "B"])).await.unwrap();
        let second = db.create_poll("Second", &labels(&["C", "D", "E"])).await.unwrap();

        let polls = db.list_polls().await.unwrap();
        let ids: Vec<i64> = polls.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert_eq!(polls[0].options.len(), 3);
        assert_eq!(polls[1].options.len(), 2);
    }

    #[tokio::test]
    async fn update_replaces_options_until_votes_exist() {
        let (_dir, db) = test_db().await;
        let poll_id = db.create_poll("Old question", &labels(&["A", "B"])).await.unwrap();

        db.update_poll(poll_id, "New question", &labels(&["X", "Y", "Z"])).await.unwrap();
        let poll = db.get_poll(poll_id).await.unwrap().unwrap();
        assert_eq!(poll.question, "New question");
        let option_labels: Vec<&str> = poll.options.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(option_labels, vec!["X", "Y", "Z"]);

        db.cast_vote(poll.options[0].id, None, None).await.unwrap();
        let err = db.update_poll(poll_id, "Again", &labels(&["P", "Q"])).await.unwrap_err();
        assert!(matches!(err, DbError::PollHasVotes(_)));
        assert_eq!(db.get_poll(poll_id).await.unwrap().unwrap().question, "New question");

        let err = db.update_poll(77, "Nope", &labels(&["P", "Q"])).await.unwrap_err();
        assert!(matches!(err, DbError::PollNotFound(77)));
    }

    #[tokio::test]
    async fn reset_only_touches_one_poll() {
        let (_dir, db) = test_db().await;
        let first = db.create_poll("First", &labels(&["A", "B"])).await.unwrap();
        let second = db.create_poll("Second", &labels(&["C", "D"])).await.unwrap();
        let first_option = db.get_poll(first).await.unwrap().unwrap().options[0].id;
        let second_option = db.get_poll(second).await.unwrap().unwrap().options[1].id;

        db.cast_vote(first_option, None, None).await.unwrap();
        db.cast_vote(first_option, None, None).await.unwrap();
        db.cast_vote(second_option, None, None).await.unwrap();

        assert_eq!(db.reset_votes(first).await.unwrap(), 2);
        assert_eq!(db.get_poll(first).await.unwrap().unwrap().total_votes(), 0);
        assert_eq!(db.get_poll(second).await.unwrap().unwrap().total_votes(), 1);
    }

    #[tokio::test]
    async fn delete_removes_poll_and_votes() {
        let (_dir, db) = test_db().await;
        let poll_id = db.create_poll("Doomed", &labels(&["A", "B"])).await.unwrap();
        let option_id = db.get_poll(poll_id).await.unwrap().unwrap().options[0].id;
        db.cast_vote(option_id, None, None).await.unwrap();

        db.delete_poll(poll_id).await.unwrap();
        assert!(db.get_poll(poll_id).await.unwrap().is_none());
        assert!(db.list_polls().await.unwrap().is_empty());
        let err = db.cast_vote(option_id, None, None).await.unwrap_err();
        assert!(matches!(err, DbError::OptionNotFound(_)));
    }

    #[tokio::test]
    async fn stats_list_recent_votes_newest_first() {
        let (_dir, db) = test_db().await;
        let poll_id = db.create_poll("Q", &labels(&["A", "B"])).await.unwrap();
        let poll = db.get_poll(poll_id).await.unwrap().unwrap();

        db.cast_vote(poll.options[0].id, Some("10.0.0.1"), None).await.unwrap();
        db.cast_vote(poll.options[1].id, Some("10.0.0.2"), Some("kiosk-7")).await.unwrap();
        db.cast_vote(poll.options[1].id, None, None).await.unwrap();

        let stats = db.get_poll_stats(poll_id, 2).await.unwrap();
        assert_eq!(stats.total_votes, 3);
        assert_eq!(stats.recent_votes.len(), 2);
        assert_eq!(stats.recent_votes[0].option_label, "B");
        assert_eq!(stats.recent_votes[0].client_addr, None);
        assert_eq!(stats.recent_votes[1].client_addr.as_deref(), Some("10.0.0.2"));
        assert_eq!(stats.recent_votes[1].session_id.as_deref(), Some("kiosk-7"));
    }

    #[tokio::test]
    async fn respondent_rows_group_by_session() {
        let (_dir, db) = test_db().await;
        let poll_id = db.create_poll("Q", &labels(&["A", "B", "C"])).await.unwrap();
        let other = db.create_poll("Other", &labels(&["X", "Y"])).await.unwrap();
        let poll = db.get_poll(poll_id).await.unwrap().unwrap();
        let other_option = db.get_poll(other).await.unwrap().unwrap().options[0].id;

        db.cast_vote(poll.options[0].id, None, Some("r1")).await.unwrap();
        db.cast_vote(poll.options[1].id, None, Some("r2")).await.unwrap();
        db.cast_vote(poll.options[2].id, None, None).await.unwrap();
        db.cast_vote(poll.options[1].id, None, Some("r1")).await.unwrap();
        db.cast_vote(poll.options[0].id, None, None).await.unwrap();
        db.cast_vote(other_option, None, Some("r1")).await.unwrap();

        let rows = db.respondent_rows(poll_id).await.unwrap();
        let sessions: Vec<Option<&str>> = rows.iter().map(|r| r.session_id.as_deref()).collect();
        assert_eq!(sessions, vec![Some("r1"), Some("r2"), None, None]);
        assert_eq!(rows[0].answers, vec!["A", "B"]);
        assert_eq!(rows[1].answers, vec!["B"]);
        assert_eq!(rows[2].answers, vec!["C"]);
        assert_eq!(rows[3].answers, vec!["A"]);

        assert_eq!(db.respondent_rows(other).await.unwrap().len(), 1);
        assert!(matches!(db.respondent_rows(99).await, Err(DbError::PollNotFound(99))));
    }

    #[tokio::test]
    async fn older_files_gain_the_session_column() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("polls.db").display());

        {
            let options = SqliteConnectOptions::from_str(&url).unwrap().create_if_missing(true);
            let pool = SqlitePoolOptions::new().connect_with(options).await.unwrap();
            sqlx::query(
                r#"
                CREATE TABLE votes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    poll_id INTEGER NOT NULL,
                    option_id INTEGER NOT NULL,
                    client_addr TEXT,
                    voted_at TEXT NOT NULL
                );
                "#,
            )
            .execute(&pool)
            .await
            .unwrap();
            pool.close().await;
        }

        let db = Database::connect(&url).await.unwrap();
        let poll_id = db.create_poll("Q", &labels(&["A", "B"])).await.unwrap();
        let option_id = db.get_poll(poll_id).await.unwrap().unwrap().options[0].id;
        db.cast_vote(option_id, None, Some("late")).await.unwrap();

        let stats = db.get_poll_stats(poll_id, 5).await.unwrap();
        assert_eq!(stats.recent_votes[0].session_id.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn votes_survive_reopening_the_file() {
        let dir = tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("data").join("polls.db").display());

        let poll_id = {
            let db = Database::connect(&url).await.unwrap();
            let poll_id = db.create_poll("Persistent?", &labels(&["Yes", "No"])).await.unwrap();
            let option_id = db.get_poll(poll_id).await.unwrap().unwrap().options[0].id;
            db.cast_vote(option_id, None, None).await.unwrap();
            db.cast_vote(option_id, None, None).await.unwrap();
            db.pool.close().await;
            poll_id
        };

        let db = Database::connect(&url).await.unwrap();
        let poll = db.get_poll(poll_id).await.unwrap().unwrap();
        assert_eq!(poll.options[0].votes, 2);
        assert_eq!(poll.total_votes(), 2);
    }
}
