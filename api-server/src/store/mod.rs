
use std::{fs, path::Path, sync::Mutex};

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

use crate::now_unix_s;
use crate::scoreboard::is_better;
use crate::types::{AttemptOutcome, ScoreEntry, SkillUsage, UpsertOutcome};

/// Replay facts kept next to an accepted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VerifiedRun {
    pub(crate) seed: u32,
    pub(crate) difficulty: u32,
    pub(crate) final_time: u64,
}

/// SQLite-backed scoreboard.
///
/// `scores` holds one row per `(board, client_uuid)`, replaced only by a
/// better run. `daily_attempts` holds one row per counted attempt; its
/// primary key makes a concurrent double count impossible.
pub struct ScoreStore {
    conn: Mutex<Connection>,
}

impl ScoreStore {
    pub fn open(data_dir: &Path) -> Result<Self, String> {
        fs::create_dir_all(data_dir)
            .map_err(|e| format!("failed to create data dir {}: {e}", data_dir.display()))?;

        let db_path = data_dir.join("scores.db");
        let conn = Connection::open(&db_path)
            .map_err(|e| format!("failed to open SQLite at {}: {e}", db_path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;
             PRAGMA synchronous=NORMAL;",
        )
        .map_err(|e| format!("failed to set pragmas: {e}"))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS scores (
                board           TEXT NOT NULL,
                client_uuid     TEXT NOT NULL,
                player_name     TEXT NOT NULL,
                score           INTEGER NOT NULL,
                level           INTEGER NOT NULL,
                created_at      TEXT NOT NULL,
                skill_usage     TEXT NOT NULL,
                seed            INTEGER NOT NULL,
                difficulty      INTEGER NOT NULL,
                final_time      INTEGER NOT NULL,
                submitted_at    INTEGER NOT NULL,
                PRIMARY KEY (board, client_uuid)
             );
             CREATE INDEX IF NOT EXISTS idx_scores_rank
                ON scores(board, score DESC, level DESC, created_at DESC);
             CREATE TABLE IF NOT EXISTS daily_attempts (
                challenge_id    TEXT NOT NULL,
                client_uuid     TEXT NOT NULL,
                attempt         INTEGER NOT NULL CHECK (attempt >= 1),
                recorded_at     INTEGER NOT NULL,
                PRIMARY KEY (challenge_id, client_uuid, attempt)
             );",
        )
        .map_err(|e| format!("failed to create schema: {e}"))?;

        tracing::info!(path = %db_path.display(), "score store ready");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Stores `entry` unless the client already holds a better or equal run
    /// on this board.
    pub(crate) fn upsert_if_better(
        &self,
        board: &str,
        client_uuid: Uuid,
        entry: &ScoreEntry,
        run: VerifiedRun,
    ) -> Result<UpsertOutcome, String> {
        let skill_usage = serde_json::to_string(&entry.skill_usage)
            .map_err(|e| format!("failed to encode skill usage: {e}"))?;
        let client_uuid = client_uuid.to_string();

        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| format!("begin upsert failed: {e}"))?;

        let existing = Self::select_entry(&tx, board, &client_uuid)?;
        let outcome = match &existing {
            None => UpsertOutcome::Inserted,
            Some(existing) if is_better(entry, existing) => UpsertOutcome::Improved,
            Some(_) => UpsertOutcome::Kept,
        };
        if outcome == UpsertOutcome::Kept {
            return Ok(outcome);
        }

        tx.execute(
            "INSERT INTO scores (
                board, client_uuid, player_name, score, level, created_at,
                skill_usage, seed, difficulty, final_time, submitted_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)
             ON CONFLICT(board, client_uuid) DO UPDATE SET
                player_name = excluded.player_name,
                score = excluded.score,
                level = excluded.level,
                created_at = excluded.created_at,
                skill_usage = excluded.skill_usage,
                seed = excluded.seed,
                difficulty = excluded.difficulty,
                final_time = excluded.final_time,
                submitted_at = excluded.submitted_at",
            params![
                board,
                client_uuid,
                entry.user,
                entry.score,
                entry.level,
                entry.date,
                skill_usage,
                i64::from(run.seed),
                i64::from(run.difficulty),
                run.final_time as i64,
                now_unix_s() as i64,
            ],
        )
        .map_err(|e| format!("upsert score failed: {e}"))?;
        tx.commit().map_err(|e| format!("commit upsert failed: {e}"))?;

        Ok(outcome)
    }

    #[cfg(test)]
    pub(crate) fn get(
        &self,
        board: &str,
        client_uuid: Uuid,
    ) -> Result<Option<ScoreEntry>, String> {
        let conn = self.conn.lock().unwrap();
        Self::select_entry(&conn, board, &client_uuid.to_string())
    }

    /// Best runs on a board in leaderboard order.
    pub(crate) fn top(&self, board: &str, limit: u32) -> Result<Vec<ScoreEntry>, String> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT player_name, score, level, created_at, skill_usage
                 FROM scores WHERE board = ?1
                 ORDER BY score DESC, level DESC, created_at DESC
                 LIMIT ?2",
            )
            .map_err(|e| format!("prepare top failed: {e}"))?;

        let rows = stmt
            .query_map(params![board, i64::from(limit)], row_to_entry)
            .map_err(|e| format!("query top failed: {e}"))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("read top row failed: {e}"))
    }

    pub(crate) fn count(&self) -> Result<usize, String> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM scores", [], |row| row.get::<_, i64>(0))
            .map(|count| count as usize)
            .map_err(|e| format!("count scores failed: {e}"))
    }

    /// Counts one attempt at a daily challenge, or reports that the client has
    /// none left.
    pub(crate) fn record_attempt(
        &self,
        challenge_id: &str,
        client_uuid: Uuid,
        max_attempts: u32,
    ) -> Result<AttemptOutcome, String> {
        let client_uuid = client_uuid.to_string();
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| format!("begin attempt failed: {e}"))?;

        let used = Self::count_attempts(&tx, challenge_id, &client_uuid)?;
        if used >= max_attempts {
            return Ok(AttemptOutcome::Exhausted { max: max_attempts });
        }

        tx.execute(
            "INSERT INTO daily_attempts (challenge_id, client_uuid, attempt, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![challenge_id, client_uuid, used + 1, now_unix_s() as i64],
        )
        .map_err(|e| format!("record attempt failed: {e}"))?;
        tx.commit().map_err(|e| format!("commit attempt failed: {e}"))?;

        Ok(AttemptOutcome::Recorded { used: used + 1 })
    }

    #[cfg(test)]
    pub(crate) fn attempts_used(
        &self,
        challenge_id: &str,
        client_uuid: Uuid,
    ) -> Result<u32, String> {
        let conn = self.conn.lock().unwrap();
        Self::count_attempts(&conn, challenge_id, &client_uuid.to_string())
    }

    fn count_attempts(
        conn: &Connection,
        challenge_id: &str,
        client_uuid: &str,
    ) -> Result<u32, String> {
        conn.query_row(
            "SELECT COUNT(*) FROM daily_attempts WHERE challenge_id = ?1 AND client_uuid = ?2",
            params![challenge_id, client_uuid],
            |row| row.get::<_, u32>(0),
        )
        .map_err(|e| format!("count attempts failed: {e}"))
    }

    fn select_entry(
        conn: &Connection,
        board: &str,
        client_uuid: &str,
    ) -> Result<Option<ScoreEntry>, String> {
        conn.query_row(
            "SELECT player_name, score, level, created_at, skill_usage
             FROM scores WHERE board = ?1 AND client_uuid = ?2",
            params![board, client_uuid],
            row_to_entry,
        )
        .optional()
        .map_err(|e| format!("get score failed: {e}"))
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScoreEntry> {
    let raw_usage: String = row.get(4)?;
    let skill_usage = serde_json::from_str::<Vec<SkillUsage>>(&raw_usage).unwrap_or_else(|e| {
        tracing::warn!("unreadable skill_usage in db: {e}");
        Vec::new()
    });
    Ok(ScoreEntry {
        user: row.get(0)?,
        score: row.get(1)?,
        level: row.get(2)?,
        date: row.get(3)?,
        skill_usage,
    })
}
