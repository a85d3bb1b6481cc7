use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use thiserror::Error;
use tracing::info;

use crate::session::CompletionSummary;
use crate::week::previous_week_label;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("history io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("bad timestamp in history: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

/// One finished workout
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub workout_id: String,
    pub workout_name: String,
    pub week: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub sets_completed: u32,
    pub exercises_skipped: u32,
}

impl From<&CompletionSummary> for Completion {
    fn from(s: &CompletionSummary) -> Self {
        Self {
            workout_id: s.workout_id.clone(),
            workout_name: s.workout_name.clone(),
            week: s.week.clone(),
            started_at: s.started_at,
            finished_at: s.finished_at,
            sets_completed: s.sets_completed,
            exercises_skipped: s.exercises_skipped,
        }
    }
}

impl Completion {
    pub fn elapsed_secs(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds().max(0)
    }
}

/// Log of finished workouts
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HistoryError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, HistoryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS completions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workout_id TEXT NOT NULL,
                workout_name TEXT NOT NULL,
                week TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                sets_completed INTEGER NOT NULL,
                exercises_skipped INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_completions_week ON completions(week)",
            [],
        )?;

        Ok(Self { conn })
    }

    pub fn record(&self, completion: &Completion) -> Result<(), HistoryError> {
        self.conn.execute(
            r#"
            INSERT INTO completions
            (workout_id, workout_name, week, started_at, finished_at, sets_completed, exercises_skipped)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                completion.workout_id,
                completion.workout_name,
                completion.week,
                stored_timestamp(&completion.started_at),
                stored_timestamp(&completion.finished_at),
                completion.sets_completed,
                completion.exercises_skipped,
            ],
        )?;
        info!(workout = %completion.workout_id, week = %completion.week, "completion recorded");
        Ok(())
    }

    /// Most recent first
    pub fn recent(&self, limit: usize) -> Result<Vec<Completion>, HistoryError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT workout_id, workout_name, week, started_at, finished_at, sets_completed, exercises_skipped
            FROM completions
            ORDER BY finished_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt.query_map([limit as i64], raw_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_completion()?);
        }
        Ok(out)
    }

    pub fn completions_in_week(&self, week: &str) -> Result<usize, HistoryError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM completions WHERE week = ?1",
            [week],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Consecutive weeks with at least one completion, counting back from
    /// `current_week`. An empty current week does not break the streak yet.
    pub fn weekly_streak(&self, current_week: &str) -> Result<u32, HistoryError> {
        let mut stmt = self.conn.prepare("SELECT DISTINCT week FROM completions")?;
        let weeks: HashSet<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<_, _>>()?;

        let mut cursor = if weeks.contains(current_week) {
            Some(current_week.to_string())
        } else {
            previous_week_label(current_week)
        };

        let mut streak = 0;
        while let Some(week) = cursor.filter(|w| weeks.contains(w)) {
            streak += 1;
            cursor = previous_week_label(&week);
        }
        Ok(streak)
    }

    /// Write every completion, oldest first, as CSV
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<usize, HistoryError> {
        let mut all = self.recent(usize::MAX >> 1)?;
        all.reverse();

        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record([
            "workout_id",
            "workout_name",
            "week",
            "started_at",
            "finished_at",
            "elapsed_secs",
            "sets_completed",
            "exercises_skipped",
        ])?;
        for c in &all {
            wtr.write_record([
                c.workout_id.clone(),
                c.workout_name.clone(),
                c.week.clone(),
                c.started_at.to_rfc3339(),
                c.finished_at.to_rfc3339(),
                c.elapsed_secs().to_string(),
                c.sets_completed.to_string(),
                c.exercises_skipped.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(all.len())
    }

    /// Forget every completion; returns how many were removed
    pub fn clear_all(&self) -> Result<usize, HistoryError> {
        let removed = self.conn.execute("DELETE FROM completions", [])?;
        info!(removed, "history cleared");
        Ok(removed)
    }
}

/// Fixed-width UTC text, so `ORDER BY` on the column is chronological
/// regardless of the local offset at the time of writing
fn stored_timestamp(at: &DateTime<Local>) -> String {
    at.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Row as stored; timestamps are parsed after leaving rusqlite
struct RawCompletion {
    workout_id: String,
    workout_name: String,
    week: String,
    started_at: String,
    finished_at: String,
    sets_completed: u32,
    exercises_skipped: u32,
}

fn raw_row(row: &Row<'_>) -> rusqlite::Result<RawCompletion> {
    Ok(RawCompletion {
        workout_id: row.get(0)?,
        workout_name: row.get(1)?,
        week: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        sets_completed: row.get(5)?,
        exercises_skipped: row.get(6)?,
    })
}

impl RawCompletion {
    fn into_completion(self) -> Result<Completion, HistoryError> {
        Ok(Completion {
            workout_id: self.workout_id,
            workout_name: self.workout_name,
            week: self.week,
            started_at: DateTime::parse_from_rfc3339(&self.started_at)?.with_timezone(&Local),
            finished_at: DateTime::parse_from_rfc3339(&self.finished_at)?.with_timezone(&Local),
            sets_completed: self.sets_completed,
            exercises_skipped: self.exercises_skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn completion(workout_id: &str, week: &str, day: u32) -> Completion {
        let started_at = Local.with_ymd_and_hms(2024, 3, day, 18, 0, 0).unwrap();
        Completion {
            workout_id: workout_id.to_string(),
            workout_name: workout_id.to_uppercase(),
            week: week.to_string(),
            started_at,
            finished_at: started_at + Duration::minutes(50),
            sets_completed: 12,
            exercises_skipped: 1,
        }
    }

    #[test]
    fn test_record_and_recent() {
        let db = HistoryDb::open_in_memory().unwrap();
        db.record(&completion("push", "2024-W10", 4)).unwrap();
        db.record(&completion("pull", "2024-W10", 6)).unwrap();

        let recent = db.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].workout_id, "pull");
        assert_eq!(recent[0], completion("pull", "2024-W10", 6));
        assert_eq!(recent[1].elapsed_secs(), 50 * 60);

        assert_eq!(db.recent(1).unwrap().len(), 1);
    }

    #[test]
    fn test_completions_in_week() {
        let db = HistoryDb::open_in_memory().unwrap();
        db.record(&completion("push", "2024-W10", 4)).unwrap();
        db.record(&completion("pull", "2024-W10", 6)).unwrap();
        db.record(&completion("legs", "2024-W09", 1)).unwrap();

        assert_eq!(db.completions_in_week("2024-W10").unwrap(), 2);
        assert_eq!(db.completions_in_week("2024-W09").unwrap(), 1);
        assert_eq!(db.completions_in_week("2024-W11").unwrap(), 0);
    }

    #[test]
    fn test_weekly_streak() {
        let db = HistoryDb::open_in_memory().unwrap();
        assert_eq!(db.weekly_streak("2024-W10").unwrap(), 0);

        for week in ["2024-W07", "2024-W08", "2024-W09"] {
            db.record(&completion("push", week, 1)).unwrap();
        }
        // nothing yet this week: last week's run still counts
        assert_eq!(db.weekly_streak("2024-W10").unwrap(), 3);

        db.record(&completion("push", "2024-W10", 6)).unwrap();
        assert_eq!(db.weekly_streak("2024-W10").unwrap(), 4);

        // a full empty week breaks it
        assert_eq!(db.weekly_streak("2024-W12").unwrap(), 0);
    }

    #[test]
    fn test_export_csv() {
        let db = HistoryDb::open_in_memory().unwrap();
        db.record(&completion("push", "2024-W10", 4)).unwrap();
        db.record(&completion("pull", "2024-W10", 6)).unwrap();

        let mut out = Vec::new();
        assert_eq!(db.export_csv(&mut out).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("workout_id,workout_name,week"));
        assert!(lines[1].starts_with("push,PUSH,2024-W10,"));
        assert!(lines[2].starts_with("pull,PULL,2024-W10,"));
        assert!(lines[1].contains(",3000,12,1"));
    }

    #[test]
    fn test_clear_all() {
        let db = HistoryDb::open_in_memory().unwrap();
        db.record(&completion("push", "2024-W10", 4)).unwrap();
        db.record(&completion("pull", "2024-W10", 6)).unwrap();
        assert_eq!(db.clear_all().unwrap(), 2);
        assert!(db.recent(10).unwrap().is_empty());
        assert_eq!(db.clear_all().unwrap(), 0);
    }

    #[test]
    fn test_timestamps_are_stored_in_utc() {
        let db = HistoryDb::open_in_memory().unwrap();
        let c = completion("push", "2024-W10", 4);
        db.record(&c).unwrap();

        let (started, finished): (String, String) = db
            .conn
            .query_row("SELECT started_at, finished_at FROM completions", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert!(started.ends_with('Z'), "{started}");
        assert!(finished.ends_with('Z'), "{finished}");
        assert_eq!(
            DateTime::parse_from_rfc3339(&finished).unwrap(),
            c.finished_at.fixed_offset()
        );
        assert_eq!(db.recent(1).unwrap()[0], c);
    }

    #[test]
    fn test_recent_orders_by_instant() {
        let db = HistoryDb::open_in_memory().unwrap();
        let early = completion("early", "2024-W10", 4);
        let mut late = completion("late", "2024-W10", 4);
        late.finished_at = early.finished_at + Duration::seconds(1);
        db.record(&late).unwrap();
        db.record(&early).unwrap();

        let ids: Vec<String> = db.recent(10).unwrap().into_iter().map(|c| c.workout_id).collect();
        assert_eq!(ids, ["late", "early"]);
    }

    #[test]
    fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("history.db");
        {
            let db = HistoryDb::open(&path).unwrap();
            db.record(&completion("push", "2024-W10", 4)).unwrap();
        }
        let db = HistoryDb::open(&path).unwrap();
        assert_eq!(db.recent(5).unwrap().len(), 1);
    }
}
