use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::sink::{Beacon, BeaconKind};

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: String,
    /// Where the events came from (replay file path, "stdin", ...)
    pub source: String,
    pub raw_field: String,
    pub completed_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBeacon {
    pub id: i64,
    pub timestamp: i64,
    pub session_id: String,
    pub beacon: Beacon,
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {:?}", db_path))?;

        // Several replays may write to the same store
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )?;

        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS beacons (
                id INTEGER PRIMARY KEY,
                timestamp INTEGER NOT NULL,
                session_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                text TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                raw_field TEXT NOT NULL,
                completed_field TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(Database { conn })
    }

    pub fn get_db_path(data_dir: &Path) -> PathBuf {
        data_dir.join("beacons.db")
    }

    pub fn log_session(&self, session: &SessionInfo) -> Result<()> {
        let timestamp = jiff::Timestamp::now().as_second();

        self.conn.execute(
            "INSERT OR REPLACE INTO sessions (session_id, source, raw_field, completed_field, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &session.session_id,
                &session.source,
                &session.raw_field,
                &session.completed_field,
                timestamp
            ],
        )?;

        Ok(())
    }

    pub fn log_beacon(&self, session_id: &str, kind: BeaconKind, text: &str) -> Result<()> {
        let timestamp = jiff::Timestamp::now().as_second();

        self.conn.execute(
            "INSERT INTO beacons (timestamp, session_id, kind, text) VALUES (?1, ?2, ?3, ?4)",
            params![timestamp, session_id, kind.as_ref(), text],
        )?;

        Ok(())
    }

    /// Most recent beacons first
    pub fn recent_beacons(&self, limit: usize) -> Result<Vec<StoredBeacon>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, session_id, kind, text
             FROM beacons
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let beacons = stmt
            .query_map([limit as i64], |row| {
                let kind_str: String = row.get(3)?;
                let kind = BeaconKind::from_str(&kind_str).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(StoredBeacon {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    session_id: row.get(2)?,
                    beacon: Beacon::new(kind, row.get::<_, String>(4)?),
                })
            })?
            .collect::<Result<Vec<StoredBeacon>, _>>()?;

        Ok(beacons)
    }

    pub fn summarize_beacons(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, COUNT(*) as count
             FROM beacons
             GROUP BY kind
             ORDER BY count DESC, kind ASC",
        )?;

        let summary = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<(String, i64)>, _>>()?;

        Ok(summary)
    }

    pub fn session_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_path() {
        assert_eq!(
            Database::get_db_path(Path::new("/tmp/data")),
            PathBuf::from("/tmp/data/beacons.db")
        );
    }

    #[test]
    fn test_summarize_counts_per_kind() {
        let db = Database::open_in_memory().unwrap();
        db.log_beacon("s", BeaconKind::ResultClicked, "a").unwrap();
        db.log_beacon("s", BeaconKind::ResultClicked, "b").unwrap();
        db.log_beacon("s", BeaconKind::PageClose, "c").unwrap();

        let summary = db.summarize_beacons().unwrap();
        assert_eq!(
            summary,
            vec![
                ("result_clicked".to_string(), 2),
                ("page_close".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_recent_beacons_respects_limit() {
        let db = Database::open_in_memory().unwrap();
        for text in ["one", "two", "three"] {
            db.log_beacon("s", BeaconKind::BodyReset, text).unwrap();
        }

        let recent = db.recent_beacons(2).unwrap();
        let texts: Vec<&str> = recent.iter().map(|b| b.beacon.text.as_str()).collect();
        assert_eq!(texts, vec!["three", "two"], "Newest beacons should come first");
    }

    #[test]
    fn test_log_session_is_idempotent_per_id() {
        let db = Database::open_in_memory().unwrap();
        let info = SessionInfo {
            session_id: "abc".to_string(),
            source: "events.jsonl".to_string(),
            raw_field: "q".to_string(),
            completed_field: "q.used".to_string(),
        };
        db.log_session(&info).unwrap();
        db.log_session(&info).unwrap();
        assert_eq!(db.session_count().unwrap(), 1);
    }
}
