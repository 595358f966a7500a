//! Analytics sinks - where tracked-query beacons go
//!
//! A sink receives one of three beacon kinds, each carrying the query text
//! the tracker decided to report. Delivery is fire-and-forget: sinks never
//! report failure back to the tracker. A sink that can fail (the database
//! sink) logs the error and moves on.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::db::Database;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::AsRefStr,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BeaconKind {
    /// The page (or host session) is going away
    PageClose,
    /// The query context was reset, e.g. the search box was cleared
    BodyReset,
    /// The user activated a search result
    ResultClicked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    pub kind: BeaconKind,
    pub text: String,
}

impl Beacon {
    pub fn new(kind: BeaconKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

pub trait BeaconSink: Send {
    fn on_page_close(&mut self, text: &str);
    fn on_body_reset(&mut self, text: &str);
    fn on_result_clicked(&mut self, text: &str);

    /// Route a beacon to the matching operation
    fn deliver(&mut self, beacon: &Beacon) {
        match beacon.kind {
            BeaconKind::PageClose => self.on_page_close(&beacon.text),
            BeaconKind::BodyReset => self.on_body_reset(&beacon.text),
            BeaconKind::ResultClicked => self.on_result_clicked(&beacon.text),
        }
    }
}

impl<S: BeaconSink + ?Sized> BeaconSink for Box<S> {
    fn on_page_close(&mut self, text: &str) {
        (**self).on_page_close(text)
    }

    fn on_body_reset(&mut self, text: &str) {
        (**self).on_body_reset(text)
    }

    fn on_result_clicked(&mut self, text: &str) {
        (**self).on_result_clicked(text)
    }
}

impl<S: BeaconSink + ?Sized> BeaconSink for &mut S {
    fn on_page_close(&mut self, text: &str) {
        (**self).on_page_close(text)
    }

    fn on_body_reset(&mut self, text: &str) {
        (**self).on_body_reset(text)
    }

    fn on_result_clicked(&mut self, text: &str) {
        (**self).on_result_clicked(text)
    }
}

/// Drops every beacon
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl BeaconSink for NoopSink {
    fn on_page_close(&mut self, _text: &str) {}
    fn on_body_reset(&mut self, _text: &str) {}
    fn on_result_clicked(&mut self, _text: &str) {}
}

/// Keeps beacons in memory. Clones share the same buffer, so a test (or the
/// CLI) can hand one clone to a tracker and read beacons through another.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    beacons: Arc<Mutex<Vec<Beacon>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn beacons(&self) -> Vec<Beacon> {
        self.beacons
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drain recorded beacons
    pub fn take(&self) -> Vec<Beacon> {
        std::mem::take(
            &mut *self
                .beacons
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    fn push(&self, kind: BeaconKind, text: &str) {
        self.beacons
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Beacon::new(kind, text));
    }
}

impl BeaconSink for RecordingSink {
    fn on_page_close(&mut self, text: &str) {
        self.push(BeaconKind::PageClose, text);
    }

    fn on_body_reset(&mut self, text: &str) {
        self.push(BeaconKind::BodyReset, text);
    }

    fn on_result_clicked(&mut self, text: &str) {
        self.push(BeaconKind::ResultClicked, text);
    }
}

/// Writes each beacon to the application log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl BeaconSink for LogSink {
    fn on_page_close(&mut self, text: &str) {
        log::info!("beacon page_close: {:?}", text);
    }

    fn on_body_reset(&mut self, text: &str) {
        log::info!("beacon body_reset: {:?}", text);
    }

    fn on_result_clicked(&mut self, text: &str) {
        log::info!("beacon result_clicked: {:?}", text);
    }
}

/// Stores beacons in the local beacon database
pub struct DbSink {
    db: Database,
    session_id: String,
}

impl DbSink {
    pub fn new(db: Database, session_id: String) -> Self {
        Self { db, session_id }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn store(&mut self, kind: BeaconKind, text: &str) {
        if let Err(e) = self.db.log_beacon(&self.session_id, kind, text) {
            log::error!("Failed to store {} beacon: {:#}", kind, e);
        }
    }
}

impl BeaconSink for DbSink {
    fn on_page_close(&mut self, text: &str) {
        self.store(BeaconKind::PageClose, text);
    }

    fn on_body_reset(&mut self, text: &str) {
        self.store(BeaconKind::BodyReset, text);
    }

    fn on_result_clicked(&mut self, text: &str) {
        self.store(BeaconKind::ResultClicked, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_beacon_kind_names() {
        let names: Vec<String> = BeaconKind::iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["page_close", "body_reset", "result_clicked"]);
        assert_eq!(
            BeaconKind::from_str("body_reset").ok(),
            Some(BeaconKind::BodyReset)
        );
    }

    #[test]
    fn test_deliver_routes_by_kind() {
        let mut sink = RecordingSink::new();
        sink.deliver(&Beacon::new(BeaconKind::ResultClicked, "shoe"));
        sink.deliver(&Beacon::new(BeaconKind::PageClose, "boot"));
        assert_eq!(
            sink.beacons(),
            vec![
                Beacon::new(BeaconKind::ResultClicked, "shoe"),
                Beacon::new(BeaconKind::PageClose, "boot"),
            ]
        );
    }

    #[test]
    fn test_recording_sink_clones_share_buffer() {
        let reader = RecordingSink::new();
        let mut writer: Box<dyn BeaconSink> = Box::new(reader.clone());
        writer.on_body_reset("running");
        assert_eq!(reader.take(), vec![Beacon::new(BeaconKind::BodyReset, "running")]);
        assert!(reader.beacons().is_empty(), "Take should drain the buffer");
    }

    #[test]
    fn test_db_sink_stores_beacons() {
        let db = Database::open_in_memory().unwrap();
        let mut sink = DbSink::new(db, "session-1".to_string());
        sink.on_page_close("shoe");
        sink.on_result_clicked("boot");

        let stored = sink.database().recent_beacons(10).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].beacon, Beacon::new(BeaconKind::ResultClicked, "boot"));
        assert_eq!(stored[1].beacon, Beacon::new(BeaconKind::PageClose, "shoe"));
        assert_eq!(stored[0].session_id, "session-1");
    }

    #[test]
    fn test_noop_sink_accepts_everything() {
        let mut sink = NoopSink;
        sink.deliver(&Beacon::new(BeaconKind::PageClose, "anything"));
    }
}
