//! Event log replay
//!
//! Session events recorded as JSON lines, one per line:
//!
//! ```text
//! {"event":"results","values":{"q":"shoe"},"results":[{"url":"https://a","title":"A"}]}
//! {"event":"click","url":"https://a"}
//! {"event":"reset"}
//! {"event":"unload"}
//! ```
//!
//! Blank lines and `#` comments are skipped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::BufRead;

use crate::pipeline::{QueryValues, ResultSet, SearchResult};
use crate::session::SearchSession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RecordedEvent {
    Results {
        #[serde(default)]
        values: Option<QueryValues>,
        #[serde(default)]
        results: Option<Vec<SearchResult>>,
    },
    Reset,
    Click {
        url: String,
    },
    Unload,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Events dispatched to the session
    pub events: usize,
    /// Events that arrived after the session unloaded
    pub skipped_after_unload: usize,
}

pub fn parse_line(line: &str) -> Result<Option<RecordedEvent>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let event = serde_json::from_str(trimmed)?;
    Ok(Some(event))
}

/// Apply one recorded event. Returns false if the session ignored it.
pub fn dispatch(session: &mut SearchSession, event: RecordedEvent) -> bool {
    match event {
        RecordedEvent::Results { values, results } => {
            session.update_results(values, results.map(ResultSet::new))
        }
        RecordedEvent::Reset => session.reset_tracking(),
        RecordedEvent::Click { url } => session.click_result(&url),
        RecordedEvent::Unload => session.unload(),
    }
}

/// Feed every event in `reader` into `session`. Does not unload the session
/// unless the log says so.
pub fn replay<R: BufRead>(reader: R, session: &mut SearchSession) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line_number = index + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_number))?;
        let Some(event) = parse_line(&line)
            .with_context(|| format!("Invalid event on line {}", line_number))?
        else {
            continue;
        };

        if dispatch(session, event) {
            summary.events += 1;
        } else {
            summary.skipped_after_unload += 1;
        }
    }

    log::info!(
        "Replayed {} events ({} after unload)",
        summary.events,
        summary.skipped_after_unload
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{Beacon, BeaconKind, RecordingSink};
    use crate::tracker::{Tracker, TrackerConfig};
    use std::io::Cursor;

    fn tracked_session() -> (SearchSession, RecordingSink) {
        let sink = RecordingSink::new();
        let mut session = SearchSession::new();
        session.attach(Box::new(Tracker::new(TrackerConfig::default(), sink.clone())));
        (session, sink)
    }

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("  # comment").unwrap(), None);
        assert_eq!(parse_line(r#"{"event":"reset"}"#).unwrap(), Some(RecordedEvent::Reset));
        assert_eq!(
            parse_line(r#"{"event":"click","url":"https://a"}"#).unwrap(),
            Some(RecordedEvent::Click {
                url: "https://a".to_string()
            })
        );
        assert_eq!(
            parse_line(r#"{"event":"results"}"#).unwrap(),
            Some(RecordedEvent::Results {
                values: None,
                results: None
            }),
            "Values and results are optional"
        );
    }

    #[test]
    fn test_parse_line_rejects_unknown_event() {
        assert!(parse_line(r#"{"event":"scroll"}"#).is_err());
    }

    #[test]
    fn test_replay_backspace_then_reset() {
        let (mut session, sink) = tracked_session();
        let log = r#"
# user types, backspaces, accepts completion, then clears the box
{"event":"results","values":{"q":"running sho"},"results":[{"url":"https://a"}]}
{"event":"results","values":{"q":"run","q.used":"running"},"results":[{"url":"https://b"}]}
{"event":"reset"}
"#;
        let summary = replay(Cursor::new(log), &mut session).unwrap();

        assert_eq!(summary.events, 3);
        assert_eq!(sink.beacons(), vec![Beacon::new(BeaconKind::BodyReset, "running sho")]);
        assert!(!session.is_unloaded(), "Replay should not unload on its own");
    }

    #[test]
    fn test_replay_counts_events_after_unload() {
        let (mut session, sink) = tracked_session();
        let log = concat!(
            r#"{"event":"results","values":{"q":"shoe"},"results":[{"url":"https://a"}]}"#,
            "\n",
            r#"{"event":"unload"}"#,
            "\n",
            r#"{"event":"click","url":"https://a"}"#,
            "\n",
        );
        let summary = replay(Cursor::new(log), &mut session).unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                events: 2,
                skipped_after_unload: 1
            }
        );
        assert_eq!(sink.beacons(), vec![Beacon::new(BeaconKind::PageClose, "shoe")]);
    }

    #[test]
    fn test_replay_demo_log() {
        let (mut session, sink) = tracked_session();
        let summary = replay(
            Cursor::new(include_str!("../demos/backspace.jsonl")),
            &mut session,
        )
        .unwrap();

        assert_eq!(summary.events, 6);
        assert!(session.is_unloaded());
        assert_eq!(
            sink.beacons(),
            vec![
                Beacon::new(BeaconKind::BodyReset, "running sho"),
                Beacon::new(BeaconKind::ResultClicked, "trail"),
            ],
            "Unload after a click has nothing left to report"
        );
    }

    #[test]
    fn test_replay_error_names_line() {
        let (mut session, _sink) = tracked_session();
        let log = "{\"event\":\"reset\"}\nnot json\n";
        let err = replay(Cursor::new(log), &mut session).unwrap_err();
        assert!(
            err.to_string().contains("line 2"),
            "Error should mention the line number: {}",
            err
        );
    }
}
