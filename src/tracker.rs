//! Query tracking - decides what query text to report and when
//!
//! The tracker watches a search session and reports the user's query to an
//! analytics sink at three points:
//! - the page/session is closing (`PageClose`)
//! - the query context was reset (`BodyReset`)
//! - a result was clicked (`ResultClicked`)
//!
//! Between reports it remembers the *longest* raw query typed since the last
//! report, paired with the autocompletion that was in effect at the time.
//! While the user backspaces, the autocompleted text can get longer than what
//! they typed; keying on raw length means the reset report carries what the
//! user actually entered.
//!
//! Example:
//! - User types "running sho", then backspaces to "run" which completes to "running"
//! - Clicking a result reports "running" (the current body)
//! - Clearing the box instead reports "running sho" (the longest body)

use crate::pipeline::{QueryValues, ResultSource};
use crate::session::SessionListener;
use crate::sink::{Beacon, BeaconKind, BeaconSink};

pub const DEFAULT_RAW_FIELD: &str = "q";
pub const DEFAULT_COMPLETED_FIELD: &str = "q.used";

/// Which query-value keys hold the typed text and the autocompleted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub raw_field: String,
    pub completed_field: String,
}

impl TrackerConfig {
    pub fn new(raw_field: impl Into<String>, completed_field: impl Into<String>) -> Self {
        Self {
            raw_field: raw_field.into(),
            completed_field: completed_field.into(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_RAW_FIELD, DEFAULT_COMPLETED_FIELD)
    }
}

/// The query text as of the latest search response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySnapshot {
    pub raw_body: String,
    /// None when the completed field is missing or empty
    pub completed_body: Option<String>,
}

impl QuerySnapshot {
    pub fn new(raw_body: impl Into<String>, completed_body: Option<String>) -> Self {
        Self {
            raw_body: raw_body.into(),
            completed_body: completed_body.filter(|s| !s.is_empty()),
        }
    }

    /// Missing fields read as empty
    pub fn from_values(values: Option<&QueryValues>, config: &TrackerConfig) -> Self {
        let field = |name: &str| values.and_then(|v| v.get(name)).cloned();
        Self::new(
            field(&config.raw_field).unwrap_or_default(),
            field(&config.completed_field),
        )
    }

    /// Completed body if present, else the raw body
    pub fn report_body(&self) -> &str {
        self.completed_body.as_deref().unwrap_or(&self.raw_body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    ResultsChanged {
        /// A non-empty result set was present
        has_results: bool,
        snapshot: QuerySnapshot,
    },
    Unload,
    TrackingReset,
    ResultClicked {
        url: String,
    },
}

/// Tracking state for one search session.
///
/// Invariant: the longest-body fields are cleared together, and only by a
/// reset or click report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerState {
    enabled: bool,
    current_report_body: String,
    longest_raw_body: String,
    longest_completed_body: String,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A successful search has been seen since the last report
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn current_report_body(&self) -> &str {
        &self.current_report_body
    }

    pub fn longest_raw_body(&self) -> &str {
        &self.longest_raw_body
    }

    pub fn longest_completed_body(&self) -> &str {
        &self.longest_completed_body
    }

    /// Apply one event, returning the beacon to send (if any)
    pub fn apply(&mut self, event: &TrackerEvent) -> Option<Beacon> {
        match event {
            TrackerEvent::ResultsChanged {
                has_results,
                snapshot,
            } => {
                self.results_changed(*has_results, snapshot);
                None
            }
            TrackerEvent::Unload => self.unload(),
            TrackerEvent::TrackingReset => self.tracking_reset(),
            TrackerEvent::ResultClicked { .. } => self.result_clicked(),
        }
    }

    fn results_changed(&mut self, has_results: bool, snapshot: &QuerySnapshot) {
        // Only a report turns this back off
        if has_results {
            self.enabled = true;
        }

        // Ties go to the newer body
        if query_len(&snapshot.raw_body) >= query_len(&self.longest_raw_body) {
            self.longest_raw_body = snapshot.raw_body.clone();
            self.longest_completed_body = snapshot.completed_body.clone().unwrap_or_default();
        }

        self.current_report_body = snapshot.report_body().to_string();
    }

    fn unload(&mut self) -> Option<Beacon> {
        if !self.enabled || self.current_report_body.is_empty() {
            return None;
        }

        // Longest bodies are left alone, the session is over
        self.enabled = false;
        Some(Beacon::new(BeaconKind::PageClose, self.current_report_body.clone()))
    }

    fn tracking_reset(&mut self) -> Option<Beacon> {
        if !self.enabled {
            return None;
        }

        let text = if self.longest_completed_body.is_empty() {
            std::mem::take(&mut self.longest_raw_body)
        } else {
            std::mem::take(&mut self.longest_completed_body)
        };
        self.clear_longest();
        self.enabled = false;
        Some(Beacon::new(BeaconKind::BodyReset, text))
    }

    fn result_clicked(&mut self) -> Option<Beacon> {
        if !self.enabled || self.current_report_body.is_empty() {
            return None;
        }

        self.clear_longest();
        self.enabled = false;
        Some(Beacon::new(BeaconKind::ResultClicked, self.current_report_body.clone()))
    }

    fn clear_longest(&mut self) {
        self.longest_raw_body.clear();
        self.longest_completed_body.clear();
    }
}

/// Query length in UTF-16 code units, the unit browsers report for input text
fn query_len(body: &str) -> usize {
    body.encode_utf16().count()
}

/// Tracker bound to a sink. Attach it to a `SearchSession` to receive events.
pub struct Tracker<S: BeaconSink> {
    config: TrackerConfig,
    state: TrackerState,
    sink: S,
}

impl<S: BeaconSink> Tracker<S> {
    pub fn new(config: TrackerConfig, sink: S) -> Self {
        Self {
            config,
            state: TrackerState::new(),
            sink,
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn on_results_changed(&mut self, source: &dyn ResultSource) {
        let has_results = source.results().is_some_and(|r| !r.is_empty());
        let snapshot = QuerySnapshot::from_values(source.query_values(), &self.config);
        log::trace!(
            "Results changed: has_results={} raw={:?} completed={:?}",
            has_results,
            snapshot.raw_body,
            snapshot.completed_body
        );
        self.handle(TrackerEvent::ResultsChanged {
            has_results,
            snapshot,
        });
    }

    pub fn on_unload(&mut self) {
        self.handle(TrackerEvent::Unload);
    }

    pub fn on_tracking_reset(&mut self) {
        self.handle(TrackerEvent::TrackingReset);
    }

    pub fn on_result_clicked(&mut self, url: &str) {
        log::debug!("Result clicked: {}", url);
        self.handle(TrackerEvent::ResultClicked {
            url: url.to_string(),
        });
    }

    fn handle(&mut self, event: TrackerEvent) {
        match self.state.apply(&event) {
            Some(beacon) => {
                log::debug!("Sending {} beacon: {:?}", beacon.kind, beacon.text);
                self.sink.deliver(&beacon);
            }
            None => {
                if !matches!(event, TrackerEvent::ResultsChanged { .. }) {
                    log::debug!("Nothing to report for {:?}", event);
                }
            }
        }
    }
}

impl<S: BeaconSink> SessionListener for Tracker<S> {
    fn on_results_changed(&mut self, source: &dyn ResultSource) {
        Tracker::on_results_changed(self, source)
    }

    fn on_tracking_reset(&mut self) {
        Tracker::on_tracking_reset(self)
    }

    fn on_result_clicked(&mut self, url: &str) {
        Tracker::on_result_clicked(self, url)
    }

    fn on_unload(&mut self) {
        Tracker::on_unload(self)
    }
}
