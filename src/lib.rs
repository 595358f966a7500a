//! Query tracking for search front ends.
//!
//! Watches a search session (query changes, resets, result clicks, unload)
//! and reports the user's most complete query to an analytics sink.

pub mod cli;
pub mod db;
pub mod pipeline;
pub mod replay;
pub mod session;
pub mod sink;
pub mod tracker;
pub mod worker;

pub use pipeline::{Pipeline, QueryValues, ResultSet, ResultSource, SearchResult};
pub use session::{ListenerId, SearchSession, SessionListener};
pub use sink::{Beacon, BeaconKind, BeaconSink};
pub use tracker::{QuerySnapshot, Tracker, TrackerConfig, TrackerEvent, TrackerState};
