//! Session worker thread
//!
//! Hosts that produce session events on several threads send them here. One
//! thread owns the `SearchSession` and handles requests in arrival order, so
//! listeners never run concurrently.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use crate::pipeline::{QueryValues, ResultSet};
use crate::session::SearchSession;

#[derive(Debug, Clone)]
pub enum SessionRequest {
    UpdateResults {
        values: Option<QueryValues>,
        results: Option<ResultSet>,
    },
    ResetTracking,
    ClickResult {
        url: String,
    },
    Unload,
}

/// Move `session` onto its own thread.
///
/// The thread exits after handling `Unload`, or once every sender is
/// dropped, and hands the session back through the join handle.
pub fn spawn(session: SearchSession) -> (Sender<SessionRequest>, JoinHandle<SearchSession>) {
    let (request_tx, request_rx) = mpsc::channel::<SessionRequest>();
    let handle = std::thread::spawn(move || worker_thread_loop(request_rx, session));
    (request_tx, handle)
}

fn worker_thread_loop(
    request_rx: Receiver<SessionRequest>,
    mut session: SearchSession,
) -> SearchSession {
    while let Ok(request) = request_rx.recv() {
        match request {
            SessionRequest::UpdateResults { values, results } => {
                session.update_results(values, results);
            }
            SessionRequest::ResetTracking => {
                session.reset_tracking();
            }
            SessionRequest::ClickResult { url } => {
                session.click_result(&url);
            }
            SessionRequest::Unload => {
                session.unload();
                log::info!("Session worker: unloaded, exiting");
                return session;
            }
        }
    }

    log::info!("Session worker: request channel closed, exiting");
    session
}
