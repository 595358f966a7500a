//! Search session host
//!
//! Owns the pipeline and the listeners attached to it, and dispatches the
//! four session events to every listener in attach order:
//! - results changed (after `update_results`)
//! - tracking reset
//! - result clicked
//! - unload, at most once; the session ignores everything after it

use crate::pipeline::{Pipeline, QueryValues, ResultSet, ResultSource};

pub trait SessionListener: Send {
    fn on_results_changed(&mut self, source: &dyn ResultSource);
    fn on_tracking_reset(&mut self);
    fn on_result_clicked(&mut self, url: &str);
    fn on_unload(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct SearchSession {
    pipeline: Pipeline,
    listeners: Vec<(ListenerId, Box<dyn SessionListener>)>,
    next_listener_id: u64,
    unloaded: bool,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::with_pipeline(Pipeline::new())
    }

    pub fn with_pipeline(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            listeners: Vec::new(),
            next_listener_id: 1,
            unloaded: false,
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn is_unloaded(&self) -> bool {
        self.unloaded
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Register a listener for all session events
    pub fn attach(&mut self, listener: Box<dyn SessionListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, listener));
        log::debug!("Attached listener {:?}", id);
        id
    }

    /// Unregister a listener from all session events, handing it back
    pub fn detach(&mut self, id: ListenerId) -> Option<Box<dyn SessionListener>> {
        let index = self.listeners.iter().position(|(lid, _)| *lid == id)?;
        log::debug!("Detached listener {:?}", id);
        Some(self.listeners.remove(index).1)
    }

    /// Store a new search response and notify listeners.
    /// Returns false if the session was already unloaded.
    pub fn update_results(
        &mut self,
        values: Option<QueryValues>,
        results: Option<ResultSet>,
    ) -> bool {
        if self.ignore_after_unload("results changed") {
            return false;
        }

        self.pipeline.set_query_values(values);
        self.pipeline.set_results(results);

        let pipeline = &self.pipeline;
        for (_, listener) in self.listeners.iter_mut() {
            listener.on_results_changed(pipeline);
        }
        true
    }

    pub fn reset_tracking(&mut self) -> bool {
        if self.ignore_after_unload("tracking reset") {
            return false;
        }

        for (_, listener) in self.listeners.iter_mut() {
            listener.on_tracking_reset();
        }
        true
    }

    pub fn click_result(&mut self, url: &str) -> bool {
        if self.ignore_after_unload("result clicked") {
            return false;
        }

        for (_, listener) in self.listeners.iter_mut() {
            listener.on_result_clicked(url);
        }
        true
    }

    pub fn unload(&mut self) -> bool {
        if self.ignore_after_unload("unload") {
            return false;
        }

        self.unloaded = true;
        for (_, listener) in self.listeners.iter_mut() {
            listener.on_unload();
        }
        true
    }

    fn ignore_after_unload(&self, event: &str) -> bool {
        if self.unloaded {
            log::warn!("Session already unloaded, ignoring {} event", event);
        }
        self.unloaded
    }
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::new()
    }
}
