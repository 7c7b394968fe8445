//! Navigation seam used when a session ends mid-request

use std::sync::{Arc, Mutex};

/// Something that can move the user to another route
pub trait Navigator: Send + Sync {
    /// Replace the current location with `path`
    fn navigate(&self, path: &str);
}

/// Navigator that keeps every requested location
#[derive(Debug, Clone, Default)]
pub struct RecordingNavigator {
    history: Arc<Mutex<Vec<String>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Most recent location, if any
    pub fn current(&self) -> Option<String> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        tracing::info!(path = %path, "Navigating");
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_string());
    }
}
