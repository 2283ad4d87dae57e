//! Change-notification hook for external display integrations.
//!
//! After any mutation that changes a kid's visible points or today's routine
//! state, the services call `display_state_changed` with that kid's id. An
//! e-paper push integration (or any other renderer) subscribes by providing
//! its own implementation; the core never renders or speaks a device
//! protocol itself.

use std::sync::{Arc, Mutex};

pub trait DisplayNotifier: Send + Sync {
    fn display_state_changed(&self, kid_id: &str);
}

/// Default notifier that drops all notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl DisplayNotifier for NoopNotifier {
    fn display_state_changed(&self, _kid_id: &str) {}
}

/// Notifier that records every notification, for tests and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notified: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notified_kids(&self) -> Vec<String> {
        self.notified.lock().unwrap().clone()
    }
}

impl DisplayNotifier for RecordingNotifier {
    fn display_state_changed(&self, kid_id: &str) {
        self.notified.lock().unwrap().push(kid_id.to_string());
    }
}
