//! Request counter and journal for a single imposter.

use super::types::{ImposterRequest, RecordedRequest};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct JournalState {
    number_of_requests: u64,
    requests: Vec<RecordedRequest>,
}

/// Counts every observed request and, when recording is enabled, keeps an
/// ordered copy of each one.
///
/// Counter and journal live behind a single lock so a reader never sees an
/// increment without its entry (or the reverse).
#[derive(Debug)]
pub struct RequestJournal {
    record_requests: bool,
    state: Mutex<JournalState>,
}

impl RequestJournal {
    pub fn new(record_requests: bool) -> Self {
        Self {
            record_requests,
            state: Mutex::new(JournalState::default()),
        }
    }

    pub fn record_requests(&self) -> bool {
        self.record_requests
    }

    /// Count a request and journal it if recording is enabled
    pub fn observe(&self, request: &ImposterRequest) {
        // Capture outside the lock; only the append needs to be atomic.
        let entry = self
            .record_requests
            .then(|| RecordedRequest::capture(request));

        let mut state = self.state.lock();
        state.number_of_requests += 1;
        if let Some(entry) = entry {
            state.requests.push(entry);
        }
    }

    pub fn number_of_requests(&self) -> u64 {
        self.state.lock().number_of_requests
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Counter and journal read under one lock
    pub fn snapshot(&self) -> (u64, Vec<RecordedRequest>) {
        let state = self.state.lock();
        (state.number_of_requests, state.requests.clone())
    }
}
