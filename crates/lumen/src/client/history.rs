// File: src/client/history.rs
// Purpose: Session history seam for the navigator, with an in-memory implementation

use std::sync::Mutex;

use url::Url;

/// Where the navigator records URLs.
pub trait History: Send + Sync {
    /// Adds an entry for `url`.
    fn push(&self, url: &Url);

    /// Overwrites the current entry.
    fn replace(&self, url: &Url);

    /// Leaves the app for `url` with a full page load.
    fn assign(&self, url: &Url);
}

/// One recorded history operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEntry {
    Push(String),
    Replace(String),
    Assign(String),
}

/// Records every operation; useful off the browser and in tests.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.lock().clone()
    }

    pub fn last(&self) -> Option<HistoryEntry> {
        self.lock().last().cloned()
    }

    fn record(&self, entry: HistoryEntry) {
        self.lock().push(entry);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<HistoryEntry>> {
        // A poisoned log is still a usable log.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl History for MemoryHistory {
    fn push(&self, url: &Url) {
        self.record(HistoryEntry::Push(url.to_string()));
    }

    fn replace(&self, url: &Url) {
        self.record(HistoryEntry::Replace(url.to_string()));
    }

    fn assign(&self, url: &Url) {
        self.record(HistoryEntry::Assign(url.to_string()));
    }
}

impl<H: History + ?Sized> History for std::sync::Arc<H> {
    fn push(&self, url: &Url) {
        (**self).push(url)
    }

    fn replace(&self, url: &Url) {
        (**self).replace(url)
    }

    fn assign(&self, url: &Url) {
        (**self).assign(url)
    }
}
