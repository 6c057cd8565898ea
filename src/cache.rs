// ETag versions for derived views
//
// The transport layer turns these integers into HTTP ETags; the engine's
// contract is only that curation and ingest completion bump them. Versions
// seed from the Unix clock and invalidate to max(version + 1, now), so they
// stay strictly monotonic even when several invalidations land within one
// second or the clock steps backwards.

use std::sync::RwLock;
use std::time::{SystemTime, UNIX_EPOCH};

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub struct EtagVersion {
    version: RwLock<i64>,
}

impl Default for EtagVersion {
    fn default() -> Self {
        Self::new()
    }
}

impl EtagVersion {
    pub fn new() -> Self {
        Self { version: RwLock::new(unix_now()) }
    }

    pub fn get(&self) -> i64 {
        *self.version.read().unwrap()
    }

    pub fn invalidate(&self) {
        let mut version = self.version.write().unwrap();
        *version = (*version + 1).max(unix_now());
    }
}

/// The derived-view namespaces the engine invalidates.
#[derive(Default)]
pub struct EtagRegistry {
    pub calendar: EtagVersion,
    pub filters: EtagVersion,
}

impl EtagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Curation changes what both derived views would render.
    pub fn invalidate_on_curation(&self) {
        self.calendar.invalidate();
        self.filters.invalidate();
    }

    /// So does new content arriving.
    pub fn invalidate_on_import(&self) {
        self.calendar.invalidate();
        self.filters.invalidate();
    }
}
