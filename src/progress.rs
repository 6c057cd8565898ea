// Progress reporting for long-running operations
//
// One tracker per domain, constructed at startup and passed to whatever
// drives the work. All job types report through the same snapshot shape.

use std::sync::RwLock;

use serde::Serialize;

/// Phase vocabulary shared by every domain. Ingest walks the import
/// phases; the rebuild drivers use Processing/Complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Scanning,
    Hashing,
    CheckingImported,
    FindingDuplicates,
    Importing,
    ImportingComplete,
    Processing,
    Complete,
    Error,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Scanning => "scanning",
            Phase::Hashing => "hashing",
            Phase::CheckingImported => "checking_imported",
            Phase::FindingDuplicates => "finding_duplicates",
            Phase::Importing => "importing",
            Phase::ImportingComplete => "importing_complete",
            Phase::Processing => "processing",
            Phase::Complete => "complete",
            Phase::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub status: Phase,
    pub completed: usize,
    pub total: usize,
    pub percent: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self { status: Phase::Idle, completed: 0, total: 0, percent: 0, message: None }
    }
}

/// Reader/writer-locked progress state. `update` takes the writer lock,
/// `snapshot` the reader lock, so polls never block behind each other.
#[derive(Default)]
pub struct ProgressTracker {
    state: RwLock<ProgressSnapshot>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, status: Phase, completed: usize, total: usize) {
        let mut state = self.state.write().unwrap();
        *state = ProgressSnapshot {
            status,
            completed,
            total,
            percent: percent(completed, total),
            message: None,
        };
    }

    pub fn update_with_message(
        &self,
        status: Phase,
        completed: usize,
        total: usize,
        message: impl Into<String>,
    ) {
        let mut state = self.state.write().unwrap();
        *state = ProgressSnapshot {
            status,
            completed,
            total,
            percent: percent(completed, total),
            message: Some(message.into()),
        };
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.state.read().unwrap().clone()
    }
}

fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).floor() as u8
}

/// The process's progress trackers, one per background domain.
#[derive(Default)]
pub struct Trackers {
    pub import: ProgressTracker,
    pub thumbnails: ProgressTracker,
    pub bursts: ProgressTracker,
    pub groups: ProgressTracker,
    pub export: ProgressTracker,
}

impl Trackers {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let tracker = ProgressTracker::new();
        let snap = tracker.snapshot();
        assert_eq!(snap.status, Phase::Idle);
        assert_eq!(snap.percent, 0);
    }

    #[test]
    fn percent_floors() {
        let tracker = ProgressTracker::new();
        tracker.update(Phase::Hashing, 1, 3);
        assert_eq!(tracker.snapshot().percent, 33);

        tracker.update(Phase::Hashing, 2, 3);
        assert_eq!(tracker.snapshot().percent, 66);

        tracker.update(Phase::Hashing, 3, 3);
        assert_eq!(tracker.snapshot().percent, 100);
    }

    #[test]
    fn zero_total_is_zero_percent() {
        let tracker = ProgressTracker::new();
        tracker.update(Phase::Scanning, 250, 0);
        assert_eq!(tracker.snapshot().percent, 0);
        assert_eq!(tracker.snapshot().completed, 250);
    }

    #[test]
    fn message_passes_through() {
        let tracker = ProgressTracker::new();
        tracker.update_with_message(Phase::Importing, 1, 2, "IMG_0001.jpg");
        assert_eq!(tracker.snapshot().message.as_deref(), Some("IMG_0001.jpg"));
        // A plain update clears it
        tracker.update(Phase::Importing, 2, 2);
        assert_eq!(tracker.snapshot().message, None);
    }

    #[test]
    fn updates_visible_across_threads() {
        let tracker = std::sync::Arc::new(ProgressTracker::new());
        let t2 = tracker.clone();
        std::thread::spawn(move || t2.update(Phase::Processing, 50, 100))
            .join()
            .unwrap();
        assert_eq!(tracker.snapshot().percent, 50);
    }
}
