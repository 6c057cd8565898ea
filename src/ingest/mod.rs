// Ingest pipeline module
//
// scan -> hash -> dedup -> transfer -> index. The driver thread owns every
// database write; workers only annotate file records.

pub mod compute;
pub mod neardupe;
pub mod pipeline;
pub mod scan;
pub mod transfer;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::exif::PhotoMetadata;

pub use pipeline::{run_ingest, IngestOptions};

/// One media file moving through the pipeline. The scanner fills the
/// filesystem facts; the compute workers annotate the rest in place.
#[derive(Debug, Clone, Default)]
pub struct MediaFile {
    pub path: PathBuf,
    pub size: i64,
    pub file_created_at: Option<DateTime<Utc>>,
    pub file_modified_at: Option<DateTime<Utc>>,

    /// Empty after compute means the hash failed and the file is dropped
    /// from the batch. Errors never cross the worker boundary.
    pub sha256: String,
    pub dhash: Option<u64>,
    pub has_exif: bool,
    pub metadata: PhotoMetadata,
}

impl MediaFile {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// One member of a byte-identical set found within the batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateFile {
    pub path: String,
    pub size: i64,
    pub has_exif: bool,
    pub is_candidate: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub hash: String,
    pub files: Vec<DuplicateFile>,
}

/// The outcome of one ingest run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    pub import_path: String,
    pub total_scanned: usize,
    pub already_imported: usize,
    pub unique_files: usize,
    pub duplicate_groups: usize,
    pub duplicates_removed: usize,
    pub moved_to_library: usize,
    pub error_count: usize,
    pub duplicates: Vec<DuplicateGroup>,
    /// Advisory: batch members that look alike without being byte-identical.
    pub near_duplicates: Vec<neardupe::NearDuplicateGroup>,
}
