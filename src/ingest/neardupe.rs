// Perceptual near-duplicate detection
//
// The second dedup stage: files that survived the cryptographic pass but
// look the same. Groups are advisory; nothing here decides what to keep,
// the report only marks the member a user would most likely want.

use log::error;
use serde::Serialize;

use super::MediaFile;
use crate::hash::{dhash_hex, hamming_distance};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearDuplicateFile {
    pub path: String,
    pub size: i64,
    pub has_exif: bool,
    pub is_candidate: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearDuplicateGroup {
    pub group_id: String,
    pub files: Vec<NearDuplicateFile>,
}

/// Group visually-similar images by dhash distance. Files without a dhash
/// (videos, undecodable images, detection disabled) never participate.
pub fn find_near_duplicates(files: &[MediaFile], threshold: u32) -> Vec<NearDuplicateGroup> {
    let mut groups = Vec::new();
    let mut processed = vec![false; files.len()];

    for i in 0..files.len() {
        if processed[i] {
            continue;
        }
        let base = match files[i].dhash {
            Some(d) => dhash_hex(d),
            None => continue,
        };

        let mut members = vec![i];
        processed[i] = true;

        for j in (i + 1)..files.len() {
            if processed[j] {
                continue;
            }
            let candidate = match files[j].dhash {
                Some(d) => dhash_hex(d),
                None => continue,
            };

            match hamming_distance(&base, &candidate) {
                Ok(distance) if distance <= threshold => {
                    members.push(j);
                    processed[j] = true;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(
                        "failed to compare {} and {}: {}",
                        files[i].path.display(),
                        files[j].path.display(),
                        e
                    );
                }
            }
        }

        if members.len() < 2 {
            continue;
        }

        let best = select_best_candidate(files, &members);
        groups.push(NearDuplicateGroup {
            group_id: format!("near-{}", groups.len() + 1),
            files: members
                .iter()
                .map(|&idx| NearDuplicateFile {
                    path: files[idx].path.to_string_lossy().to_string(),
                    size: files[idx].size,
                    has_exif: files[idx].has_exif,
                    is_candidate: idx == best,
                })
                .collect(),
        });
    }

    groups
}

/// The member worth keeping: highest pixel count, then EXIF presence,
/// then file size.
fn select_best_candidate(files: &[MediaFile], members: &[usize]) -> usize {
    let score = |idx: usize| {
        let file = &files[idx];
        let resolution =
            file.metadata.width.unwrap_or(0) * file.metadata.height.unwrap_or(0);
        (resolution, file.has_exif, file.size)
    };

    members
        .iter()
        .copied()
        .max_by_key(|&idx| score(idx))
        .unwrap_or(members[0])
}
