//! Candidate selection for the two compaction policies.
//!
//! Both selectors walk the hot storage tree. The emergency reclaimer wants
//! exactly one file, the oldest by the configured ordering; the retention
//! sweep wants every media file whose date partition is past the age
//! threshold. Unreadable directory entries are skipped so one bad permission
//! bit cannot stall either policy.

use crate::config::EmergencyOrder;
use crate::datepath;
use chrono::NaiveDate;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Ranking key for the emergency reclaimer. Within one scan every key is
/// the same variant, so the derived cross-variant ordering never applies.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SelectionKey {
    Name(OsString),
    Date(NaiveDate, OsString),
}

/// Pick the single oldest file under `storage_root`, or `None` when the
/// tree holds no files at all.
///
/// `Name` ranks by terminal filename alone, wherever the file sits in the
/// tree. `Date` ranks by date partition and falls back to the filename on
/// ties; files outside the partition shape cannot be ranked by date and are
/// not considered. Exact key ties break on the full path, so repeated scans
/// of an unchanged tree pick the same file.
pub fn select_oldest(storage_root: &Path, order: EmergencyOrder) -> Option<PathBuf> {
    let mut best: Option<(SelectionKey, PathBuf)> = None;
    for entry in WalkDir::new(storage_root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_os_string();
        let key = match order {
            EmergencyOrder::Name => SelectionKey::Name(name),
            EmergencyOrder::Date => {
                let rel = entry
                    .path()
                    .strip_prefix(storage_root)
                    .unwrap_or_else(|_| entry.path());
                match datepath::decompose(rel) {
                    Ok(dp) => SelectionKey::Date(dp.date, name),
                    Err(_) => continue,
                }
            }
        };
        let candidate = (key, entry.into_path());
        match &best {
            Some(current) if *current <= candidate => {}
            _ => best = Some(candidate),
        }
    }
    best.map(|(_, path)| path)
}

/// All files under `storage_root` whose extension is in `extensions` and
/// whose date partition is `threshold_days` or more before `today`.
///
/// Extensions match exactly, without the dot. Files with a matching
/// extension but a malformed path are reported and left alone; files with
/// other extensions are not the sweep's business and pass silently.
pub fn select_aged<'a>(
    storage_root: &'a Path,
    today: NaiveDate,
    threshold_days: u32,
    extensions: &'a [String],
) -> impl Iterator<Item = PathBuf> + 'a {
    WalkDir::new(storage_root)
        .into_iter()
        .filter_map(move |entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable entry");
                    return None;
                }
            };
            if !entry.file_type().is_file() {
                return None;
            }
            let ext = entry.path().extension().and_then(|e| e.to_str())?;
            if !extensions.iter().any(|want| want == ext) {
                return None;
            }
            let rel = entry
                .path()
                .strip_prefix(storage_root)
                .unwrap_or_else(|_| entry.path());
            let dp = match datepath::decompose(rel) {
                Ok(dp) => dp,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping file outside the date layout");
                    return None;
                }
            };
            if today.signed_duration_since(dp.date).num_days() >= i64::from(threshold_days) {
                Some(entry.into_path())
            } else {
                None
            }
        })
}
