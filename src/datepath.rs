//! Date-partitioned path codec.
//!
//! Hot files live at `<storage_root>/<year>/<month>/<day>/<basename>.<ext>`
//! and archive containers mirror that partition at
//! `<archive_root>/<year>/<month>/<day>/<basename>.zip`. This module is the
//! single home for that shape: the selector decomposes paths to decide age
//! eligibility, the compaction engine decomposes them to derive destinations.

use chrono::NaiveDate;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Segments a hot file occupies relative to the storage root:
/// year, month, day, basename. Counting the root itself that is the
/// five-segment shape the storage layout contract describes.
const PARTITION_DEPTH: usize = 4;

/// A hot file's decomposed date partition.
///
/// The raw year/month/day strings are kept as found so that composed archive
/// paths mirror the hot tree exactly (a `3` stays `3`, never reformatted to
/// `03`); the parsed date drives the retention age policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePath {
    pub year: String,
    pub month: String,
    pub day: String,
    /// Terminal filename without its extension.
    pub basename: String,
    /// Extension of the terminal filename, without the dot, if any.
    pub extension: Option<String>,
    /// The partition parsed as a calendar date.
    pub date: NaiveDate,
}

impl DatePath {
    /// Archive-relative path of the container: `year/month/day/basename.zip`.
    pub fn archive_rel(&self) -> PathBuf {
        Path::new(&self.year)
            .join(&self.month)
            .join(&self.day)
            .join(format!("{}.zip", self.basename))
    }

    /// Name the file's bytes are stored under inside the container:
    /// the original terminal filename.
    pub fn entry_name(&self) -> String {
        match &self.extension {
            Some(ext) => format!("{}.{}", self.basename, ext),
            None => self.basename.clone(),
        }
    }
}

/// Why a path failed to decompose into the date-partition shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedPath {
    /// Wrong number of path segments (want `year/month/day/basename`).
    Depth { path: PathBuf, segments: usize },
    /// The year/month/day segments do not form a real calendar date.
    Date { path: PathBuf },
    /// A segment is not valid UTF-8.
    Encoding { path: PathBuf },
}

impl std::fmt::Display for MalformedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedPath::Depth { path, segments } => {
                write!(
                    f,
                    "path {} has {segments} segment(s), want year/month/day/basename",
                    path.display()
                )
            }
            MalformedPath::Date { path } => {
                write!(
                    f,
                    "path {} does not encode a real calendar date",
                    path.display()
                )
            }
            MalformedPath::Encoding { path } => {
                write!(f, "path {} has a non-UTF-8 segment", path.display())
            }
        }
    }
}

impl std::error::Error for MalformedPath {}

/// Decompose a storage-relative path into its date partition.
///
/// `rel` must consist of exactly year/month/day/basename segments; the
/// extension is stripped from the last segment before anything else. Any
/// other shape, a non-UTF-8 segment, or a year/month/day triple that is not
/// a real calendar date is malformed. Malformed files are never touched by
/// callers, only reported.
pub fn decompose(rel: &Path) -> Result<DatePath, MalformedPath> {
    let mut segments = Vec::with_capacity(PARTITION_DEPTH);
    for component in rel.components() {
        let Component::Normal(segment) = component else {
            // Root markers, `.` and `..` never appear in walk output;
            // anything producing them is not partition-shaped.
            return Err(MalformedPath::Depth {
                path: rel.to_path_buf(),
                segments: rel.components().count(),
            });
        };
        segments.push(segment);
    }
    if segments.len() != PARTITION_DEPTH {
        return Err(MalformedPath::Depth {
            path: rel.to_path_buf(),
            segments: segments.len(),
        });
    }

    let utf8 = |segment: &OsStr| {
        segment
            .to_str()
            .map(str::to_string)
            .ok_or_else(|| MalformedPath::Encoding {
                path: rel.to_path_buf(),
            })
    };
    let year = utf8(segments[0])?;
    let month = utf8(segments[1])?;
    let day = utf8(segments[2])?;
    let file_name = utf8(segments[3])?;

    let (basename, extension) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), Some(ext.to_string())),
        _ => (file_name, None),
    };

    let date = partition_date(&year, &month, &day).ok_or_else(|| MalformedPath::Date {
        path: rel.to_path_buf(),
    })?;

    Ok(DatePath {
        year,
        month,
        day,
        basename,
        extension,
        date,
    })
}

/// Parse raw partition segments into a calendar date, rejecting
/// out-of-range months and days (Feb 30 and friends).
fn partition_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    let day: u32 = day.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompose_well_formed() {
        let dp = decompose(Path::new("2021/05/17/recording.wav")).unwrap();
        assert_eq!(dp.year, "2021");
        assert_eq!(dp.month, "05");
        assert_eq!(dp.day, "17");
        assert_eq!(dp.basename, "recording");
        assert_eq!(dp.extension.as_deref(), Some("wav"));
        assert_eq!(dp.date, NaiveDate::from_ymd_opt(2021, 5, 17).unwrap());
    }

    #[test]
    fn test_decompose_keeps_raw_segments() {
        // Non-padded partitions must mirror as-is, never as "03"/"07".
        let dp = decompose(Path::new("2021/3/7/a.mp3")).unwrap();
        assert_eq!(dp.month, "3");
        assert_eq!(dp.day, "7");
        assert_eq!(dp.archive_rel(), PathBuf::from("2021/3/7/a.zip"));
    }

    #[test]
    fn test_decompose_multi_dot_basename() {
        let dp = decompose(Path::new("2020/12/31/band.live.take2.wav")).unwrap();
        assert_eq!(dp.basename, "band.live.take2");
        assert_eq!(dp.extension.as_deref(), Some("wav"));
        assert_eq!(dp.entry_name(), "band.live.take2.wav");
        assert_eq!(dp.archive_rel(), PathBuf::from("2020/12/31/band.live.take2.zip"));
    }

    #[test]
    fn test_decompose_no_extension() {
        let dp = decompose(Path::new("2021/05/17/readme")).unwrap();
        assert_eq!(dp.basename, "readme");
        assert_eq!(dp.extension, None);
        assert_eq!(dp.entry_name(), "readme");
    }

    #[test]
    fn test_decompose_hidden_file_has_no_extension() {
        let dp = decompose(Path::new("2021/05/17/.hidden")).unwrap();
        assert_eq!(dp.basename, ".hidden");
        assert_eq!(dp.extension, None);
    }

    #[test]
    fn test_decompose_too_shallow() {
        let err = decompose(Path::new("2021/05/a.wav")).unwrap_err();
        assert!(matches!(err, MalformedPath::Depth { segments: 3, .. }));
        assert!(err.to_string().contains("3 segment(s)"));
    }

    #[test]
    fn test_decompose_too_deep() {
        let err = decompose(Path::new("x/2021/05/17/a.wav")).unwrap_err();
        assert!(matches!(err, MalformedPath::Depth { segments: 5, .. }));
    }

    #[test]
    fn test_decompose_bare_filename() {
        let err = decompose(Path::new("a.wav")).unwrap_err();
        assert!(matches!(err, MalformedPath::Depth { segments: 1, .. }));
    }

    #[test]
    fn test_decompose_absolute_path_is_malformed() {
        let err = decompose(Path::new("/2021/05/17/a.wav")).unwrap_err();
        assert!(matches!(err, MalformedPath::Depth { .. }));
    }

    #[test]
    fn test_decompose_non_numeric_year() {
        let err = decompose(Path::new("late/05/17/a.wav")).unwrap_err();
        assert!(matches!(err, MalformedPath::Date { .. }));
    }

    #[test]
    fn test_decompose_out_of_range_date() {
        let err = decompose(Path::new("2021/13/01/a.wav")).unwrap_err();
        assert!(matches!(err, MalformedPath::Date { .. }));

        let err = decompose(Path::new("2021/02/30/a.wav")).unwrap_err();
        assert!(matches!(err, MalformedPath::Date { .. }));
    }

    #[test]
    fn test_decompose_leap_day() {
        assert!(decompose(Path::new("2020/02/29/a.wav")).is_ok());
        let err = decompose(Path::new("2021/02/29/a.wav")).unwrap_err();
        assert!(matches!(err, MalformedPath::Date { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_decompose_non_utf8_segment() {
        use std::os::unix::ffi::OsStrExt;
        let bad = OsStr::from_bytes(b"2021/05/17/a\xff.wav");
        let err = decompose(Path::new(bad)).unwrap_err();
        assert!(matches!(err, MalformedPath::Encoding { .. }));
    }

    #[test]
    fn test_archive_rel_mirrors_partition() {
        let dp = decompose(Path::new("2021/05/17/recording.wav")).unwrap();
        assert_eq!(dp.archive_rel(), PathBuf::from("2021/05/17/recording.zip"));
    }

    #[test]
    fn test_date_supports_age_math() {
        let dp = decompose(Path::new("2021/05/17/a.wav")).unwrap();
        let later = NaiveDate::from_ymd_opt(2021, 8, 15).unwrap();
        assert_eq!(later.signed_duration_since(dp.date).num_days(), 90);
    }

    #[test]
    fn test_malformed_display() {
        let err = decompose(Path::new("2021/05/17/18/a.wav")).unwrap_err();
        assert!(err.to_string().contains("want year/month/day/basename"));

        let err = decompose(Path::new("x/y/z/a.wav")).unwrap_err();
        assert!(err.to_string().contains("real calendar date"));
    }
}
