//! Free-space probe for the pressure reclaimer.

use std::io;
use std::path::Path;

/// Fraction of the filesystem holding `path` that is still free,
/// in `0.0..=1.0`. A filesystem reporting zero total bytes counts as
/// unpressured rather than dividing by zero.
pub fn free_ratio(path: &Path) -> io::Result<f64> {
    let total = fs2::total_space(path)?;
    if total == 0 {
        return Ok(1.0);
    }
    let available = fs2::available_space(path)?;
    Ok(available as f64 / total as f64)
}

/// Whether the filesystem holding `path` is under space pressure,
/// i.e. its free fraction has dropped below `threshold`.
pub fn is_under_pressure(path: &Path, threshold: f64) -> io::Result<bool> {
    Ok(free_ratio(path)? < threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_ratio_in_unit_range() {
        let dir = tempfile::tempdir().unwrap();
        let ratio = free_ratio(dir.path()).unwrap();
        assert!((0.0..=1.0).contains(&ratio), "ratio {ratio} out of range");
    }

    #[test]
    fn test_threshold_zero_never_fires() {
        // ratio < 0.0 is impossible, so a zero threshold disables the policy.
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_under_pressure(dir.path(), 0.0).unwrap());
    }

    #[test]
    fn test_threshold_above_one_always_fires() {
        let dir = tempfile::tempdir().unwrap();
        assert!(is_under_pressure(dir.path(), 2.0).unwrap());
    }

    #[test]
    fn test_missing_path_errors() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("no-such-dir");
        assert!(free_ratio(&gone).is_err());
        assert!(is_under_pressure(&gone, 0.1).is_err());
    }
}
