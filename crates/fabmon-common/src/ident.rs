//! Sequential occurrence identifier allocation.
//!
//! Occurrence ids are human-readable and strictly increasing:
//! `ALM{major:02}-{minor:03}` with major in 1..=99 and minor in 1..=999.
//! The minor counter rolls over into the major; exhausting `ALM99-999`
//! is a hard stop. Allocation reads the id of the most recently created
//! occurrence across all configurations, so callers must serialize
//! read-and-insert (the storage layer does both inside one transaction).

/// The id assigned when there is no usable predecessor.
pub const FIRST_ID: &str = "ALM01-001";

const MAJOR_MAX: u32 = 99;
const MINOR_MAX: u32 = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The id space ends at `ALM99-999`; the allocator never wraps.
    #[error("occurrence id space exhausted (ALM99-999)")]
    LimitReached,
}

/// Parses `ALM{major:02}-{minor:03}` into `(major, minor)`. Returns `None`
/// for anything that does not match the pattern exactly, including ids
/// with out-of-range counters.
pub fn parse_id(id: &str) -> Option<(u32, u32)> {
    let rest = id.strip_prefix("ALM")?;
    let (major, minor) = rest.split_once('-')?;
    if major.len() != 2 || minor.len() != 3 {
        return None;
    }
    if !major.bytes().all(|b| b.is_ascii_digit()) || !minor.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let major: u32 = major.parse().ok()?;
    let minor: u32 = minor.parse().ok()?;
    if !(1..=MAJOR_MAX).contains(&major) || !(1..=MINOR_MAX).contains(&minor) {
        return None;
    }
    Some((major, minor))
}

pub fn format_id(major: u32, minor: u32) -> String {
    format!("ALM{major:02}-{minor:03}")
}

/// Returns the id following `last`.
///
/// `None` (no occurrence ever created) and unparsable legacy ids both
/// restart the sequence at [`FIRST_ID`]. A valid predecessor increments
/// the minor counter, rolling into the major on overflow; a predecessor
/// already at `ALM99-999` yields [`IdError::LimitReached`].
pub fn next_id(last: Option<&str>) -> Result<String, IdError> {
    let Some(last) = last else {
        return Ok(FIRST_ID.to_string());
    };
    let Some((major, minor)) = parse_id(last) else {
        return Ok(FIRST_ID.to_string());
    };
    if minor < MINOR_MAX {
        Ok(format_id(major, minor + 1))
    } else if major < MAJOR_MAX {
        Ok(format_id(major + 1, 1))
    } else {
        Err(IdError::LimitReached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_fresh_without_predecessor() {
        assert_eq!(next_id(None).unwrap(), "ALM01-001");
    }

    #[test]
    fn restarts_on_legacy_format() {
        for legacy in ["OCC-123", "ALM1-001", "ALM01_001", "ALM01-1000", "", "ALM00-001"] {
            assert_eq!(next_id(Some(legacy)).unwrap(), "ALM01-001", "input {legacy:?}");
        }
    }

    #[test]
    fn increments_minor() {
        assert_eq!(next_id(Some("ALM01-001")).unwrap(), "ALM01-002");
        assert_eq!(next_id(Some("ALM07-041")).unwrap(), "ALM07-042");
    }

    #[test]
    fn minor_overflow_rolls_into_major() {
        assert_eq!(next_id(Some("ALM01-999")).unwrap(), "ALM02-001");
        assert_eq!(next_id(Some("ALM98-999")).unwrap(), "ALM99-001");
    }

    #[test]
    fn exhaustion_is_an_error_not_a_wrap() {
        assert_eq!(next_id(Some("ALM99-999")), Err(IdError::LimitReached));
    }

    #[test]
    fn sequence_is_strictly_increasing() {
        let mut last = FIRST_ID.to_string();
        for _ in 0..2500 {
            let next = next_id(Some(&last)).unwrap();
            assert!(
                parse_id(&next).unwrap() > parse_id(&last).unwrap(),
                "{next} not greater than {last}"
            );
            last = next;
        }
    }
}
