//! Order-reference normalization
//!
//! Order references arrive as `PREFIX/YY` or `PREFIX/YYYY` and are stored in
//! the canonical `PREFIX/YYYY` form. Two-digit years expand around a pivot:
//! below 50 lands in the 2000s, 50 and above in the 1900s.

use crate::error::HistoryError;

/// Two-digit years below this expand into the 2000s
const YEAR_PIVOT: u32 = 50;

/// Inclusive bounds for explicit years
const YEAR_MIN: u32 = 1900;
const YEAR_MAX: u32 = 2100;

/// Normalize a raw order reference to `PREFIX/YYYY`.
///
/// Whitespace-trimmed empty input means "no reference" and returns `None`.
/// Anything else must consist of a non-empty prefix without whitespace, a
/// final slash, and a 2-4 digit year.
pub fn normalize(raw: &str) -> Result<Option<String>, HistoryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let invalid = |reason: &str| HistoryError::InvalidOrderReference {
        reference: trimmed.to_string(),
        reason: reason.to_string(),
    };

    let (prefix, year_part) = trimmed
        .rsplit_once('/')
        .ok_or_else(|| invalid("expected PREFIX/YYYY"))?;

    if prefix.is_empty() || prefix.chars().any(char::is_whitespace) {
        return Err(invalid("expected PREFIX/YYYY"));
    }

    if year_part.len() < 2
        || year_part.len() > 4
        || !year_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid("expected PREFIX/YYYY"));
    }

    let digits: u32 = year_part
        .parse()
        .map_err(|_| invalid("expected PREFIX/YYYY"))?;

    let year = if year_part.len() == 2 {
        if digits < YEAR_PIVOT {
            2000 + digits
        } else {
            1900 + digits
        }
    } else {
        if !(YEAR_MIN..=YEAR_MAX).contains(&digits) {
            return Err(invalid("year out of range"));
        }
        digits
    };

    Ok(Some(format!("{}/{}", prefix, year)))
}
