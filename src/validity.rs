//! Certificate validity window computation.

use anyhow::{anyhow, Result};
use openssl::asn1::Asn1Time;
use std::time::{SystemTime, UNIX_EPOCH};

const SECONDS_PER_DAY: i64 = 86_400;

/// Compute a `(notBefore, notAfter)` pair spanning exactly `days` days.
///
/// Both bounds derive from a single captured timestamp, so the window length
/// is exact regardless of when within a second the call lands.
pub fn validity_window(days: u32) -> Result<(Asn1Time, Asn1Time)> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow!("System clock is before the Unix epoch: {}", e))?
        .as_secs() as i64;

    let not_before =
        Asn1Time::from_unix(now).map_err(|e| anyhow!("Failed to create not_before: {}", e))?;
    let not_after = Asn1Time::from_unix(now + i64::from(days) * SECONDS_PER_DAY)
        .map_err(|e| anyhow!("Failed to create not_after: {}", e))?;

    Ok((not_before, not_after))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_exact() {
        let (not_before, not_after) = validity_window(365).unwrap();

        let diff = not_before.diff(&not_after).unwrap();
        assert_eq!(diff.days, 365);
        assert_eq!(diff.secs, 0);
    }

    #[test]
    fn test_zero_day_window() {
        let (not_before, not_after) = validity_window(0).unwrap();

        let diff = not_before.diff(&not_after).unwrap();
        assert_eq!(diff.days, 0);
        assert_eq!(diff.secs, 0);
    }
}
