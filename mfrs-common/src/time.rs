//! Timestamp utilities

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

/// Date format used by REDCap date fields
pub const REDCAP_DATE_FORMAT: &str = "%Y-%m-%d";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse a `YYYY-MM-DD` date as local midnight
///
/// Returns `None` for malformed dates and for midnights that do not exist
/// in the local timezone.
pub fn parse_local_date(value: &str) -> Option<DateTime<Local>> {
    let date = NaiveDate::parse_from_str(value, REDCAP_DATE_FORMAT).ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Local.from_local_datetime(&midnight).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // After 2000-01-01 00:00:00 UTC
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_parse_local_date_is_local_midnight() {
        let parsed = parse_local_date("2015-12-07").expect("valid date");
        assert_eq!(parsed, Local.with_ymd_and_hms(2015, 12, 7, 0, 0, 0).unwrap());
        assert_eq!(parsed.hour(), 0);
        assert_eq!(parsed.minute(), 0);
    }

    #[test]
    fn test_parse_local_date_rejects_malformed() {
        assert!(parse_local_date("").is_none());
        assert!(parse_local_date("12/07/2015").is_none());
        assert!(parse_local_date("2015-13-01").is_none());
        assert!(parse_local_date("2015-02-30").is_none());
        assert!(parse_local_date("2015-12-07T00:00:00").is_none());
    }
}
