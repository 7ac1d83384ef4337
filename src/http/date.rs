//! IMF-fixdate formatting and parsing for `Last-Modified` and
//! `If-Modified-Since`.

use std::time::SystemTime;

use chrono::{DateTime, Utc};

/// Formats `time` as an IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
///
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
/// use vista::http::date::format;
///
/// let t = UNIX_EPOCH + Duration::from_secs(784111777);
/// assert_eq!(format(t), "Sun, 06 Nov 1994 08:49:37 GMT");
/// ```
pub fn format(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Parses an HTTP date. Returns `None` for anything unparseable.
pub fn parse(value: &str) -> Option<SystemTime> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|t| SystemTime::from(t.with_timezone(&Utc)))
}

/// Truncates to whole seconds, the resolution of HTTP dates.
pub fn truncate(time: SystemTime) -> SystemTime {
    let secs = DateTime::<Utc>::from(time).timestamp();
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(SystemTime::from)
        .unwrap_or(time)
}
