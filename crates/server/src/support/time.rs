#![forbid(unsafe_code)]

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub(crate) fn now_ms_i64() -> i64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    let ms = nanos / 1_000_000i128;
    if ms <= 0 {
        0
    } else if ms >= i64::MAX as i128 {
        i64::MAX
    } else {
        ms as i64
    }
}

pub(crate) fn ts_ms_to_rfc3339(ts_ms: i64) -> String {
    let nanos = (ts_ms as i128) * 1_000_000i128;
    let dt = OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH);
    dt.format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Accepts epoch milliseconds or an RFC 3339 string.
pub(crate) fn parse_ts_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(raw) => {
            let raw = raw.trim();
            if let Ok(ms) = raw.parse::<i64>() {
                return Some(ms);
            }
            let dt = OffsetDateTime::parse(raw, &Rfc3339).ok()?;
            i64::try_from(dt.unix_timestamp_nanos() / 1_000_000i128).ok()
        }
        _ => None,
    }
}
