use chrono::{DateTime, TimeZone, Utc};
use prost_types::Timestamp;

/// Converts a UTC datetime to a protobuf timestamp.
pub fn to_timestamp(dt: DateTime<Utc>) -> Timestamp {
    Timestamp { seconds: dt.timestamp(), nanos: dt.timestamp_subsec_nanos() as i32 }
}

/// Converts a protobuf timestamp to a UTC datetime.
///
/// Returns `None` when the timestamp is outside chrono's representable range
/// or carries negative nanos.
pub fn from_timestamp(ts: &Timestamp) -> Option<DateTime<Utc>> {
    let nanos = u32::try_from(ts.nanos).ok()?;
    Utc.timestamp_opt(ts.seconds, nanos).single()
}

/// Current wall-clock time as a protobuf timestamp.
pub fn now() -> Timestamp {
    to_timestamp(Utc::now())
}

/// Total ordering key for timestamps; `None` sorts first.
pub fn ordering_key(ts: Option<&Timestamp>) -> (i64, i32) {
    ts.map_or((i64::MIN, 0), |t| (t.seconds, t.nanos))
}

/// Returns the later of two optional timestamps.
pub fn max_timestamp(a: Option<Timestamp>, b: Option<&Timestamp>) -> Option<Timestamp> {
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(*b),
        (Some(a), Some(b)) => {
            if ordering_key(Some(b)) > ordering_key(Some(&a)) {
                Some(*b)
            } else {
                Some(a)
            }
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_roundtrip_keeps_nanos() {
        let dt = Utc.timestamp_opt(1_700_000_000, 123_456_789).single().expect("valid datetime");
        let ts = to_timestamp(dt);
        assert_eq!(ts.seconds, 1_700_000_000);
        assert_eq!(ts.nanos, 123_456_789);
        assert_eq!(from_timestamp(&ts), Some(dt));
    }

    #[test]
    fn test_from_timestamp_rejects_negative_nanos() {
        assert!(from_timestamp(&Timestamp { seconds: 10, nanos: -1 }).is_none());
    }

    #[test]
    fn test_max_timestamp_prefers_later() {
        let early = Timestamp { seconds: 10, nanos: 5 };
        let late = Timestamp { seconds: 10, nanos: 6 };
        assert_eq!(max_timestamp(Some(early), Some(&late)), Some(late));
        assert_eq!(max_timestamp(Some(late), Some(&early)), Some(late));
        assert_eq!(max_timestamp(None, Some(&early)), Some(early));
        assert_eq!(max_timestamp(None, None), None);
    }
}
