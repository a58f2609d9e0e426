//! Normalization of raw kiosk interactions.
//!
//! Each field normalizer turns one raw field into a resolved value or a [`NormalizeError`].
//! [`Normalizer`] composes them, always in the order timestamp, site, value/type, and stops at
//! the first failure. Batch and streaming ingestion both go through [`Normalizer::normalize`],
//! so the two paths cannot disagree on what a valid interaction is.
use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde_json::Value;

use crate::error::NormalizeError;
use crate::lookup::ReferenceLookup;
use crate::types::{InteractionKind, NormalizedInteraction, RawInteractionRecord};

// Request rows in the exports carry their request value as a float, e.g. "1.0".
static DECIMAL_FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.\d+$").unwrap());

// Seconds are optional, as in ISO 8601.
const NAIVE_TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];
// `%#z` takes `Z`, `+HH`, `+HHMM` and `+HH:MM`.
const OFFSET_TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%d %H:%M%#z",
    "%Y-%m-%dT%H:%M%#z",
];

/// Marks a feed message as a request rather than a rating.
const REQUEST_SENTINEL: i64 = -1;

/// The time-of-day range in which interactions are accepted, inclusive at both ends.
/// A window whose start is after its end wraps around midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Parse the `at` field and check it against the operating-hours window.
///
/// Timestamps with a UTC offset keep their local wall-clock time: that is the time the visitor
/// pressed the button, and the one compared with the museum's opening hours.
pub fn normalize_timestamp(
    at: Option<&Value>,
    window: &TimeWindow,
) -> Result<NaiveDateTime, NormalizeError> {
    let at = match at {
        None => return Err(NormalizeError::MissingField { field: "at" }),
        Some(Value::String(at)) => at,
        Some(other) => {
            return Err(NormalizeError::InvalidType {
                field: "at",
                found: json_type_name(other),
            })
        }
    };

    let event_at = parse_timestamp(at).ok_or_else(|| NormalizeError::ParseError {
        field: "at",
        value: at.to_owned(),
    })?;

    let time = event_at.time();
    if !window.contains(time) {
        return Err(NormalizeError::OutOfWindow {
            time,
            start: window.start,
            end: window.end,
        });
    }

    Ok(event_at)
}

fn parse_timestamp(at: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(at) {
        return Some(parsed.naive_local());
    }

    OFFSET_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(at, format).ok())
        .map(|parsed| parsed.naive_local())
        .or_else(|| {
            NAIVE_TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(at, format).ok())
        })
}

/// Resolve the `site` field to an exhibition surrogate id.
pub fn normalize_site(site: Option<&Value>, lookup: &ReferenceLookup) -> Result<i32, NormalizeError> {
    let site = match site {
        None => return Err(NormalizeError::MissingField { field: "site" }),
        Some(Value::String(site)) => parse_digits("site", site)?,
        Some(other) => {
            return Err(NormalizeError::InvalidType {
                field: "site",
                found: json_type_name(other),
            })
        }
    };

    lookup
        .exhibition_id(site)
        .ok_or(NormalizeError::Unrecognized {
            field: "site",
            value: site,
        })
}

/// Decide the destination table and resolve the value surrogate id.
///
/// `type` picks the table: empty means a rating, a request value means a request. The two
/// branches read their lookup value from different fields. A rating resolves `val`, a request
/// resolves the integer part of `type` and never looks at `val`.
/// Feed messages omit `type` for ratings, and flag requests with `val == -1`.
pub fn normalize_value(
    val: Option<&Value>,
    request_type: Option<&Value>,
    lookup: &ReferenceLookup,
) -> Result<(InteractionKind, i32), NormalizeError> {
    let request_value = match request_type {
        None => {
            let val = val.ok_or(NormalizeError::MissingField { field: "val" })?;
            if is_request_sentinel(val) {
                return Err(NormalizeError::MissingField { field: "type" });
            }
            None
        }
        Some(Value::String(request_type)) if request_type.is_empty() => None,
        Some(Value::String(request_type)) => match DECIMAL_FRACTION.captures(request_type) {
            Some(captures) => Some(parse_digits("type", &captures[1])?),
            None => {
                return Err(NormalizeError::ParseError {
                    field: "type",
                    value: request_type.to_owned(),
                })
            }
        },
        Some(Value::Number(request_type)) => {
            Some(
                request_type
                    .as_i64()
                    .ok_or(NormalizeError::InvalidType {
                        field: "type",
                        found: "non-integer number",
                    })?,
            )
        }
        Some(other) => {
            return Err(NormalizeError::InvalidType {
                field: "type",
                found: json_type_name(other),
            })
        }
    };

    match request_value {
        Some(value) => lookup
            .request_id(value)
            .map(|id| (InteractionKind::Request, id))
            .ok_or(NormalizeError::Unrecognized {
                field: "type",
                value,
            }),
        None => {
            let value = rating_value(val)?;
            lookup
                .rating_id(value)
                .map(|id| (InteractionKind::Rating, id))
                .ok_or(NormalizeError::Unrecognized { field: "val", value })
        }
    }
}

fn rating_value(val: Option<&Value>) -> Result<i64, NormalizeError> {
    match val {
        None => Err(NormalizeError::MissingField { field: "val" }),
        Some(Value::String(val)) if val == "-1" => Ok(REQUEST_SENTINEL),
        Some(Value::String(val)) => parse_digits("val", val),
        Some(Value::Number(val)) => val.as_i64().ok_or(NormalizeError::InvalidType {
            field: "val",
            found: "non-integer number",
        }),
        Some(other) => Err(NormalizeError::InvalidType {
            field: "val",
            found: json_type_name(other),
        }),
    }
}

fn is_request_sentinel(val: &Value) -> bool {
    match val {
        Value::Number(val) => val.as_i64() == Some(REQUEST_SENTINEL),
        Value::String(val) => val == "-1",
        _ => false,
    }
}

fn parse_digits(field: &'static str, value: &str) -> Result<i64, NormalizeError> {
    let parse_error = || NormalizeError::ParseError {
        field,
        value: value.to_owned(),
    };

    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(parse_error());
    }
    value.parse::<i64>().map_err(|_| parse_error())
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Turns raw interactions into normalized ones for a single ingestion session.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    lookup: &'a ReferenceLookup,
    window: TimeWindow,
}

impl<'a> Normalizer<'a> {
    pub fn new(lookup: &'a ReferenceLookup, window: TimeWindow) -> Self {
        Self { lookup, window }
    }

    pub fn lookup(&self) -> &ReferenceLookup {
        self.lookup
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Normalize one record, reporting the first failing field in timestamp, site, value order.
    pub fn normalize(
        &self,
        raw: &RawInteractionRecord,
    ) -> Result<NormalizedInteraction, NormalizeError> {
        let event_at = normalize_timestamp(raw.at.as_ref(), &self.window)?;
        let exhibition_id = normalize_site(raw.site.as_ref(), self.lookup)?;
        let (kind, value_id) =
            normalize_value(raw.val.as_ref(), raw.request_type.as_ref(), self.lookup)?;

        Ok(NormalizedInteraction {
            kind,
            event_at,
            exhibition_id,
            value_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::error::FailureKind;

    fn lookup() -> ReferenceLookup {
        ReferenceLookup::new(
            HashMap::from([(1, 1), (0, 2), (5, 3), (2, 4), (4, 5), (3, 6)]),
            HashMap::from([(0, 1), (1, 2), (2, 3), (3, 4), (4, 5)]),
            HashMap::from([(0, 1), (1, 2)]),
        )
    }

    fn hm(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn window() -> TimeWindow {
        TimeWindow::new(hm(8, 45), hm(18, 15))
    }

    fn record(value: Value) -> RawInteractionRecord {
        serde_json::from_value(value).unwrap()
    }

    fn sample_event_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 3, 6)
            .unwrap()
            .and_hms_opt(15, 9, 21)
            .unwrap()
    }

    #[test]
    fn test_rating_row() {
        let lookup = ReferenceLookup::new(
            HashMap::from([(4, 5)]),
            HashMap::from([(0, 1)]),
            HashMap::new(),
        );
        let normalizer = Normalizer::new(&lookup, window());

        let raw = RawInteractionRecord::from_strings("2023-03-06 15:09:21", "4", "0", "");
        assert_eq!(
            normalizer.normalize(&raw),
            Ok(NormalizedInteraction {
                kind: InteractionKind::Rating,
                event_at: sample_event_at(),
                exhibition_id: 5,
                value_id: 1,
            })
        );
    }

    #[test]
    fn test_request_row() {
        let lookup = ReferenceLookup::new(
            HashMap::from([(3, 6)]),
            HashMap::new(),
            HashMap::from([(1, 2)]),
        );
        let normalizer = Normalizer::new(&lookup, window());

        let raw = RawInteractionRecord::from_strings("2023-03-06 15:09:21", "3", "-1", "1.0");
        assert_eq!(
            normalizer.normalize(&raw),
            Ok(NormalizedInteraction {
                kind: InteractionKind::Request,
                event_at: sample_event_at(),
                exhibition_id: 6,
                value_id: 2,
            })
        );

        let raw = RawInteractionRecord::from_strings("2023-03-06 15:09:21", "3", "-1", "0.0");
        assert!(normalizer.normalize(&raw).is_err());
    }

    #[test]
    fn test_request_ignores_val() {
        let lookup = lookup();
        let normalizer = Normalizer::new(&lookup, window());

        for val in [json!("-1"), json!("4"), json!("garbage"), json!(true)] {
            let raw = record(json!({
                "at": "2023-03-06 15:09:21", "site": "3", "val": val, "type": "0.0"
            }));
            let normalized = normalizer.normalize(&raw).unwrap();
            assert_eq!(normalized.kind, InteractionKind::Request);
            assert_eq!(normalized.value_id, 1);
        }

        let raw = record(json!({"at": "2023-03-06 15:09:21", "site": "3", "type": "1.7"}));
        let normalized = normalizer.normalize(&raw).unwrap();
        assert_eq!(normalized.kind, InteractionKind::Request);
        assert_eq!(normalized.value_id, 2);
    }

    #[test]
    fn test_feed_shaped_messages() {
        let lookup = lookup();
        let normalizer = Normalizer::new(&lookup, window());

        let rating = record(json!({
            "at": "2025-01-13T09:23:20.177598+00:00", "site": "2", "val": 2
        }));
        let normalized = normalizer.normalize(&rating).unwrap();
        assert_eq!(normalized.kind, InteractionKind::Rating);
        assert_eq!(normalized.exhibition_id, 4);
        assert_eq!(normalized.value_id, 3);
        assert_eq!(
            normalized.event_at,
            NaiveDate::from_ymd_opt(2025, 1, 13)
                .unwrap()
                .and_hms_micro_opt(9, 23, 20, 177598)
                .unwrap()
        );

        let request = record(json!({
            "at": "2025-01-13T09:23:20+00:00", "site": "2", "val": -1, "type": 1
        }));
        let normalized = normalizer.normalize(&request).unwrap();
        assert_eq!(normalized.kind, InteractionKind::Request);
        assert_eq!(normalized.value_id, 2);

        let day = NaiveDate::from_ymd_opt(2025, 1, 13).unwrap();
        for (at, expected) in [
            ("2025-01-13T09:23", day.and_hms_opt(9, 23, 0)),
            ("2025-01-13 09:23", day.and_hms_opt(9, 23, 0)),
            ("2025-01-13T09:23+01:00", day.and_hms_opt(9, 23, 0)),
            ("2025-01-13T09:23Z", day.and_hms_opt(9, 23, 0)),
            ("2025-01-13 09:23-0500", day.and_hms_opt(9, 23, 0)),
            ("2025-01-13T09:23:20+01", day.and_hms_opt(9, 23, 20)),
            ("2025-01-13 09:23:20+01", day.and_hms_opt(9, 23, 20)),
            ("2025-01-13T09:23:20.5-03", day.and_hms_milli_opt(9, 23, 20, 500)),
            ("2025-01-13T09:23:20Z", day.and_hms_opt(9, 23, 20)),
            ("2025-01-13 09:23:20+0000", day.and_hms_opt(9, 23, 20)),
        ] {
            let raw = record(json!({"at": at, "site": "4", "val": 3}));
            match normalizer.normalize(&raw) {
                Ok(normalized) => assert_eq!(Some(normalized.event_at), expected, "{at}"),
                Err(e) => panic!("{at} should parse, got {e:?}"),
            }
        }
    }

    #[test]
    fn test_integer_type_picks_request_over_val() {
        let lookup = lookup();
        let normalizer = Normalizer::new(&lookup, window());

        // `val` would be a valid rating, but a `type` is present, so it is a request.
        let raw = record(json!({"at": "2025-01-13T09:23:20", "site": "4", "val": 3, "type": 1}));
        let normalized = normalizer.normalize(&raw).unwrap();
        assert_eq!(normalized.kind, InteractionKind::Request);
        assert_eq!(normalized.value_id, 2);

        let raw = record(json!({"at": "2025-01-13T09:23:20", "site": "4", "val": 3}));
        let normalized = normalizer.normalize(&raw).unwrap();
        assert_eq!(normalized.kind, InteractionKind::Rating);
        assert_eq!(normalized.value_id, 4);
    }

    #[test]
    fn test_batch_and_feed_framing_agree() {
        let lookup = lookup();
        let normalizer = Normalizer::new(&lookup, window());

        let from_export = RawInteractionRecord::from_strings("2025-01-13 10:00:00", "5", "-1", "1.0");
        let from_feed = record(json!({
            "at": "2025-01-13T10:00:00", "site": "5", "val": -1, "type": 1
        }));

        assert_eq!(
            normalizer.normalize(&from_export),
            normalizer.normalize(&from_feed)
        );
    }

    #[test]
    fn test_missing_fields() {
        let lookup = lookup();
        let normalizer = Normalizer::new(&lookup, window());

        let cases = [
            (json!({"site": "4", "val": "0", "type": ""}), "at"),
            (json!({"at": "2023-03-06 15:09:21", "val": "0", "type": ""}), "site"),
            (json!({"at": "2023-03-06 15:09:21", "site": "4", "type": ""}), "val"),
            (json!({"at": "2023-03-06 15:09:21", "site": "4"}), "val"),
            (json!({"at": "2023-03-06 15:09:21", "site": "4", "val": -1}), "type"),
            (json!({"at": "2023-03-06 15:09:21", "site": "4", "val": "-1"}), "type"),
        ];

        for (raw, field) in cases {
            assert_eq!(
                normalizer.normalize(&record(raw)),
                Err(NormalizeError::MissingField { field })
            );
        }
    }

    #[test]
    fn test_invalid_types() {
        let lookup = lookup();
        let normalizer = Normalizer::new(&lookup, window());

        let bad_values = [
            json!(null),
            json!(123),
            json!(123.45),
            json!(true),
            json!(["list", "of", "values"]),
            json!({"nested": "dict"}),
        ];

        for bad in bad_values.iter() {
            let raw = record(json!({"at": bad, "site": "4", "val": "0", "type": ""}));
            assert_eq!(normalizer.normalize(&raw).unwrap_err().kind(), FailureKind::InvalidType);

            let raw = record(json!({"at": "2023-03-06 15:09:21", "site": bad, "val": "0", "type": ""}));
            assert_eq!(normalizer.normalize(&raw).unwrap_err().kind(), FailureKind::InvalidType);
        }

        for bad in [json!(null), json!(89.01), json!(false), json!(["x"]), json!({"k": "v"})] {
            let raw = record(json!({"at": "2023-03-06 15:09:21", "site": "4", "val": bad, "type": ""}));
            assert_eq!(normalizer.normalize(&raw).unwrap_err().kind(), FailureKind::InvalidType);
        }

        for bad in [json!(null), json!(45.67), json!(false), json!(["x"]), json!({"k": "v"})] {
            let raw = record(json!({"at": "2023-03-06 15:09:21", "site": "4", "val": "0", "type": bad}));
            assert_eq!(normalizer.normalize(&raw).unwrap_err().kind(), FailureKind::InvalidType);
        }
    }

    #[test]
    fn test_parse_errors() {
        let lookup = lookup();
        let normalizer = Normalizer::new(&lookup, window());

        let cases = [
            (RawInteractionRecord::from_strings("foo", "4", "0", ""), "at"),
            (RawInteractionRecord::from_strings("2023-03-06 15:09:21", "foo", "0", ""), "site"),
            (RawInteractionRecord::from_strings("2023-03-06 15:09:21", "", "0", ""), "site"),
            (RawInteractionRecord::from_strings("2023-03-06 15:09:21", "-4", "0", ""), "site"),
            (RawInteractionRecord::from_strings("2023-03-06 15:09:21", "4", "f", ""), "val"),
            (RawInteractionRecord::from_strings("2023-03-06 15:09:21", "4", "0", "foo"), "type"),
            (RawInteractionRecord::from_strings("2023-03-06 15:09:21", "4", "-1", "f.0"), "type"),
            (RawInteractionRecord::from_strings("2023-03-06 15:09:21", "4", "-1", "1"), "type"),
            (
                RawInteractionRecord::from_strings("2023-03-06 15:09:21", "99999999999999999999", "0", ""),
                "site",
            ),
        ];

        for (raw, field) in cases {
            match normalizer.normalize(&raw) {
                Err(NormalizeError::ParseError { field: got, .. }) => assert_eq!(got, field),
                other => panic!("expected a parse error on {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unrecognized_values() {
        let lookup = lookup();
        let before = lookup.clone();
        let normalizer = Normalizer::new(&lookup, window());

        let raw = RawInteractionRecord::from_strings("2023-03-06 15:09:21", "99", "0", "");
        assert_eq!(
            normalizer.normalize(&raw),
            Err(NormalizeError::Unrecognized {
                field: "site",
                value: 99
            })
        );
        assert_eq!(lookup, before);

        let raw = RawInteractionRecord::from_strings("2023-03-06 15:09:21", "4", "7", "");
        assert_eq!(
            normalizer.normalize(&raw),
            Err(NormalizeError::Unrecognized {
                field: "val",
                value: 7
            })
        );

        let raw = RawInteractionRecord::from_strings("2023-03-06 15:09:21", "4", "-1", "");
        assert_eq!(
            normalizer.normalize(&raw),
            Err(NormalizeError::Unrecognized {
                field: "val",
                value: -1
            })
        );

        let raw = RawInteractionRecord::from_strings("2023-03-06 15:09:21", "4", "-1", "3.0");
        assert_eq!(
            normalizer.normalize(&raw),
            Err(NormalizeError::Unrecognized {
                field: "type",
                value: 3
            })
        );
    }

    #[test]
    fn test_window_boundaries() {
        let lookup = lookup();
        let normalizer = Normalizer::new(&lookup, window());

        for at in ["2023-03-06 08:45:00", "2023-03-06 18:15:00"] {
            let raw = RawInteractionRecord::from_strings(at, "4", "0", "");
            assert!(normalizer.normalize(&raw).is_ok(), "{at} should be accepted");
        }

        for at in [
            "2023-03-06 08:44:59",
            "2023-03-06 18:15:01",
            "2025-01-13T03:23:20.177598+00:00",
            "2025-01-13T23:23:20.177598+00:00",
        ] {
            let raw = record(json!({"at": at, "site": "4", "val": "0", "type": ""}));
            assert_eq!(
                normalizer.normalize(&raw).unwrap_err().kind(),
                FailureKind::OutOfWindow,
                "{at} should be rejected"
            );
        }
    }

    #[test]
    fn test_offset_keeps_local_time() {
        let lookup = lookup();
        let normalizer = Normalizer::new(&lookup, window());

        // 07:30 UTC, but 09:30 at the kiosk.
        let raw = record(json!({"at": "2025-06-01T09:30:00+02:00", "site": "4", "val": 1}));
        let normalized = normalizer.normalize(&raw).unwrap();
        assert_eq!(normalized.event_at.time(), hm(9, 30));
    }

    #[test]
    fn test_overnight_window_wraps() {
        let overnight = TimeWindow::new(hm(22, 0), hm(2, 0));
        assert!(overnight.contains(hm(23, 30)));
        assert!(overnight.contains(hm(1, 0)));
        assert!(overnight.contains(hm(22, 0)));
        assert!(overnight.contains(hm(2, 0)));
        assert!(!overnight.contains(hm(12, 0)));
    }

    #[test]
    fn test_first_failure_wins() {
        let lookup = lookup();
        let normalizer = Normalizer::new(&lookup, window());

        // Every field is broken: the timestamp is reported.
        let raw = record(json!({"at": "2023-03-06 03:00:00", "site": "x", "val": true, "type": "?"}));
        assert_eq!(normalizer.normalize(&raw).unwrap_err().kind(), FailureKind::OutOfWindow);

        // Site and type are broken: the site is reported.
        let raw = RawInteractionRecord::from_strings("2023-03-06 15:09:21", "99", "0", "foo");
        assert_eq!(normalizer.normalize(&raw).unwrap_err().kind(), FailureKind::Unrecognized);
    }
}
