//! Core data types for the persistent queue.

use serde::{Deserialize, Serialize};

/// Maximum UID length in bytes.
pub const UID_CAPACITY: usize = 19;

/// Maximum timestamp length in bytes.
pub const TIMESTAMP_CAPACITY: usize = 24;

/// Separator between fields of a serialized item.
const FIELD_DELIMITER: char = ',';

/// A single unit of queued work.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueItem {
    /// Caller-chosen identifier, at most `UID_CAPACITY` bytes
    pub uid: String,

    /// Opaque caller-supplied timestamp, at most `TIMESTAMP_CAPACITY` bytes
    pub timestamp: String,

    /// Payload with caller-defined meaning
    pub number: i32,

    /// Claimed by a consumer; skipped by peek but still queued
    #[serde(default)]
    pub reserved: bool,
}

/// Validation errors for items.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    DelimiterInUid(String),
    DelimiterInTimestamp(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::DelimiterInUid(uid) => {
                write!(f, "uid '{}' must not contain '{}'", uid, FIELD_DELIMITER)
            }
            ValidationError::DelimiterInTimestamp(ts) => {
                write!(f, "timestamp '{}' must not contain '{}'", ts, FIELD_DELIMITER)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl QueueItem {
    /// Build an unreserved item, truncating uid and timestamp to capacity.
    pub fn new(uid: &str, timestamp: &str, number: i32) -> Self {
        Self {
            uid: truncate(uid, UID_CAPACITY).to_string(),
            timestamp: truncate(timestamp, TIMESTAMP_CAPACITY).to_string(),
            number,
            reserved: false,
        }
    }

    /// Validate the item's fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.uid.contains(FIELD_DELIMITER) {
            return Err(ValidationError::DelimiterInUid(self.uid.clone()));
        }
        if self.timestamp.contains(FIELD_DELIMITER) {
            return Err(ValidationError::DelimiterInTimestamp(self.timestamp.clone()));
        }
        Ok(())
    }

    /// Serialize to the stored record form `uid,timestamp,number,flag`.
    pub fn to_record(&self) -> String {
        format!(
            "{}{d}{}{d}{}{d}{}",
            self.uid,
            self.timestamp,
            self.number,
            if self.reserved { "1" } else { "0" },
            d = FIELD_DELIMITER
        )
    }

    /// Parse a stored record.
    ///
    /// Never fails: missing fields fall back to empty strings, `0` and unreserved.
    /// The flag field is everything after the third delimiter and only the exact
    /// string `"1"` counts as reserved.
    pub fn from_record(record: &str) -> Self {
        let mut fields = record.splitn(4, FIELD_DELIMITER);
        let uid = fields.next().unwrap_or_default();
        let timestamp = fields.next().unwrap_or_default();
        let number = fields.next().map(parse_leading_int).unwrap_or(0);
        let reserved = fields.next() == Some("1");

        Self {
            reserved,
            ..Self::new(uid, timestamp, number)
        }
    }

    /// Check whether this record round-trips through `from_record` unchanged.
    pub fn is_well_formed_record(record: &str) -> bool {
        Self::from_record(record).to_record() == record
    }
}

/// Cut `s` to at most `max` bytes without splitting a character.
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Parse an optional sign followed by decimal digits, ignoring trailing junk.
/// Yields 0 when there are no digits or the value does not fit in an `i32`.
fn parse_leading_int(s: &str) -> i32 {
    let s = s.trim_start();
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let digits = s[sign_len..].bytes().take_while(u8::is_ascii_digit).count();
    s[..sign_len + digits].parse().unwrap_or(0)
}
