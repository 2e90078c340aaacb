//! Decoding of Misskey "aid" identifiers.
//!
//! An aid starts with eight base-36 digits holding the number of milliseconds elapsed since
//! 2000-01-01T00:00:00Z, followed by a short random suffix. Because the time prefix has a
//! fixed width, lexicographic order of the identifiers follows creation order.

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

/// Number of leading characters that carry the timestamp.
pub const TIME_PREFIX_LEN: usize = 8;

/// Milliseconds between the Unix epoch and 2000-01-01T00:00:00Z.
pub const AID_EPOCH_MILLIS: i64 = 946_684_800_000;

const RADIX: u32 = 36;

/// The identifier could not be decoded as an aid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedIdentifier {
    #[error("identifier '{id}' is shorter than eight characters")]
    TooShort { id: String },
    #[error("identifier '{id}' has non base-36 character {character:?} at position {position}")]
    InvalidCharacter {
        id: String,
        character: char,
        position: usize,
    },
}

/// Decode the creation timestamp (milliseconds since the Unix epoch) of an aid.
///
/// Only the first eight characters are read; they are matched case-insensitively against
/// `0-9A-Z`.
pub fn decode(id: &str) -> Result<i64, MalformedIdentifier> {
    let mut value: i64 = 0;
    let mut digits = 0;

    for (position, character) in id.chars().take(TIME_PREFIX_LEN).enumerate() {
        let digit = character
            .to_digit(RADIX)
            .ok_or_else(|| MalformedIdentifier::InvalidCharacter {
                id: id.to_string(),
                character,
                position,
            })?;
        value = value * i64::from(RADIX) + i64::from(digit);
        digits += 1;
    }

    if digits < TIME_PREFIX_LEN {
        return Err(MalformedIdentifier::TooShort { id: id.to_string() });
    }

    Ok(value + AID_EPOCH_MILLIS)
}

/// Creation time of an aid as a UTC date.
pub fn created_at(id: &str) -> Result<DateTime<Utc>, MalformedIdentifier> {
    let millis = decode(id)?;
    // 36^8 milliseconds past 2000 stays well inside chrono's representable range.
    Ok(Utc
        .timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC))
}
