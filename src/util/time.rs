use ::time::OffsetDateTime;

/// Unix time in seconds, as stored in entry headers.
pub fn now_secs() -> u32 {
  OffsetDateTime::now_utc().unix_timestamp().clamp(0, u32::MAX as i64) as u32
}

/// Unix time in milliseconds, used for segment ids.
pub fn now_millis() -> u64 {
  (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000).max(0) as u64
}
