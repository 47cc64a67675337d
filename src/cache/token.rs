use crate::helpers::time::now_i64;
use crate::parser::claims::decode_expiry;

/// Token held by a token manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    /// UNIX timestamp of the `exp` claim, `None` when it could not be decoded
    pub expires_at: Option<i64>,
    /// UNIX timestamp
    pub fetched_at: i64,
}

impl CachedToken {
    pub fn new(value: String, expires_at: Option<i64>) -> Self {
        Self { value, expires_at, fetched_at: now_i64() }
    }

    /// Build from a raw token, decoding its expiry
    pub fn from_raw(value: String) -> Self {
        let expires_at = decode_expiry(&value);
        Self::new(value, expires_at)
    }

    /// Usable while `now < expires_at - safety_margin`; unknown expiry is never fresh
    pub fn is_fresh_at(&self, now: i64, safety_margin_seconds: u64) -> bool {
        self.expires_at
            .map(|exp| now < exp.saturating_sub(margin(safety_margin_seconds)))
            .unwrap_or(false)
    }

    pub fn is_fresh(&self, safety_margin_seconds: u64) -> bool {
        self.is_fresh_at(now_i64(), safety_margin_seconds)
    }

    /// Seconds left until the safety margin is reached, negative once stale
    pub fn remaining_seconds(&self, safety_margin_seconds: u64) -> Option<i64> {
        self.expires_at
            .map(|exp| exp.saturating_sub(margin(safety_margin_seconds)).saturating_sub(now_i64()))
    }
}

fn margin(safety_margin_seconds: u64) -> i64 {
    i64::try_from(safety_margin_seconds).unwrap_or(i64::MAX)
}
