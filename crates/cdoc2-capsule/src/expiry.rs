//! Capsule expiry policy
//!
//! A PUT without a requested expiry gets `now + default`. A requested expiry
//! beyond `now + max` is clamped to exactly `now + max` and flagged; anything
//! else (including instants already in the past) is stored unchanged.

use cdoc2_core::config::KeyCapsuleConfig;
use cdoc2_core::Cdoc2Result;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    default_duration: Duration,
    max_duration: Duration,
}

/// Effective expiry for a stored capsule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedExpiry {
    pub expiry_time: DateTime<Utc>,
    /// Requested expiry exceeded the maximum and was capped
    pub adjusted: bool,
}

impl ExpiryPolicy {
    pub fn new(default_duration: Duration, max_duration: Duration) -> Self {
        Self {
            default_duration,
            max_duration,
        }
    }

    pub fn from_config(config: &KeyCapsuleConfig) -> Cdoc2Result<Self> {
        Ok(Self::new(config.default_expiration()?, config.max_expiration()?))
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    pub fn max_duration(&self) -> Duration {
        self.max_duration
    }

    pub fn resolve(&self, requested: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ResolvedExpiry {
        let max = add_saturating(now, self.max_duration);
        match requested {
            None => ResolvedExpiry {
                expiry_time: add_saturating(now, self.default_duration).min(max),
                adjusted: false,
            },
            Some(requested) if requested > max => ResolvedExpiry {
                expiry_time: max,
                adjusted: true,
            },
            Some(requested) => ResolvedExpiry {
                expiry_time: requested,
                adjusted: false,
            },
        }
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::new(Duration::days(1095), Duration::days(1825))
    }
}

fn add_saturating(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    now.checked_add_signed(duration)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
