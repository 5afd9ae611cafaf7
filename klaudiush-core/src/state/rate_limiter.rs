//! Exception rate-limiter state.
//!
//! Hourly and daily windows, global and per-error-code counters. The state
//! file is read-modify-written under the sidecar lock; an unreadable file
//! degrades to "no prior usage".

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use klaudiush_config::ExceptionPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use super::{FileLock, atomic_write};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterState {
    pub hour_start_time: DateTime<Utc>,
    pub day_start_time: DateTime<Utc>,
    pub global_hourly_count: u32,
    pub global_daily_count: u32,
    #[serde(default)]
    pub hourly_usage: BTreeMap<String, u32>,
    #[serde(default)]
    pub daily_usage: BTreeMap<String, u32>,
    pub last_updated: DateTime<Utc>,
}

impl RateLimiterState {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            hour_start_time: now,
            day_start_time: now,
            global_hourly_count: 0,
            global_daily_count: 0,
            hourly_usage: BTreeMap::new(),
            daily_usage: BTreeMap::new(),
            last_updated: now,
        }
    }

    /// Reset any window whose boundary the clock has crossed. The previous
    /// window's counters never leak into the new one.
    pub fn roll_windows(&mut self, now: DateTime<Utc>) {
        if now - self.hour_start_time >= Duration::hours(1) {
            self.hour_start_time = now;
            self.global_hourly_count = 0;
            self.hourly_usage.clear();
        }
        if now - self.day_start_time >= Duration::days(1) {
            self.day_start_time = now;
            self.global_daily_count = 0;
            self.daily_usage.clear();
        }
    }

    fn record(&mut self, code: &str, now: DateTime<Utc>) {
        self.global_hourly_count += 1;
        self.global_daily_count += 1;
        *self.hourly_usage.entry(code.to_string()).or_insert(0) += 1;
        *self.daily_usage.entry(code.to_string()).or_insert(0) += 1;
        self.last_updated = now;
    }
}

/// Outcome of one bypass attempt against the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BypassDecision {
    Granted,
    RateLimited,
}

pub struct RateLimiter {
    state_path: PathBuf,
    max_global_per_hour: u32,
    max_global_per_day: u32,
}

impl RateLimiter {
    pub fn new(state_path: PathBuf, max_global_per_hour: u32, max_global_per_day: u32) -> Self {
        Self {
            state_path,
            max_global_per_hour,
            max_global_per_day,
        }
    }

    /// Check the policy's limits and, when within them, commit the usage.
    ///
    /// On a denied attempt nothing is persisted beyond the window roll.
    pub fn try_consume(
        &self,
        code: &str,
        policy: &ExceptionPolicy,
        now: DateTime<Utc>,
    ) -> Result<BypassDecision> {
        let _lock = FileLock::acquire(&self.state_path)?;

        let mut state = self.load_unlocked(now);
        state.roll_windows(now);

        let code_hourly = state.hourly_usage.get(code).copied().unwrap_or(0);
        let code_daily = state.daily_usage.get(code).copied().unwrap_or(0);

        let within_limits = state.global_hourly_count < self.max_global_per_hour
            && state.global_daily_count < self.max_global_per_day
            && code_hourly < policy.max_per_hour
            && code_daily < policy.max_per_day;

        if !within_limits {
            self.persist(&state)?;
            return Ok(BypassDecision::RateLimited);
        }

        state.record(code, now);
        self.persist(&state)?;
        Ok(BypassDecision::Granted)
    }

    /// Current state snapshot (windows rolled, nothing persisted).
    pub fn snapshot(&self, now: DateTime<Utc>) -> Result<RateLimiterState> {
        let _lock = FileLock::acquire(&self.state_path)?;
        let mut state = self.load_unlocked(now);
        state.roll_windows(now);
        Ok(state)
    }

    fn load_unlocked(&self, now: DateTime<Utc>) -> RateLimiterState {
        match fs::read_to_string(&self.state_path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(state) => state,
                Err(error) => {
                    warn!(
                        path = %self.state_path.display(),
                        %error,
                        "rate limiter state is corrupt; treating as no prior usage"
                    );
                    RateLimiterState::fresh(now)
                }
            },
            Err(_) => RateLimiterState::fresh(now),
        }
    }

    fn persist(&self, state: &RateLimiterState) -> Result<()> {
        let serialized = serde_json::to_vec_pretty(state)?;
        atomic_write(&self.state_path, &serialized)
    }
}
