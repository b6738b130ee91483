//! Sliding-window rate limiting.
//!
//! Tracks request timestamps per scope key. Thread-safe via
//! `std::sync::Mutex` (non-async, held briefly). [`ScopedRateLimiter`] keeps
//! one limiter, and therefore one lock, per scope kind, and takes them in a
//! fixed order (user, channel, guild) when checking a message.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use banter_config::{RateLimitConfig, ScopeLimit};
use banter_core::channel::ChatMessage;
use serde::Serialize;
use tokio::time::Instant;

/// Answer to a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Seconds until the oldest in-window request expires; 0 when allowed
    pub retry_after_secs: u64,
}

impl RateLimitResult {
    const ALLOWED: Self = Self {
        allowed: true,
        retry_after_secs: 0,
    };
}

type Windows = HashMap<String, VecDeque<Instant>>;

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    scopes: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            scopes: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_limit(limit: &ScopeLimit) -> Self {
        Self::new(limit.limit, Duration::from_secs(limit.window_secs))
    }

    /// Check the scope and record the request if it is allowed.
    pub fn check(&self, scope_key: &str) -> RateLimitResult {
        let mut scopes = self.lock();
        self.verdict(&mut scopes, scope_key, Instant::now(), true)
    }

    fn lock(&self) -> MutexGuard<'_, Windows> {
        self.scopes.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check against already locked windows.
    fn verdict(
        &self,
        scopes: &mut Windows,
        scope_key: &str,
        now: Instant,
        record: bool,
    ) -> RateLimitResult {
        let Some(timestamps) = scopes.get_mut(scope_key) else {
            if record && self.max_requests > 0 {
                scopes.insert(scope_key.to_string(), VecDeque::from([now]));
                return RateLimitResult::ALLOWED;
            }
            return self.verdict_for_empty();
        };

        // Remove expired timestamps
        while timestamps
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
        {
            timestamps.pop_front();
        }

        if timestamps.len() >= self.max_requests {
            let retry_after = timestamps
                .front()
                .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
                .unwrap_or(self.window);
            return RateLimitResult {
                allowed: false,
                retry_after_secs: ceil_secs(retry_after).max(1),
            };
        }

        if record {
            timestamps.push_back(now);
        }
        RateLimitResult::ALLOWED
    }

    fn verdict_for_empty(&self) -> RateLimitResult {
        if self.max_requests == 0 {
            RateLimitResult {
                allowed: false,
                retry_after_secs: ceil_secs(self.window).max(1),
            }
        } else {
            RateLimitResult::ALLOWED
        }
    }

    /// Drop scopes with no timestamps inside the window. Returns how many went.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut scopes = self.lock();
        let before = scopes.len();
        scopes.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|t| now.saturating_duration_since(*t) < self.window)
        });
        before - scopes.len()
    }

    pub fn tracked_scopes(&self) -> usize {
        self.lock().len()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Which limit rejected a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateScope {
    User,
    Channel,
    Guild,
}

/// User, channel and guild limiters applied together.
pub struct ScopedRateLimiter {
    user: RateLimiter,
    channel: RateLimiter,
    guild: RateLimiter,
}

impl ScopedRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            user: RateLimiter::from_limit(&config.user),
            channel: RateLimiter::from_limit(&config.channel),
            guild: RateLimiter::from_limit(&config.guild),
        }
    }

    /// Check every scope that applies to `message`.
    ///
    /// All applicable windows stay locked from the first check to the last
    /// record, and nothing is recorded unless every scope allows it, so a
    /// message rejected by the guild limit does not eat into the user's
    /// budget even under concurrent traffic.
    pub fn check_message(&self, message: &ChatMessage) -> Result<(), (RateScope, RateLimitResult)> {
        let now = Instant::now();
        let channel_key = message.channel_key();
        let guild_id = message.location.guild_id.as_deref();

        let mut user = self.user.lock();
        let mut channel = self.channel.lock();
        let mut guild = guild_id.map(|_| self.guild.lock());

        let mut scopes: Vec<(RateScope, &RateLimiter, &mut Windows, &str)> = vec![
            (RateScope::User, &self.user, &mut *user, message.author.id.as_str()),
            (RateScope::Channel, &self.channel, &mut *channel, channel_key.as_str()),
        ];
        if let (Some(id), Some(windows)) = (guild_id, guild.as_mut()) {
            scopes.push((RateScope::Guild, &self.guild, &mut **windows, id));
        }

        for (scope, limiter, windows, key) in &mut scopes {
            let verdict = limiter.verdict(&mut **windows, *key, now, false);
            if !verdict.allowed {
                return Err((*scope, verdict));
            }
        }
        for (_, limiter, windows, key) in &mut scopes {
            limiter.verdict(&mut **windows, *key, now, true);
        }
        Ok(())
    }

    pub fn cleanup(&self) -> usize {
        self.user.cleanup() + self.channel.cleanup() + self.guild.cleanup()
    }
}
