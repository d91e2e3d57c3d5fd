//! Per-client admission control backed by interval-refill token buckets.
//!
//! [`RateLimiter`] keeps one [`Bucket`] per [`ClientKey`] in a sharded map. A new key only
//! locks its own shard, and every bucket carries its own mutex, so one client's traffic never
//! waits on another client's counter or on a burst of first-time clients elsewhere.

mod bucket;

pub use bucket::Bucket;

// crates.io
use axum::http::Method;
use dashmap::DashMap;
// self
use crate::{_prelude::*, identity::ClientKey};

/// Quota tier applied when a bucket is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LimitTier {
	/// Anonymous callers.
	Default,
	/// Callers whose context already carried an authenticated principal.
	Authenticated,
}
impl LimitTier {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			LimitTier::Default => "default",
			LimitTier::Authenticated => "authenticated",
		}
	}
}
impl Display for LimitTier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Limits, refill window, and exemption rules for the gate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
	/// Requests per window for anonymous callers.
	pub default_limit: u32,
	/// Requests per window for authenticated callers; never below `default_limit`.
	pub authenticated_limit: u32,
	/// Refill window.
	pub window: Duration,
	/// Paths that bypass rate limiting (exact match or `/`-delimited prefix).
	pub exempt_paths: Vec<String>,
}
impl RateLimitPolicy {
	/// Creates a policy with no exempt paths.
	pub fn new(default_limit: u32, authenticated_limit: u32, window: Duration) -> Self {
		Self {
			default_limit,
			authenticated_limit: authenticated_limit.max(default_limit),
			window,
			exempt_paths: Vec::new(),
		}
	}

	/// Replaces the exempt path list.
	pub fn with_exempt_paths<I, S>(mut self, paths: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.exempt_paths = paths.into_iter().map(Into::into).collect();

		self
	}

	/// Bucket capacity for the given tier.
	pub fn limit_for(&self, tier: LimitTier) -> u32 {
		match tier {
			LimitTier::Default => self.default_limit,
			LimitTier::Authenticated => self.authenticated_limit,
		}
	}

	/// Returns `true` for CORS preflights and health/metrics paths.
	pub fn is_exempt(&self, method: &Method, path: &str) -> bool {
		if *method == Method::OPTIONS {
			return true;
		}

		self.exempt_paths.iter().any(|exempt| {
			let exempt = exempt.trim_end_matches('/');

			path == exempt
				|| path.strip_prefix(exempt).is_some_and(|rest| rest.starts_with('/'))
		})
	}
}
impl Default for RateLimitPolicy {
	fn default() -> Self {
		Self::new(20, 100, Duration::minutes(1)).with_exempt_paths(["/health", "/metrics"])
	}
}

/// Result of one consumption attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// A token was taken; `remaining` are left in the current window.
	Admitted {
		/// Tokens left after this request.
		remaining: u32,
	},
	/// The bucket is empty until the next refill.
	Throttled(RetryDirective),
}
impl RateLimitDecision {
	/// Returns `true` if the request may proceed.
	pub fn is_admitted(&self) -> bool {
		matches!(self, Self::Admitted { .. })
	}

	/// Tokens left after an admitted request; zero when throttled.
	pub fn remaining(&self) -> u32 {
		match self {
			Self::Admitted { remaining } => *remaining,
			Self::Throttled(_) => 0,
		}
	}

	/// Whole seconds until a token becomes available; zero when admitted.
	pub fn retry_after_seconds(&self) -> u64 {
		match self {
			Self::Admitted { .. } => 0,
			Self::Throttled(directive) => directive.retry_after_seconds(),
		}
	}
}
impl From<RetryDirective> for RateLimitDecision {
	fn from(directive: RetryDirective) -> Self {
		Self::Throttled(directive)
	}
}

/// Advises callers when to retry after [`RateLimitDecision::Throttled`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant of the next refill.
	pub earliest_retry_at: OffsetDateTime,
	/// Time left until the next refill.
	pub retry_after: Duration,
	/// Optional descriptive string.
	pub reason: Option<String>,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, retry_after: Duration) -> Self {
		Self { earliest_retry_at, retry_after, reason: None }
	}

	/// Adds a human-readable reason.
	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());

		self
	}

	/// Wait rounded up to whole seconds, never less than one.
	pub fn retry_after_seconds(&self) -> u64 {
		let nanos = self.retry_after.whole_nanoseconds().max(0);
		let seconds = (nanos + 999_999_999) / 1_000_000_000;

		u64::try_from(seconds).unwrap_or(u64::MAX).max(1)
	}
}

/// Concurrent map of client buckets.
#[derive(Debug)]
pub struct RateLimiter {
	window: Duration,
	buckets: DashMap<ClientKey, Mutex<Bucket>>,
}
impl RateLimiter {
	/// Creates an empty limiter whose buckets refill every `window`.
	pub fn new(window: Duration) -> Self {
		Self { window, buckets: DashMap::new() }
	}

	/// Refill window shared by every bucket.
	pub fn window(&self) -> Duration {
		self.window
	}

	/// Takes one token from `key`'s bucket using the current clock.
	pub fn try_consume(&self, key: &ClientKey, limit: u32) -> RateLimitDecision {
		self.try_consume_at(key, limit, OffsetDateTime::now_utc())
	}

	/// Takes one token from `key`'s bucket as of `now`.
	///
	/// `limit` only sizes a bucket created by this call. An existing bucket keeps the capacity
	/// it was created with even if the caller's tier has changed since.
	pub fn try_consume_at(&self, key: &ClientKey, limit: u32, now: OffsetDateTime) -> RateLimitDecision {
		if let Some(bucket) = self.buckets.get(key) {
			return bucket.lock().try_consume(now);
		}

		let bucket = self
			.buckets
			.entry(key.clone())
			.or_insert_with(|| Mutex::new(Bucket::new(limit, self.window, now)));

		bucket.lock().try_consume(now)
	}

	/// Capacity of the bucket tracked for `key`, if one exists.
	pub fn capacity_of(&self, key: &str) -> Option<u32> {
		self.buckets.get(key).map(|bucket| bucket.lock().capacity())
	}

	/// Number of tracked client keys.
	pub fn len(&self) -> usize {
		self.buckets.len()
	}

	/// Returns `true` when no client has been seen.
	pub fn is_empty(&self) -> bool {
		self.buckets.is_empty()
	}

	/// Drops buckets not consulted within `idle_for` of `now`; returns how many were removed.
	pub fn evict_idle(&self, now: OffsetDateTime, idle_for: Duration) -> usize {
		let mut removed = 0;

		self.buckets.retain(|_, bucket| {
			let keep = bucket.get_mut().last_seen() + idle_for > now;

			if !keep {
				removed += 1;
			}

			keep
		});

		removed
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{sync::Barrier, thread};
	// crates.io
	use time::macros;
	// self
	use super::*;

	const START: OffsetDateTime = macros::datetime!(2025-04-01 10:00 UTC);

	fn key(name: &str) -> ClientKey {
		ClientKey::new("192.0.2.10", Some(name.as_bytes()))
	}

	#[test]
	fn buckets_are_isolated_per_key() {
		let limiter = RateLimiter::new(Duration::minutes(1));

		assert!(limiter.try_consume_at(&key("a"), 1, START).is_admitted());
		assert!(!limiter.try_consume_at(&key("a"), 1, START).is_admitted());
		assert!(limiter.try_consume_at(&key("b"), 1, START).is_admitted());
		assert_eq!(limiter.len(), 2);
	}

	#[test]
	fn existing_bucket_keeps_creation_capacity() {
		let limiter = RateLimiter::new(Duration::minutes(1));
		let client = key("upgrading");

		limiter.try_consume_at(&client, 2, START);

		let upgraded = limiter.try_consume_at(&client, 100, START);

		assert_eq!(upgraded, RateLimitDecision::Admitted { remaining: 0 });
		assert_eq!(limiter.capacity_of(client.as_str()), Some(2));
		assert!(!limiter.try_consume_at(&client, 100, START).is_admitted());
	}

	#[test]
	fn concurrent_consumers_never_over_admit() {
		const CAPACITY: u32 = 25;
		const CALLERS: usize = 64;

		let limiter = RateLimiter::new(Duration::minutes(1));
		let client = key("hammer");
		let barrier = Barrier::new(CALLERS);
		let admitted = thread::scope(|scope| {
			let handles: Vec<_> = (0..CALLERS)
				.map(|_| {
					scope.spawn(|| {
						barrier.wait();

						limiter.try_consume_at(&client, CAPACITY, START).is_admitted()
					})
				})
				.collect();

			handles
				.into_iter()
				.map(|handle| handle.join().expect("Consumer thread should not panic."))
				.filter(|admitted| *admitted)
				.count()
		});

		assert_eq!(admitted, CAPACITY as usize);
	}

	#[test]
	fn new_clients_do_not_disturb_known_ones() {
		const CAPACITY: u32 = 10;
		const NEWCOMERS: usize = 32;

		let limiter = RateLimiter::new(Duration::minutes(1));
		let regular = key("regular");
		let barrier = Barrier::new(NEWCOMERS + 1);
		let admitted = thread::scope(|scope| {
			for i in 0..NEWCOMERS {
				let (limiter, barrier) = (&limiter, &barrier);

				scope.spawn(move || {
					barrier.wait();

					for round in 0..8 {
						limiter.try_consume_at(&key(&format!("newcomer-{i}-{round}")), 1, START);
					}
				});
			}

			let regular_consumer = scope.spawn(|| {
				barrier.wait();

				(0..CAPACITY * 2)
					.filter(|_| limiter.try_consume_at(&regular, CAPACITY, START).is_admitted())
					.count()
			});

			regular_consumer.join().expect("Consumer thread should not panic.")
		});

		assert_eq!(admitted, CAPACITY as usize);
		assert_eq!(limiter.len(), NEWCOMERS * 8 + 1);
		assert_eq!(limiter.capacity_of(regular.as_str()), Some(CAPACITY));
	}

	#[test]
	fn idle_buckets_are_evicted() {
		let limiter = RateLimiter::new(Duration::minutes(1));

		limiter.try_consume_at(&key("stale"), 5, START);
		limiter.try_consume_at(&key("fresh"), 5, START + Duration::minutes(30));

		let removed = limiter.evict_idle(START + Duration::minutes(40), Duration::minutes(15));

		assert_eq!(removed, 1);
		assert_eq!(limiter.capacity_of(key("stale").as_str()), None);
		assert_eq!(limiter.capacity_of(key("fresh").as_str()), Some(5));
	}

	#[test]
	fn policy_exempts_preflight_and_health_paths() {
		let policy = RateLimitPolicy::default();

		assert!(policy.is_exempt(&Method::OPTIONS, "/api/stores"));
		assert!(policy.is_exempt(&Method::GET, "/health"));
		assert!(policy.is_exempt(&Method::GET, "/metrics/prometheus"));
		assert!(!policy.is_exempt(&Method::GET, "/healthcheck"));
		assert!(!policy.is_exempt(&Method::GET, "/api/products"));
		assert_eq!(policy.limit_for(LimitTier::Default), 20);
		assert_eq!(policy.limit_for(LimitTier::Authenticated), 100);
	}

	#[test]
	fn retry_seconds_round_up() {
		let directive = RetryDirective::new(START, Duration::milliseconds(1_200));

		assert_eq!(directive.retry_after_seconds(), 2);
		assert_eq!(RetryDirective::new(START, Duration::ZERO).retry_after_seconds(), 1);
		assert_eq!(
			RetryDirective::new(START, Duration::seconds(5)).with_reason("quota").reason.as_deref(),
			Some("quota")
		);
	}
}
