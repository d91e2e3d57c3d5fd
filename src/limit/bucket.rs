//! Interval-refill token bucket.

// self
use crate::{
	_prelude::*,
	limit::{RateLimitDecision, RetryDirective},
};

/// Quota tracker for one client key.
///
/// The bucket starts full and jumps back to full at each window boundary measured from its
/// creation; tokens never trickle in between boundaries. `0 <= available <= capacity` holds
/// after every mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
	capacity: u32,
	refill_tokens: u32,
	window: Duration,
	available: u32,
	last_refill: OffsetDateTime,
	last_seen: OffsetDateTime,
}
impl Bucket {
	/// Creates a full bucket of `capacity` tokens refilled by `capacity` every `window`.
	pub fn new(capacity: u32, window: Duration, now: OffsetDateTime) -> Self {
		Self {
			capacity,
			refill_tokens: capacity,
			window,
			available: capacity,
			last_refill: now,
			last_seen: now,
		}
	}

	/// Maximum number of tokens; fixed at creation.
	pub fn capacity(&self) -> u32 {
		self.capacity
	}

	/// Tokens currently available, without applying a pending refill.
	pub fn available(&self) -> u32 {
		self.available
	}

	/// Last instant this bucket was consulted.
	pub fn last_seen(&self) -> OffsetDateTime {
		self.last_seen
	}

	/// Applies any due refill, then tries to take one token.
	pub fn try_consume(&mut self, now: OffsetDateTime) -> RateLimitDecision {
		self.refill(now);

		if now > self.last_seen {
			self.last_seen = now;
		}
		if self.available > 0 {
			self.available -= 1;

			return RateLimitDecision::Admitted { remaining: self.available };
		}

		let next_refill = self.last_refill + self.window;

		RetryDirective::new(next_refill, next_refill - now)
			.with_reason(format!("Limit of {} requests per window reached.", self.capacity))
			.into()
	}

	fn refill(&mut self, now: OffsetDateTime) {
		let window_nanos = self.window.whole_nanoseconds();

		if window_nanos <= 0 || now <= self.last_refill {
			return;
		}

		let periods = (now - self.last_refill).whole_nanoseconds() / window_nanos;

		if periods == 0 {
			return;
		}

		let added = i128::from(self.refill_tokens).saturating_mul(periods);
		let refilled = (i128::from(self.available) + added).min(i128::from(self.capacity));

		self.available = u32::try_from(refilled).unwrap_or(self.capacity);
		self.last_refill = match i64::try_from(periods * window_nanos) {
			Ok(advance) => self.last_refill + Duration::nanoseconds(advance),
			Err(_) => now,
		};
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	const START: OffsetDateTime = macros::datetime!(2025-04-01 10:00 UTC);

	#[test]
	fn admits_exactly_capacity_then_throttles() {
		let mut bucket = Bucket::new(3, Duration::minutes(1), START);

		assert_eq!(bucket.try_consume(START), RateLimitDecision::Admitted { remaining: 2 });
		assert_eq!(bucket.try_consume(START), RateLimitDecision::Admitted { remaining: 1 });
		assert_eq!(bucket.try_consume(START), RateLimitDecision::Admitted { remaining: 0 });
		assert!(!bucket.try_consume(START).is_admitted());
		assert_eq!(bucket.available(), 0);
	}

	#[test]
	fn refill_is_interval_not_gradual() {
		let mut bucket = Bucket::new(2, Duration::minutes(1), START);

		bucket.try_consume(START);
		bucket.try_consume(START);

		let almost = START + Duration::seconds(59);

		assert!(!bucket.try_consume(almost).is_admitted(), "No tokens trickle in mid-window.");

		let boundary = START + Duration::minutes(1);

		assert_eq!(bucket.try_consume(boundary), RateLimitDecision::Admitted { remaining: 1 });
		assert_eq!(bucket.try_consume(boundary), RateLimitDecision::Admitted { remaining: 0 });
		assert!(!bucket.try_consume(boundary).is_admitted());
	}

	#[test]
	fn refill_never_exceeds_capacity() {
		let mut bucket = Bucket::new(5, Duration::minutes(1), START);

		bucket.try_consume(START);
		bucket.try_consume(START + Duration::hours(10));

		assert_eq!(bucket.available(), 4);
		assert!(bucket.available() <= bucket.capacity());
	}

	#[test]
	fn retry_points_at_next_boundary() {
		let mut bucket = Bucket::new(1, Duration::minutes(1), START);

		bucket.try_consume(START);

		let now = START + Duration::seconds(90);

		bucket.try_consume(now);

		let RateLimitDecision::Throttled(directive) =
			bucket.try_consume(now + Duration::milliseconds(500))
		else {
			panic!("Exhausted bucket should throttle.");
		};

		assert_eq!(directive.earliest_retry_at, START + Duration::minutes(2));
		assert_eq!(directive.retry_after_seconds(), 30);
	}
}
