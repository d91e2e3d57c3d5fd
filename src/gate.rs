//! Per-request admission: identity, rate limiting, token verification, and revocation.
//!
//! [`RequestGate::evaluate`] runs once per inbound request, in this order:
//!
//! 1. resolve the [`ClientKey`];
//! 2. take a token from the client's bucket unless the request is exempt, sizing new buckets by
//!    the [`SecurityContext`] the request carried *into* the gate (normally anonymous);
//! 3. extract the bearer token; none means the request proceeds anonymously;
//! 4. verify it; failures are logged with their cause and the request proceeds anonymously;
//! 5. consult the revocation store; a revoked token ends the request with 401;
//! 6. establish the principal.
//!
//! The revocation store is only consulted for tokens that verified.

// std
use std::net::IpAddr;
// crates.io
use axum::http::Method;
// self
use crate::{
	_prelude::*,
	auth::{SecurityContext, TokenCodec},
	config::GateConfig,
	identity::{ClientIdentityResolver, ClientKey},
	limit::{LimitTier, RateLimitDecision, RateLimitPolicy, RateLimiter, RetryDirective},
	obs::{self, GateOutcome, GateSpan},
	store::RevocationStore,
};

/// What to do when the revocation store cannot be consulted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationFailurePolicy {
	/// Keep honoring the verified token; the outage is logged.
	#[default]
	FailOpen,
	/// Refuse the request with 503 until the store recovers.
	FailClosed,
}
impl RevocationFailurePolicy {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RevocationFailurePolicy::FailOpen => "fail_open",
			RevocationFailurePolicy::FailClosed => "fail_closed",
		}
	}
}

/// Transport-independent view of the request metadata the gate needs.
#[derive(Clone, Copy, Debug)]
pub struct GateRequest<'a> {
	/// HTTP method.
	pub method: &'a Method,
	/// Request path without the query string.
	pub path: &'a str,
	/// Peer address of the connection, if known.
	pub remote: Option<IpAddr>,
	/// Raw `X-Forwarded-For` header.
	pub forwarded_for: Option<&'a str>,
	/// Raw `User-Agent` header bytes.
	pub user_agent: Option<&'a [u8]>,
	/// Raw `Authorization` header.
	pub authorization: Option<&'a str>,
	/// Security context already attached when the request reached the gate.
	pub prior_context: Option<&'a SecurityContext>,
}
impl<'a> GateRequest<'a> {
	/// Creates a request with only method and path set.
	pub fn new(method: &'a Method, path: &'a str) -> Self {
		Self {
			method,
			path,
			remote: None,
			forwarded_for: None,
			user_agent: None,
			authorization: None,
			prior_context: None,
		}
	}

	/// Sets the peer address.
	pub fn with_remote(mut self, remote: IpAddr) -> Self {
		self.remote = Some(remote);

		self
	}

	/// Sets the `User-Agent` header value.
	pub fn with_user_agent<V>(mut self, user_agent: &'a V) -> Self
	where
		V: ?Sized + AsRef<[u8]>,
	{
		self.user_agent = Some(user_agent.as_ref());

		self
	}

	/// Sets the `Authorization` header value.
	pub fn with_authorization(mut self, authorization: &'a str) -> Self {
		self.authorization = Some(authorization);

		self
	}

	/// Sets the context the request carried into the gate.
	pub fn with_prior_context(mut self, context: &'a SecurityContext) -> Self {
		self.prior_context = Some(context);

		self
	}
}

/// Outcome of [`RequestGate::evaluate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GateDecision {
	/// The request reaches business logic.
	Admitted {
		/// Resolved client key.
		client: ClientKey,
		/// Established context; anonymous when no valid token was presented.
		context: SecurityContext,
		/// Tokens left in the client's bucket; `None` for exempt requests.
		remaining: Option<u32>,
	},
	/// The client's bucket is empty (429).
	Throttled {
		/// Resolved client key.
		client: ClientKey,
		/// When to retry.
		directive: RetryDirective,
	},
	/// A verified but revoked token was presented (401).
	Revoked {
		/// Resolved client key.
		client: ClientKey,
	},
	/// The revocation store failed under [`RevocationFailurePolicy::FailClosed`] (503).
	Unavailable {
		/// Resolved client key.
		client: ClientKey,
	},
}
impl GateDecision {
	/// Resolved client key for every outcome.
	pub fn client(&self) -> &ClientKey {
		match self {
			Self::Admitted { client, .. }
			| Self::Throttled { client, .. }
			| Self::Revoked { client }
			| Self::Unavailable { client } => client,
		}
	}

	/// Metric/log label for the decision.
	pub fn outcome(&self) -> GateOutcome {
		match self {
			Self::Admitted { context, .. } if context.is_authenticated() => GateOutcome::Authenticated,
			Self::Admitted { .. } => GateOutcome::Anonymous,
			Self::Throttled { .. } => GateOutcome::Throttled,
			Self::Revoked { .. } => GateOutcome::Revoked,
			Self::Unavailable { .. } => GateOutcome::Unavailable,
		}
	}
}

/// Orchestrates identity resolution, rate limiting, verification, and revocation checks.
#[derive(Clone)]
pub struct RequestGate {
	resolver: ClientIdentityResolver,
	codec: Arc<TokenCodec>,
	limiter: Arc<RateLimiter>,
	revocations: Arc<dyn RevocationStore>,
	policy: RateLimitPolicy,
	failure_policy: RevocationFailurePolicy,
}
impl RequestGate {
	/// Creates a gate with a fresh limiter sized by `policy`.
	pub fn new(
		codec: Arc<TokenCodec>,
		revocations: Arc<dyn RevocationStore>,
		policy: RateLimitPolicy,
	) -> Self {
		Self {
			resolver: ClientIdentityResolver::default(),
			codec,
			limiter: Arc::new(RateLimiter::new(policy.window)),
			revocations,
			policy,
			failure_policy: RevocationFailurePolicy::default(),
		}
	}

	/// Builds the gate described by a validated [`GateConfig`].
	pub fn from_config(config: &GateConfig, revocations: Arc<dyn RevocationStore>) -> Self {
		let codec =
			TokenCodec::new(&config.secret, config.access_token_ttl(), config.refresh_token_ttl());

		Self::new(Arc::new(codec), revocations, config.rate_limit_policy())
			.with_resolver(ClientIdentityResolver::new(config.trust_forwarded_for))
			.with_failure_policy(config.revocation_failure)
	}

	/// Replaces the identity resolver.
	pub fn with_resolver(mut self, resolver: ClientIdentityResolver) -> Self {
		self.resolver = resolver;

		self
	}

	/// Replaces the revocation outage policy.
	pub fn with_failure_policy(mut self, policy: RevocationFailurePolicy) -> Self {
		self.failure_policy = policy;

		self
	}

	/// Token codec shared with the session service.
	pub fn codec(&self) -> &Arc<TokenCodec> {
		&self.codec
	}

	/// Revocation store shared with the session service.
	pub fn revocations(&self) -> &Arc<dyn RevocationStore> {
		&self.revocations
	}

	/// Bucket map, for housekeeping and introspection.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	/// Limits and exemptions in force.
	pub fn policy(&self) -> &RateLimitPolicy {
		&self.policy
	}

	/// Evaluates one request against the current clock.
	pub async fn evaluate(&self, request: GateRequest<'_>) -> GateDecision {
		self.evaluate_at(request, OffsetDateTime::now_utc()).await
	}

	/// Evaluates one request as of `now`.
	pub async fn evaluate_at(&self, request: GateRequest<'_>, now: OffsetDateTime) -> GateDecision {
		let client = self.resolver.resolve(request.remote, request.forwarded_for, request.user_agent);
		let span = GateSpan::new("evaluate", &client);
		let decision = span.instrument(self.decide(request, client, now)).await;

		obs::record_gate_outcome(decision.outcome());

		decision
	}

	async fn decide(
		&self,
		request: GateRequest<'_>,
		client: ClientKey,
		now: OffsetDateTime,
	) -> GateDecision {
		let remaining = if self.policy.is_exempt(request.method, request.path) {
			None
		} else {
			let tier = match request.prior_context {
				Some(context) if context.is_authenticated() => LimitTier::Authenticated,
				_ => LimitTier::Default,
			};

			match self.limiter.try_consume_at(&client, self.policy.limit_for(tier), now) {
				RateLimitDecision::Admitted { remaining } => Some(remaining),
				RateLimitDecision::Throttled(directive) => {
					obs::request_throttled(&client, directive.retry_after_seconds());

					return GateDecision::Throttled { client, directive };
				},
			}
		};
		let Some(token) = request.authorization.and_then(bearer_token) else {
			return GateDecision::Admitted { client, context: SecurityContext::anonymous(), remaining };
		};
		let principal = match self.codec.verify_at(token, now) {
			Ok(principal) => principal,
			Err(cause) => {
				obs::token_rejected(&client, cause);

				return GateDecision::Admitted {
					client,
					context: SecurityContext::anonymous(),
					remaining,
				};
			},
		};

		match self.revocations.is_revoked(token).await {
			Ok(false) => {},
			Ok(true) => {
				obs::revoked_token_presented(&client, &principal.subject);

				return GateDecision::Revoked { client };
			},
			Err(e) => {
				obs::revocation_lookup_failed(&client, &e, self.failure_policy);

				if self.failure_policy == RevocationFailurePolicy::FailClosed {
					return GateDecision::Unavailable { client };
				}
			},
		}

		GateDecision::Admitted { client, context: SecurityContext::authenticated(principal), remaining }
	}
}
impl Debug for RequestGate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestGate")
			.field("codec", &self.codec)
			.field("policy", &self.policy)
			.field("failure_policy", &self.failure_policy)
			.field("tracked_clients", &self.limiter.len())
			.finish()
	}
}

/// Extracts the credential from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively; other schemes yield `None`.
pub fn bearer_token(header: &str) -> Option<&str> {
	let (scheme, credential) = header.trim_start().split_once(' ')?;

	scheme.eq_ignore_ascii_case("bearer").then(|| credential.trim())
}
