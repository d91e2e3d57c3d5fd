//! axum integration: the admission middleware and the session endpoints.
//!
//! ```ignore
//! let gate = RequestGate::from_config(&config, Arc::new(MemoryStore::default()));
//! let sessions = SessionService::for_gate(&gate, directory);
//! let app = http::with_admission(api_routes.merge(http::router(sessions)), gate);
//!
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```
//!
//! Serving with connect info lets the gate key clients by peer address; without it every
//! client shares the `unknown` address.

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	Json, Router,
	body::Bytes,
	extract::{ConnectInfo, Request, State},
	http::{
		HeaderMap, HeaderValue, StatusCode,
		header::{self, AsHeaderName},
	},
	middleware::{self, Next},
	response::{IntoResponse, Response},
	routing::{get, post},
};
// self
use crate::{
	_prelude::*,
	auth::{SecurityContext, TokenPair, TokenSecret},
	gate::{self, GateDecision, GateRequest, RequestGate},
	limit::RetryDirective,
	session::{Credentials, SessionService},
};

/// Response header carrying the tokens left in the caller's bucket.
pub const RATE_LIMIT_REMAINING: &str = "x-rate-limit-remaining";
/// Response header carrying the seconds to wait after a 429.
pub const RATE_LIMIT_RETRY_AFTER_SECONDS: &str = "x-rate-limit-retry-after-seconds";
/// Request header consulted when forwarded addresses are trusted.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// JSON body of a throttled response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottledBody {
	/// Always `Too many requests`.
	pub error: String,
	/// Human-readable detail.
	pub message: String,
}

/// JSON body returned by `POST /auth/login`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
	/// Short-lived access token.
	pub access_token: String,
	/// Long-lived refresh token.
	pub refresh_token: String,
	/// Always `Bearer`.
	pub token_type: String,
	/// Access token lifetime in seconds.
	pub expires_in: i64,
}
impl From<TokenPair> for LoginResponse {
	fn from(pair: TokenPair) -> Self {
		Self {
			access_token: pair.access_token.expose().to_owned(),
			refresh_token: pair.refresh_token.expose().to_owned(),
			token_type: "Bearer".into(),
			expires_in: pair.access_expires_in.whole_seconds(),
		}
	}
}

/// Optional JSON body of `POST /auth/logout`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LogoutRequest {
	/// Refresh token to revoke alongside the access token.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
}

/// Wraps every route of `router` with [`admit`].
pub fn with_admission<S>(router: Router<S>, gate: RequestGate) -> Router<S>
where
	S: 'static + Clone + Send + Sync,
{
	router.layer(middleware::from_fn_with_state(gate, admit))
}

/// Session routes: `POST /auth/login`, `POST /auth/logout`, and `GET /health`.
pub fn router(sessions: SessionService) -> Router {
	Router::new()
		.route("/auth/login", post(login))
		.route("/auth/logout", post(logout))
		.route("/health", get(health))
		.with_state(sessions)
}

/// Admission middleware.
///
/// Admitted requests continue with [`ClientKey`](crate::identity::ClientKey) and
/// [`SecurityContext`] in their extensions. Throttled requests get 429, revoked tokens 401, and
/// revocation outages under a fail-closed policy 503.
pub async fn admit(State(gate): State<RequestGate>, request: Request, next: Next) -> Response {
	let (mut parts, body) = request.into_parts();
	let decision = {
		let remote = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip());
		let gate_request = GateRequest {
			method: &parts.method,
			path: parts.uri.path(),
			remote,
			forwarded_for: header_str(&parts.headers, FORWARDED_FOR),
			user_agent: parts.headers.get(header::USER_AGENT).map(HeaderValue::as_bytes),
			authorization: header_str(&parts.headers, header::AUTHORIZATION),
			prior_context: parts.extensions.get::<SecurityContext>(),
		};

		gate.evaluate(gate_request).await
	};

	match decision {
		GateDecision::Admitted { client, context, remaining } => {
			parts.extensions.insert(client);
			parts.extensions.insert(context);

			let mut response = next.run(Request::from_parts(parts, body)).await;

			if let Some(remaining) = remaining {
				response.headers_mut().insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
			}

			response
		},
		GateDecision::Throttled { directive, .. } => too_many_requests(&directive),
		GateDecision::Revoked { .. } => StatusCode::UNAUTHORIZED.into_response(),
		GateDecision::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE.into_response(),
	}
}

/// Builds the 429 response for `directive`.
pub fn too_many_requests(directive: &RetryDirective) -> Response {
	let seconds = directive.retry_after_seconds();
	let detail = directive.reason.as_deref().unwrap_or("Rate limit exceeded.");
	let body = ThrottledBody {
		error: "Too many requests".into(),
		message: format!("{detail} Try again in {seconds} seconds."),
	};

	(StatusCode::TOO_MANY_REQUESTS, [(RATE_LIMIT_RETRY_AFTER_SECONDS, seconds.to_string())], Json(body))
		.into_response()
}

async fn login(
	State(sessions): State<SessionService>,
	Json(credentials): Json<Credentials>,
) -> Result<Json<LoginResponse>> {
	Ok(Json(sessions.login(&credentials).await?.into()))
}

async fn logout(
	State(sessions): State<SessionService>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<StatusCode, Response> {
	let Some(token) = header_str(&headers, header::AUTHORIZATION).and_then(gate::bearer_token)
	else {
		return Err(Error::Unauthenticated.into_response());
	};
	let request = if body.iter().all(u8::is_ascii_whitespace) {
		LogoutRequest::default()
	} else {
		serde_json::from_slice::<LogoutRequest>(&body)
			.map_err(|_| StatusCode::BAD_REQUEST.into_response())?
	};

	sessions
		.logout(token, request.refresh_token.as_ref().map(TokenSecret::expose))
		.await
		.map_err(IntoResponse::into_response)?;

	Ok(StatusCode::NO_CONTENT)
}

async fn health() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "status": "ok" }))
}

fn header_str<K>(headers: &HeaderMap, name: K) -> Option<&str>
where
	K: AsHeaderName,
{
	headers.get(name).and_then(|value| value.to_str().ok())
}

impl IntoResponse for Error {
	fn into_response(self) -> Response {
		let status = match &self {
			Error::InvalidCredentials | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
			Error::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
			Error::Config(_) | Error::Signing { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		};

		(status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
	}
}
