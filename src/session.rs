//! Login and logout on top of the token codec and the revocation store.

// crates.io
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{Principal, Subject, TokenCodec, TokenPair, TokenSecret},
	gate::RequestGate,
	obs,
	store::RevocationStore,
};

/// Boxed future returned by [`AccountDirectory`] lookups.
pub type DirectoryFuture<'a> = Pin<Box<dyn Future<Output = Result<Option<Principal>>> + 'a + Send>>;

/// Account lookup collaborator that checks login credentials.
pub trait AccountDirectory
where
	Self: Send + Sync,
{
	/// Returns the principal owning `credentials`, or `None` when they do not match an account.
	fn authenticate<'a>(&'a self, credentials: &'a Credentials) -> DirectoryFuture<'a>;
}

/// Email and password submitted to `POST /auth/login`.
#[derive(Clone, Deserialize)]
pub struct Credentials {
	/// Account email address.
	pub email: String,
	/// Plain-text password; never logged.
	pub password: TokenSecret,
}
impl Credentials {
	/// Creates credentials from raw values.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: TokenSecret::new(password) }
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// In-process [`AccountDirectory`] keyed by email, storing SHA-256 password digests.
///
/// Intended for development setups and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
	accounts: Arc<RwLock<HashMap<String, (Vec<u8>, Principal)>>>,
}
impl StaticDirectory {
	/// Registers (or replaces) the account for `email`.
	pub fn insert(&self, email: impl Into<String>, password: &str, principal: Principal) {
		self.accounts.write().insert(email.into(), (Self::digest(password), principal));
	}

	/// Registers an account and returns the directory.
	pub fn with_account(self, email: impl Into<String>, password: &str, principal: Principal) -> Self {
		self.insert(email, password, principal);

		self
	}

	fn digest(password: &str) -> Vec<u8> {
		Sha256::digest(password.as_bytes()).to_vec()
	}
}
impl AccountDirectory for StaticDirectory {
	fn authenticate<'a>(&'a self, credentials: &'a Credentials) -> DirectoryFuture<'a> {
		Box::pin(async move {
			let digest = Self::digest(credentials.password.expose());
			let accounts = self.accounts.read();

			Ok(accounts
				.get(&credentials.email)
				.filter(|(stored, _)| *stored == digest)
				.map(|(_, principal)| principal.clone()))
		})
	}
}

/// Issues token pairs at login and revokes them at logout.
#[derive(Clone)]
pub struct SessionService {
	codec: Arc<TokenCodec>,
	revocations: Arc<dyn RevocationStore>,
	directory: Arc<dyn AccountDirectory>,
}
impl SessionService {
	/// Creates a service from its collaborators.
	pub fn new(
		codec: Arc<TokenCodec>,
		revocations: Arc<dyn RevocationStore>,
		directory: Arc<dyn AccountDirectory>,
	) -> Self {
		Self { codec, revocations, directory }
	}

	/// Shares the codec and revocation store of `gate` so issued tokens are the ones it verifies.
	pub fn for_gate(gate: &RequestGate, directory: Arc<dyn AccountDirectory>) -> Self {
		Self::new(gate.codec().clone(), gate.revocations().clone(), directory)
	}

	/// Checks `credentials` and issues an access + refresh pair.
	pub async fn login(&self, credentials: &Credentials) -> Result<TokenPair> {
		self.login_at(credentials, OffsetDateTime::now_utc()).await
	}

	/// Checks `credentials` and issues a pair as of `now`.
	pub async fn login_at(&self, credentials: &Credentials, now: OffsetDateTime) -> Result<TokenPair> {
		let Some(principal) = self.directory.authenticate(credentials).await? else {
			obs::login_rejected();

			return Err(Error::InvalidCredentials);
		};
		let pair = self.codec.issue_pair_at(&principal.subject, &principal.roles, now)?;

		obs::session_opened(&principal.subject);

		Ok(pair)
	}

	/// Revokes the presented access token and, when it belongs to the same subject, the refresh
	/// token.
	///
	/// Revocation is idempotent, so a logout that failed halfway can be retried with the same
	/// tokens.
	pub async fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> Result<Subject> {
		self.logout_at(access_token, refresh_token, OffsetDateTime::now_utc()).await
	}

	/// Logout as of `now`.
	pub async fn logout_at(
		&self,
		access_token: &str,
		refresh_token: Option<&str>,
		now: OffsetDateTime,
	) -> Result<Subject> {
		let principal = self.codec.verify_at(access_token, now).map_err(|_| Error::Unauthenticated)?;

		self.revocations.revoke_token(access_token, now).await?;

		if let Some(refresh_token) = refresh_token {
			match self.codec.verify_refresh_at(refresh_token, now) {
				Ok(owner) if owner.subject == principal.subject =>
					self.revocations.revoke_token(refresh_token, now).await?,
				// Foreign, dead, or access tokens in the refresh slot are left alone.
				_ => {},
			}
		}

		obs::session_closed(&principal.subject);

		Ok(principal.subject)
	}
}
impl Debug for SessionService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionService").field("codec", &self.codec).finish_non_exhaustive()
	}
}
