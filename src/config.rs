//! Explicit configuration values injected into the broker, registry, and relay at construction.

// self
use crate::{_prelude::*, auth::CredentialKind, error::ConfigError};

/// Tunables shared by the session broker and the client registry.
///
/// Every value has a conservative default; nothing is read from the process environment.
/// The `expires_in_min` hint is advisory and never enforced by the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerConfig {
	/// Length of single-use authorization codes.
	pub code_length: usize,
	/// Length of client secrets minted on callback declaration.
	pub secret_length: usize,
	/// Length of bearer tokens minted on redemption.
	pub token_length: usize,
	/// Advisory expiry hint returned with each code, in minutes.
	pub expires_in_min: u32,
	/// Upper bound for a single storage round trip.
	pub store_timeout: Duration,
}
impl BrokerConfig {
	/// Default authorization code length.
	pub const DEFAULT_CODE_LENGTH: usize = 32;
	/// Default advisory expiry hint.
	pub const DEFAULT_EXPIRES_IN_MIN: u32 = 60;
	/// Default client secret length.
	pub const DEFAULT_SECRET_LENGTH: usize = 64;
	/// Default storage timeout.
	pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::seconds(5);
	/// Default bearer token length.
	pub const DEFAULT_TOKEN_LENGTH: usize = 255;
	/// Widest credential the session and client columns hold (`VARCHAR(255)`).
	pub const MAX_CREDENTIAL_LENGTH: usize = 255;

	/// Overrides the authorization code length.
	pub fn with_code_length(mut self, len: usize) -> Self {
		self.code_length = len;

		self
	}

	/// Overrides the client secret length.
	pub fn with_secret_length(mut self, len: usize) -> Self {
		self.secret_length = len;

		self
	}

	/// Overrides the bearer token length.
	pub fn with_token_length(mut self, len: usize) -> Self {
		self.token_length = len;

		self
	}

	/// Overrides the advisory expiry hint.
	pub fn with_expires_in_min(mut self, minutes: u32) -> Self {
		self.expires_in_min = minutes;

		self
	}

	/// Overrides the storage timeout.
	pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
		self.store_timeout = timeout;

		self
	}

	/// Length used for the given credential class.
	pub fn length_of(&self, kind: CredentialKind) -> usize {
		match kind {
			CredentialKind::Code => self.code_length,
			CredentialKind::Secret => self.secret_length,
			CredentialKind::Token => self.token_length,
		}
	}

	/// Checks credential lengths and timeouts.
	pub fn validate(&self) -> Result<(), ConfigError> {
		for kind in [CredentialKind::Code, CredentialKind::Secret, CredentialKind::Token] {
			let len = self.length_of(kind);

			if len == 0 {
				return Err(ConfigError::ZeroCredentialLength { class: kind.as_str() });
			}
			if len > Self::MAX_CREDENTIAL_LENGTH {
				return Err(ConfigError::CredentialTooLong {
					class: kind.as_str(),
					len,
					max: Self::MAX_CREDENTIAL_LENGTH,
				});
			}
		}

		if !(self.code_length < self.secret_length && self.secret_length < self.token_length) {
			return Err(ConfigError::CredentialLengthOrder {
				code: self.code_length,
				secret: self.secret_length,
				token: self.token_length,
			});
		}
		if !self.store_timeout.is_positive() {
			return Err(ConfigError::NonPositiveTimeout { what: "store" });
		}

		Ok(())
	}
}
impl Default for BrokerConfig {
	fn default() -> Self {
		Self {
			code_length: Self::DEFAULT_CODE_LENGTH,
			secret_length: Self::DEFAULT_SECRET_LENGTH,
			token_length: Self::DEFAULT_TOKEN_LENGTH,
			expires_in_min: Self::DEFAULT_EXPIRES_IN_MIN,
			store_timeout: Self::DEFAULT_STORE_TIMEOUT,
		}
	}
}

/// Settings for the remote authorization service used by the relay variant.
#[derive(Clone)]
pub struct RelayConfig {
	/// Address receiving session-start requests.
	pub endpoint: Url,
	/// Shared bearer secret sent in the `Authorization` header.
	pub bearer: crate::auth::Credential,
	/// Upper bound for a single relay round trip.
	pub timeout: Duration,
}
impl RelayConfig {
	/// Address used when the Gateway supplies none.
	pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080";
	/// Default request timeout.
	pub const DEFAULT_TIMEOUT: Duration = Duration::seconds(10);

	/// Builds a relay configuration; both values are mandatory.
	pub fn new(endpoint: &str, bearer: &str) -> Result<Self, ConfigError> {
		if bearer.trim().is_empty() {
			return Err(ConfigError::MissingRelaySecret);
		}

		let endpoint =
			Url::parse(endpoint).map_err(|source| ConfigError::InvalidRelayEndpoint { source })?;

		Ok(Self {
			endpoint,
			bearer: crate::auth::Credential::new(bearer),
			timeout: Self::DEFAULT_TIMEOUT,
		})
	}

	/// Builds a relay configuration against [`Self::DEFAULT_ENDPOINT`].
	pub fn with_default_endpoint(bearer: &str) -> Result<Self, ConfigError> {
		Self::new(Self::DEFAULT_ENDPOINT, bearer)
	}

	/// Overrides the request timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Checks the timeout.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.timeout.is_positive() {
			Ok(())
		} else {
			Err(ConfigError::NonPositiveTimeout { what: "relay" })
		}
	}
}
impl Debug for RelayConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RelayConfig")
			.field("endpoint", &self.endpoint.as_str())
			.field("bearer", &self.bearer)
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Converts a positive [`Duration`] into [`std::time::Duration`], clamping negatives to zero.
#[cfg_attr(not(any(feature = "reqwest", feature = "postgres")), allow(dead_code))]
pub(crate) fn to_std(duration: Duration) -> std::time::Duration {
	std::time::Duration::try_from(duration).unwrap_or_default()
}
