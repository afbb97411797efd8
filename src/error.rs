//! Broker-level error types shared across the registry, link directory, sessions, and stores.

// self
use crate::{_prelude::*, store::StoreError};

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(#[source] StoreError),
	/// Stored data could not be turned into a session payload.
	#[error(transparent)]
	Payload(#[from] PayloadError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Remote authorization service failure (relay mode only).
	#[error(transparent)]
	Upstream(#[from] UpstreamError),

	/// Caller input is missing or malformed.
	#[error("Invalid request: {reason}.")]
	Validation {
		/// Human-readable description of the rejected input.
		reason: String,
	},
	/// Referenced person, client, link, code, or token does not exist.
	#[error("{entity} `{key}` was not found.")]
	NotFound {
		/// Entity label (`Person`, `Client`, `Code`, ...).
		entity: &'static str,
		/// Key the caller supplied.
		key: String,
	},
	/// A unique key is already taken.
	#[error("Conflict: {reason}.")]
	Conflict {
		/// Storage- or broker-supplied reason string.
		reason: String,
	},
	/// Bearer credential is missing or malformed.
	#[error("Missing or malformed bearer credential.")]
	Unauthorized,
	/// The client has no callback URL, so no session can be started on its behalf.
	#[error("Client `{client_id}` has no callback URL declared.")]
	CallbackNotDeclared {
		/// External identifier of the client.
		client_id: String,
	},
}
impl Error {
	/// Shorthand for [`Error::Validation`].
	pub fn validation(reason: impl Into<String>) -> Self {
		Self::Validation { reason: reason.into() }
	}

	/// Shorthand for [`Error::NotFound`].
	pub fn not_found(entity: &'static str, key: impl Display) -> Self {
		Self::NotFound { entity, key: key.to_string() }
	}

	/// HTTP status the Gateway should answer with for this error.
	pub fn status(&self) -> u16 {
		match self {
			Self::Validation { .. } => 400,
			Self::Unauthorized => 401,
			Self::NotFound { .. } => 404,
			Self::Conflict { .. } => 409,
			Self::Storage(_)
			| Self::Payload(_)
			| Self::Config(_)
			| Self::Upstream(_)
			| Self::CallbackNotDeclared { .. } => 500,
		}
	}
}
impl From<StoreError> for Error {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::Conflict { message } => Self::Conflict { reason: message },
			other => Self::Storage(other),
		}
	}
}
impl From<crate::auth::IdentifierError> for Error {
	fn from(e: crate::auth::IdentifierError) -> Self {
		Self::validation(e.to_string())
	}
}

/// Failures raised while composing or decoding session payloads.
#[derive(Debug, ThisError)]
pub enum PayloadError {
	/// Link profile is not a JSON object.
	#[error("Profile of person {person} for client {client} is not a JSON object.")]
	MalformedProfile {
		/// Person row identifier.
		person: i64,
		/// Client row identifier.
		client: i64,
		/// Structured parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// Payload could not be serialized for storage.
	#[error("Session payload could not be serialized.")]
	Serialize(#[source] serde_json::Error),
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A credential length of zero was configured.
	#[error("The {class} length must be positive.")]
	ZeroCredentialLength {
		/// Credential class label.
		class: &'static str,
	},
	/// A credential length exceeds what the storage columns hold.
	#[error("The {class} length {len} exceeds the maximum of {max}.")]
	CredentialTooLong {
		/// Credential class label.
		class: &'static str,
		/// Configured length.
		len: usize,
		/// Largest accepted length.
		max: usize,
	},
	/// Credential lengths are not strictly ordered code < secret < token.
	#[error("Credential lengths must satisfy code < secret < token (got {code}/{secret}/{token}).")]
	CredentialLengthOrder {
		/// Configured code length.
		code: usize,
		/// Configured secret length.
		secret: usize,
		/// Configured token length.
		token: usize,
	},
	/// Store or relay timeout is zero or negative.
	#[error("The {what} timeout must be positive.")]
	NonPositiveTimeout {
		/// Which timeout was rejected.
		what: &'static str,
	},
	/// Relay shared secret was not supplied.
	#[error("Relay shared secret is not set.")]
	MissingRelaySecret,
	/// Relay service address is empty or unparsable.
	#[error("Relay service address is invalid.")]
	InvalidRelayEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Operation requires the local session store, but the broker relays sessions.
	#[error("Sessions are delegated to the remote authorization service; {operation} is unavailable.")]
	SessionsDelegated {
		/// Operation the caller attempted.
		operation: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Failures reported by the remote authorization service.
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// Service answered with a non-success status.
	#[error("Authorization service returned status {status}: {message}.")]
	Status {
		/// HTTP status code.
		status: u16,
		/// Response body (possibly truncated).
		message: String,
	},
	/// Service responded with malformed JSON that could not be parsed.
	#[error("Authorization service returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code.
		status: u16,
	},
	/// Service answered with success but issued an empty code.
	#[error("Authorization service returned status {status} without a code.")]
	MissingCode {
		/// HTTP status code.
		status: u16,
	},
	/// Network failure (DNS, TCP, TLS, timeout).
	#[error("Network error occurred while calling the authorization service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
}
impl UpstreamError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for UpstreamError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
