//! Wire shapes and header helpers for the Gateway that fronts the broker.
//!
//! Routing stays outside this crate; these types pin the JSON contracts of the session-start,
//! token, and profile endpoints plus the flat `{"error": "..."}` failure body.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, Credential, PersonId},
	broker::SessionGrant,
};

const BEARER_SCHEME: &str = "Bearer";

/// `POST /session-start` body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSessionRequest {
	/// Person the session is started for.
	pub person_id: PersonId,
	/// Row identifier of the requesting client.
	pub client_id: ClientId,
}

/// `POST /session-start` success body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSessionResponse {
	/// Single-use authorization code.
	pub code: Credential,
	/// Advisory expiry hint in minutes.
	pub expires_in_min: u32,
}
impl From<SessionGrant> for StartSessionResponse {
	fn from(grant: SessionGrant) -> Self {
		Self { code: grant.code, expires_in_min: grant.expires_in_min }
	}
}

/// `GET /token` success body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
	/// Bearer token redeemable for the profile payload.
	pub token: Credential,
}

/// Flat error body paired with [`Error::status`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	/// Human-readable message.
	pub error: String,
}
impl From<&Error> for ErrorBody {
	fn from(e: &Error) -> Self {
		Self { error: e.to_string() }
	}
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str> {
	let token = header
		.and_then(|value| value.split_once(' '))
		.filter(|(scheme, _)| scheme.eq_ignore_ascii_case(BEARER_SCHEME))
		.map(|(_, token)| token.trim())
		.filter(|token| !token.is_empty())
		.ok_or(Error::Unauthorized)?;

	Ok(token)
}

/// Body written for `GET /profile`: the stored payload verbatim, or an empty body when the token
/// is unknown.
pub fn profile_body(payload: Option<String>) -> String {
	payload.unwrap_or_default()
}
