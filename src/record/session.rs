//! Broker session records and their code → token lifecycle.

// self
use crate::{
	_prelude::*,
	auth::{ClientIdentifier, Credential, PersonId, SessionId},
	error::PayloadError,
};

/// Lifecycle status for a session record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
	/// Code issued, not yet exchanged.
	Pending,
	/// Code exchanged for a token; terminal.
	Redeemed,
}

/// Credential currently bound to a session; exactly one of code or token exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionCredential {
	/// Single-use code awaiting redemption.
	Code(Credential),
	/// Bearer token minted on redemption.
	Token(Credential),
}

/// Errors produced when a stored row cannot represent a valid session.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SessionShapeError {
	/// Both code and token were set.
	#[error("Session {0} has both a code and a token.")]
	BothCredentials(i64),
	/// Neither code nor token was set.
	#[error("Session {0} has neither a code nor a token.")]
	NoCredential(i64),
}

/// Ephemeral broker record binding a code or a token to a composed payload.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
	/// Row identifier.
	pub id: SessionId,
	/// Code or token bound to the session.
	pub credential: SessionCredential,
	/// Serialized payload returned verbatim on profile retrieval.
	pub payload: String,
	/// Creation instant.
	pub created_at: OffsetDateTime,
}
impl Session {
	/// Rebuilds a session from nullable `code`/`token` columns.
	pub fn from_columns(
		id: SessionId,
		code: Option<String>,
		token: Option<String>,
		payload: String,
		created_at: OffsetDateTime,
	) -> Result<Self, SessionShapeError> {
		let credential = match (code, token) {
			(Some(code), None) => SessionCredential::Code(Credential::new(code)),
			(None, Some(token)) => SessionCredential::Token(Credential::new(token)),
			(Some(_), Some(_)) => return Err(SessionShapeError::BothCredentials(id.get())),
			(None, None) => return Err(SessionShapeError::NoCredential(id.get())),
		};

		Ok(Self { id, credential, payload, created_at })
	}

	/// Computes the lifecycle status.
	pub fn status(&self) -> SessionStatus {
		match self.credential {
			SessionCredential::Code(_) => SessionStatus::Pending,
			SessionCredential::Token(_) => SessionStatus::Redeemed,
		}
	}

	/// Returns the code while the session is pending.
	pub fn code(&self) -> Option<&Credential> {
		match &self.credential {
			SessionCredential::Code(code) => Some(code),
			SessionCredential::Token(_) => None,
		}
	}

	/// Returns the token once the session is redeemed.
	pub fn token(&self) -> Option<&Credential> {
		match &self.credential {
			SessionCredential::Code(_) => None,
			SessionCredential::Token(token) => Some(token),
		}
	}

	/// Swaps the pending code for `token`; returns `false` if already redeemed.
	pub fn redeem(&mut self, token: Credential) -> bool {
		if matches!(self.credential, SessionCredential::Token(_)) {
			return false;
		}

		self.credential = SessionCredential::Token(token);

		true
	}
}
impl Debug for Session {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("status", &self.status())
			.field("payload_len", &self.payload.len())
			.field("created_at", &self.created_at)
			.finish()
	}
}

/// Payload composed at session start and handed back to the relying party.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
	/// External identifier of the requesting client.
	pub client_id: ClientIdentifier,
	/// Person the session was started for.
	pub person_id: PersonId,
	/// Parsed link profile (`{}` when no link exists).
	pub profile: JsonMap<String, JsonValue>,
}
impl SessionPayload {
	/// Serializes the payload into the text stored alongside the session.
	pub fn to_json(&self) -> Result<String, PayloadError> {
		serde_json::to_string(self).map_err(PayloadError::Serialize)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn id() -> SessionId {
		SessionId::new(9).expect("Session id fixture should be valid.")
	}

	#[test]
	fn columns_must_hold_exactly_one_credential() {
		let at = macros::datetime!(2025-01-01 00:00 UTC);

		assert_eq!(
			Session::from_columns(id(), Some("c".into()), Some("t".into()), "{}".into(), at),
			Err(SessionShapeError::BothCredentials(9))
		);
		assert_eq!(
			Session::from_columns(id(), None, None, "{}".into(), at),
			Err(SessionShapeError::NoCredential(9))
		);

		let pending = Session::from_columns(id(), Some("c".into()), None, "{}".into(), at)
			.expect("Code-only row should be a pending session.");

		assert_eq!(pending.status(), SessionStatus::Pending);
		assert_eq!(pending.code().map(Credential::expose), Some("c"));
		assert!(pending.token().is_none());
	}

	#[test]
	fn redeem_is_terminal() {
		let at = macros::datetime!(2025-01-01 00:00 UTC);
		let mut session = Session::from_columns(id(), Some("c".into()), None, "{}".into(), at)
			.expect("Code-only row should be a pending session.");

		assert!(session.redeem(Credential::new("t1")));
		assert_eq!(session.status(), SessionStatus::Redeemed);
		assert!(session.code().is_none());
		assert!(!session.redeem(Credential::new("t2")));
		assert_eq!(session.token().map(Credential::expose), Some("t1"));
	}

	#[test]
	fn payload_serializes_with_profile_object() {
		let payload = SessionPayload {
			client_id: ClientIdentifier::new("CRM").expect("Client identifier fixture should be valid."),
			person_id: PersonId::new(1).expect("Person id fixture should be valid."),
			profile: JsonMap::new(),
		};

		assert_eq!(
			payload.to_json().expect("Payload should serialize."),
			r#"{"client_id":"CRM","person_id":1,"profile":{}}"#
		);
	}
}
