//! Relying-party client records and the update request accepted by the registry.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, ClientIdentifier, Credential},
};

/// Registered relying-party application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
	/// Row identifier.
	pub id: ClientId,
	/// Externally visible identifier, unique across clients.
	pub client_id: ClientIdentifier,
	/// Base URL of the application.
	pub client_url: Url,
	/// Callback URL, when declared.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub callback_url: Option<Url>,
	/// Client secret, present once a callback URL has been declared. Stored as plain text.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub secret: Option<Credential>,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}
impl Client {
	/// Projects the record onto the short form used by person link views.
	pub fn summary(&self) -> ClientSummary {
		ClientSummary {
			id: self.id,
			client_id: self.client_id.clone(),
			client_url: self.client_url.clone(),
		}
	}
}

/// Short client projection embedded in person link views.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
	/// Row identifier.
	pub id: ClientId,
	/// Externally visible identifier.
	pub client_id: ClientIdentifier,
	/// Base URL of the application.
	pub client_url: Url,
}

/// Full-record update submitted for an existing client.
///
/// Fields arrive as raw strings so the registry can reject malformed input with a
/// validation error before touching storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientUpdate {
	/// Row identifier; must match the addressed client.
	pub id: i64,
	/// Replacement external identifier.
	pub client_id: String,
	/// Replacement base URL.
	pub client_url: String,
	/// Replacement callback URL; a non-empty value rotates the secret.
	#[serde(default)]
	pub callback_url: Option<String>,
}

/// What happens to the stored secret during an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SecretChange {
	/// Leave the stored secret as it is.
	Keep,
	/// Overwrite the stored secret unconditionally.
	Rotate(Credential),
}

/// Validated client update handed to [`crate::store::ClientStore::update_client`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientChanges {
	/// Replacement external identifier.
	pub client_id: ClientIdentifier,
	/// Replacement base URL.
	pub client_url: Url,
	/// Replacement callback URL.
	pub callback_url: Option<Url>,
	/// Secret handling.
	pub secret: SecretChange,
}
impl ClientChanges {
	/// Applies the changes onto an in-memory record.
	pub fn apply_to(self, client: &mut Client) {
		client.client_id = self.client_id;
		client.client_url = self.client_url;
		client.callback_url = self.callback_url;

		if let SecretChange::Rotate(secret) = self.secret {
			client.secret = Some(secret);
		}
	}
}
