//! Person/client association rows carrying the opaque profile document.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, LinkId, PersonId},
	error::PayloadError,
};

/// Association between a person and a client; unique per `(person_id, client_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonAppLink {
	/// Row identifier.
	pub id: LinkId,
	/// Linked person.
	pub person_id: PersonId,
	/// Linked client.
	pub client_id: ClientId,
	/// Raw JSON profile text, if any.
	pub profile: Option<String>,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}
impl PersonAppLink {
	/// Parses the profile into a JSON object; a missing or `null` profile yields `{}`.
	pub fn profile_map(&self) -> Result<JsonMap<String, JsonValue>, PayloadError> {
		parse_profile(self.person_id, self.client_id, self.profile.as_deref())
	}
}

/// Profile overwrite addressed by the `(person_id, client_id)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkProfileUpdate {
	/// Linked person.
	pub person_id: PersonId,
	/// Linked client.
	pub client_id: ClientId,
	/// Replacement raw JSON profile, or `None` to clear it.
	pub profile: Option<String>,
}

/// Parses a stored profile document into a JSON object.
///
/// `None` and the JSON literal `null` both mean "no attributes". Anything else that is not
/// a JSON object is rejected.
pub fn parse_profile(
	person: PersonId,
	client: ClientId,
	raw: Option<&str>,
) -> Result<JsonMap<String, JsonValue>, PayloadError> {
	let Some(raw) = raw else {
		return Ok(JsonMap::new());
	};
	let parsed = serde_json::from_str::<Option<JsonMap<String, JsonValue>>>(raw).map_err(
		|source| PayloadError::MalformedProfile { person: person.get(), client: client.get(), source },
	)?;

	Ok(parsed.unwrap_or_default())
}
