//! Session start: payload composition and code issuance.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, Credential, CredentialKind, PersonId},
	broker::{SessionBackend, SessionBroker},
	obs::{self, Operation},
	record::SessionPayload,
	store::SessionStore,
};

/// Code handed back from a successful session start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionGrant {
	/// Single-use authorization code.
	pub code: Credential,
	/// Advisory expiry hint in minutes; never enforced.
	pub expires_in_min: u32,
}

impl SessionBroker {
	/// Starts a session for `person` on behalf of `client` and returns a fresh code.
	///
	/// Person and client must exist. An absent link contributes an empty profile `{}`, while a
	/// profile that is not a JSON object fails the call. Repeated calls for the same pair create
	/// independent sessions.
	pub async fn start_session(&self, person: PersonId, client: ClientId) -> Result<SessionGrant> {
		obs::observe(Operation::StartSession, "broker.start_session", async move {
			let payload = self.compose(person, client).await?;

			match &self.backend {
				SessionBackend::Local(sessions) => self.issue_local(sessions.as_ref(), &payload).await,
				#[cfg(feature = "reqwest")]
				SessionBackend::Relay(relay) => {
					let request = crate::relay::RelaySessionRequest {
						client_id: payload.client_id,
						user_id: payload.person_id,
						expires_in_min: self.config.expires_in_min,
						attributes: payload.profile,
					};
					let response = relay.post_session(&request).await?;

					Ok(SessionGrant { code: response.code, expires_in_min: self.config.expires_in_min })
				},
			}
		})
		.await
	}

	async fn compose(&self, person: PersonId, client: ClientId) -> Result<SessionPayload> {
		if self.persons.fetch_person(person).await?.is_none() {
			return Err(Error::not_found("Person", person));
		}

		let client =
			self.clients.fetch_client(client).await?.ok_or_else(|| Error::not_found("Client", client))?;
		let profile = match self.links.fetch_link(person, client.id).await? {
			Some(link) => link.profile_map()?,
			None => JsonMap::new(),
		};

		Ok(SessionPayload { client_id: client.client_id, person_id: person, profile })
	}

	async fn issue_local(
		&self,
		sessions: &dyn SessionStore,
		payload: &SessionPayload,
	) -> Result<SessionGrant> {
		let payload = payload.to_json()?;
		let (code, _) = self
			.mint(CredentialKind::Code, move |code| sessions.insert_pending(code, payload.clone()))
			.await?;

		obs::trace_credential(CredentialKind::Code, &code.fingerprint());

		Ok(SessionGrant { code, expires_in_min: self.config.expires_in_min })
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use crate::{_preludet::*, store::LinkStore};

	#[test]
	fn repeated_starts_create_independent_pending_sessions() {
		let rt = Runtime::new().expect("Failed to build Tokio runtime for session start test.");
		let (broker, store) = build_memory_broker();
		let person = rt.block_on(seed_person(&store, "12345678A"));
		let client = rt.block_on(seed_client(&store, "CRM"));

		rt.block_on(store.insert_link(person, client.id, Some(r#"{"role":"user"}"#.into())))
			.expect("Linking the fixtures should succeed.");

		let first = rt
			.block_on(broker.start_session(person, client.id))
			.expect("First session start should succeed.");
		let second = rt
			.block_on(broker.start_session(person, client.id))
			.expect("Second session start should succeed.");

		assert_ne!(first.code, second.code);
		assert_eq!(store.session_count(), 2);

		let pending = store
			.pending_session(first.code.expose())
			.expect("Issued code should map to a pending session.");

		assert_eq!(
			pending.payload,
			r#"{"client_id":"CRM","person_id":1,"profile":{"role":"user"}}"#
		);
	}
}
