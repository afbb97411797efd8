//! Thread-safe in-memory store implementing every storage contract for local development and
//! tests.
//!
//! All four tables live behind one lock, so each trait call behaves like a single SQL
//! statement: unique keys, foreign keys, and the conditional code → token swap are checked and
//! applied under the same write guard.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, ClientIdentifier, Credential, LinkId, PersonId, SessionId},
	record::{
		Client, ClientChanges, LinkProfileUpdate, NewPerson, Person, PersonAppLink, Session,
		SessionCredential,
	},
	store::{
		ClientStore, LinkStore, PersonStore, RedeemOutcome, SessionStore, StoreError, StoreFuture,
	},
};

type SharedTables = Arc<RwLock<Tables>>;

/// Thread-safe storage backend that keeps every table in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SharedTables);
impl MemoryStore {
	fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
		f(&self.0.read())
	}

	fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
		f(&mut self.0.write())
	}

	/// Number of stored sessions, pending or redeemed.
	pub fn session_count(&self) -> usize {
		self.read(|tables| tables.sessions.len())
	}

	/// Looks up the session currently holding `code`, if it is still pending.
	pub fn pending_session(&self, code: &str) -> Option<Session> {
		self.read(|tables| {
			tables.codes.get(code).and_then(|id| tables.sessions.get(id)).cloned()
		})
	}
}

#[derive(Debug, Default)]
struct Tables {
	persons: BTreeMap<PersonId, Person>,
	clients: BTreeMap<ClientId, Client>,
	links: BTreeMap<LinkId, PersonAppLink>,
	sessions: BTreeMap<SessionId, Session>,
	codes: HashMap<String, SessionId>,
	tokens: HashMap<String, SessionId>,
	sequences: Sequences,
}
impl Tables {
	fn insert_person(&mut self, fields: NewPerson) -> Result<Person, StoreError> {
		let id = next_id(&mut self.sequences.persons)?;
		let person = Person {
			id,
			national_id: fields.national_id,
			given_name: fields.given_name,
			family_name: fields.family_name,
			email: fields.email,
			phone: fields.phone,
			created_at: OffsetDateTime::now_utc(),
		};

		self.persons.insert(id, person.clone());

		Ok(person)
	}

	fn replace_person(&mut self, id: PersonId, fields: NewPerson) -> Option<Person> {
		let person = self.persons.get_mut(&id)?;

		person.national_id = fields.national_id;
		person.given_name = fields.given_name;
		person.family_name = fields.family_name;
		person.email = fields.email;
		person.phone = fields.phone;

		Some(person.clone())
	}

	fn identifier_taken(&self, client_id: &ClientIdentifier, except: Option<ClientId>) -> bool {
		self.clients.values().any(|client| &client.client_id == client_id && Some(client.id) != except)
	}

	fn insert_client(
		&mut self,
		client_id: ClientIdentifier,
		client_url: Url,
	) -> Result<Client, StoreError> {
		if self.identifier_taken(&client_id, None) {
			return Err(StoreError::Conflict {
				message: format!("client_id `{client_id}` is already registered"),
			});
		}

		let id = next_id(&mut self.sequences.clients)?;
		let client = Client {
			id,
			client_id,
			client_url,
			callback_url: None,
			secret: None,
			created_at: OffsetDateTime::now_utc(),
		};

		self.clients.insert(id, client.clone());

		Ok(client)
	}

	fn update_client(
		&mut self,
		id: ClientId,
		changes: ClientChanges,
	) -> Result<Option<Client>, StoreError> {
		if !self.clients.contains_key(&id) {
			return Ok(None);
		}
		if self.identifier_taken(&changes.client_id, Some(id)) {
			return Err(StoreError::Conflict {
				message: format!("client_id `{}` is already registered", changes.client_id),
			});
		}

		let Some(client) = self.clients.get_mut(&id) else {
			return Ok(None);
		};

		changes.apply_to(client);

		Ok(Some(client.clone()))
	}

	fn delete_client(&mut self, id: ClientId) -> Result<bool, StoreError> {
		if !self.clients.contains_key(&id) {
			return Ok(false);
		}
		if self.links.values().any(|link| link.client_id == id) {
			return Err(StoreError::ForeignKey {
				message: format!("person/client links still reference client {id}"),
			});
		}

		Ok(self.clients.remove(&id).is_some())
	}

	fn find_link(&self, person: PersonId, client: ClientId) -> Option<&PersonAppLink> {
		self.links.values().find(|link| link.person_id == person && link.client_id == client)
	}

	fn insert_link(
		&mut self,
		person: PersonId,
		client: ClientId,
		profile: Option<String>,
	) -> Result<PersonAppLink, StoreError> {
		if !self.persons.contains_key(&person) {
			return Err(StoreError::ForeignKey { message: format!("person {person} does not exist") });
		}
		if !self.clients.contains_key(&client) {
			return Err(StoreError::ForeignKey { message: format!("client {client} does not exist") });
		}
		if self.find_link(person, client).is_some() {
			return Err(StoreError::Conflict {
				message: format!("person {person} is already linked to client {client}"),
			});
		}

		ensure_json(profile.as_deref())?;

		let id = next_id(&mut self.sequences.links)?;
		let link = PersonAppLink {
			id,
			person_id: person,
			client_id: client,
			profile,
			created_at: OffsetDateTime::now_utc(),
		};

		self.links.insert(id, link.clone());

		Ok(link)
	}

	fn update_link_profile(
		&mut self,
		update: LinkProfileUpdate,
	) -> Result<Option<PersonAppLink>, StoreError> {
		ensure_json(update.profile.as_deref())?;

		let link = self
			.links
			.values_mut()
			.find(|link| link.person_id == update.person_id && link.client_id == update.client_id);

		Ok(link.map(|link| {
			link.profile = update.profile;

			link.clone()
		}))
	}

	fn insert_pending(&mut self, code: Credential, payload: String) -> Result<Session, StoreError> {
		if self.codes.contains_key(code.expose()) {
			return Err(StoreError::Conflict { message: "session code is already in use".into() });
		}

		ensure_json(Some(&payload))?;

		let id = next_id(&mut self.sequences.sessions)?;
		let session = Session {
			id,
			credential: SessionCredential::Code(code.clone()),
			payload,
			created_at: OffsetDateTime::now_utc(),
		};

		self.codes.insert(code.expose().to_owned(), id);
		self.sessions.insert(id, session.clone());

		Ok(session)
	}

	fn redeem_code(&mut self, code: &str, token: Credential) -> Result<RedeemOutcome, StoreError> {
		let Some(&id) = self.codes.get(code) else {
			return Ok(RedeemOutcome::Missing);
		};

		if self.tokens.contains_key(token.expose()) {
			return Err(StoreError::Conflict { message: "session token is already in use".into() });
		}

		let Some(session) = self.sessions.get_mut(&id) else {
			return Err(StoreError::Backend {
				message: format!("code index points at missing session {id}"),
			});
		};

		if !session.redeem(token.clone()) {
			return Ok(RedeemOutcome::Missing);
		}

		self.codes.remove(code);
		self.tokens.insert(token.expose().to_owned(), id);

		Ok(RedeemOutcome::Redeemed)
	}

	fn fetch_by_token(&self, token: &str) -> Option<Session> {
		self.tokens.get(token).and_then(|id| self.sessions.get(id)).cloned()
	}
}

// One counter per table, like `BIGSERIAL` columns.
#[derive(Debug, Default)]
struct Sequences {
	persons: i64,
	clients: i64,
	links: i64,
	sessions: i64,
}

fn next_id<I>(sequence: &mut i64) -> Result<I, StoreError>
where
	I: TryFrom<i64>,
	I::Error: Display,
{
	*sequence += 1;

	I::try_from(*sequence)
		.map_err(|e| StoreError::Backend { message: format!("sequence exhausted: {e}") })
}

fn ensure_json(raw: Option<&str>) -> Result<(), StoreError> {
	match raw {
		Some(raw) => serde_json::from_str::<serde::de::IgnoredAny>(raw)
			.map(|_| ())
			.map_err(|e| StoreError::Serialization { message: format!("invalid JSON document: {e}") }),
		None => Ok(()),
	}
}

impl PersonStore for MemoryStore {
	fn fetch_person(&self, id: PersonId) -> StoreFuture<'_, Option<Person>> {
		Box::pin(async move { Ok(self.read(|tables| tables.persons.get(&id).cloned())) })
	}

	fn insert_person(&self, person: NewPerson) -> StoreFuture<'_, Person> {
		Box::pin(async move { self.write(|tables| tables.insert_person(person)) })
	}

	fn replace_person(&self, id: PersonId, person: NewPerson) -> StoreFuture<'_, Option<Person>> {
		Box::pin(async move { Ok(self.write(|tables| tables.replace_person(id, person))) })
	}

	fn list_persons(&self) -> StoreFuture<'_, Vec<Person>> {
		Box::pin(async move { Ok(self.read(|tables| tables.persons.values().cloned().collect())) })
	}
}

impl ClientStore for MemoryStore {
	fn list_clients(&self) -> StoreFuture<'_, Vec<Client>> {
		Box::pin(async move { Ok(self.read(|tables| tables.clients.values().cloned().collect())) })
	}

	fn fetch_client(&self, id: ClientId) -> StoreFuture<'_, Option<Client>> {
		Box::pin(async move { Ok(self.read(|tables| tables.clients.get(&id).cloned())) })
	}

	fn fetch_client_by_identifier<'a>(
		&'a self,
		client_id: &'a ClientIdentifier,
	) -> StoreFuture<'a, Option<Client>> {
		Box::pin(async move {
			Ok(self.read(|tables| {
				tables.clients.values().find(|client| &client.client_id == client_id).cloned()
			}))
		})
	}

	fn insert_client(
		&self,
		client_id: ClientIdentifier,
		client_url: Url,
	) -> StoreFuture<'_, Client> {
		Box::pin(async move { self.write(|tables| tables.insert_client(client_id, client_url)) })
	}

	fn update_client(
		&self,
		id: ClientId,
		changes: ClientChanges,
	) -> StoreFuture<'_, Option<Client>> {
		Box::pin(async move { self.write(|tables| tables.update_client(id, changes)) })
	}

	fn delete_client(&self, id: ClientId) -> StoreFuture<'_, bool> {
		Box::pin(async move { self.write(|tables| tables.delete_client(id)) })
	}
}

impl LinkStore for MemoryStore {
	fn fetch_link(
		&self,
		person: PersonId,
		client: ClientId,
	) -> StoreFuture<'_, Option<PersonAppLink>> {
		Box::pin(async move { Ok(self.read(|tables| tables.find_link(person, client).cloned())) })
	}

	fn links_by_client(&self, client: ClientId) -> StoreFuture<'_, Vec<PersonAppLink>> {
		Box::pin(async move {
			Ok(self.read(|tables| {
				tables.links.values().filter(|link| link.client_id == client).cloned().collect()
			}))
		})
	}

	fn links_by_person(&self, person: PersonId) -> StoreFuture<'_, Vec<PersonAppLink>> {
		Box::pin(async move {
			Ok(self.read(|tables| {
				tables.links.values().filter(|link| link.person_id == person).cloned().collect()
			}))
		})
	}

	fn insert_link(
		&self,
		person: PersonId,
		client: ClientId,
		profile: Option<String>,
	) -> StoreFuture<'_, PersonAppLink> {
		Box::pin(async move { self.write(|tables| tables.insert_link(person, client, profile)) })
	}

	fn update_link_profile(
		&self,
		update: LinkProfileUpdate,
	) -> StoreFuture<'_, Option<PersonAppLink>> {
		Box::pin(async move { self.write(|tables| tables.update_link_profile(update)) })
	}
}

impl SessionStore for MemoryStore {
	fn insert_pending(&self, code: Credential, payload: String) -> StoreFuture<'_, Session> {
		Box::pin(async move { self.write(|tables| tables.insert_pending(code, payload)) })
	}

	fn redeem_code<'a>(
		&'a self,
		code: &'a str,
		token: Credential,
	) -> StoreFuture<'a, RedeemOutcome> {
		Box::pin(async move { self.write(|tables| tables.redeem_code(code, token)) })
	}

	fn fetch_by_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<Session>> {
		Box::pin(async move { Ok(self.read(|tables| tables.fetch_by_token(token))) })
	}
}
