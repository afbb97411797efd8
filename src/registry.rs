//! Client registry: relying-party records plus secret issuance on callback declaration.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, ClientIdentifier, Credential, CredentialKind},
	config::BrokerConfig,
	obs::{self, Operation},
	record::{Client, ClientChanges, ClientUpdate, Person, PersonAppLink, SecretChange},
	store::{ClientStore, LinkStore, MemoryStore, PersonStore},
};

/// Client detail view: the record, its link rows, and the linked persons.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDetail {
	/// The client record.
	pub client: Client,
	/// Links to the client in insertion order.
	pub links: Vec<PersonAppLink>,
	/// Persons referenced by `links`, in the same order.
	pub persons: Vec<Person>,
}

/// Entry view for a relying party about to start a session: the client, every person who can
/// be picked, and the client's existing links.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientEntry {
	/// The client record; always carries a callback URL.
	pub client: Client,
	/// Every registered person in insertion order.
	pub persons: Vec<Person>,
	/// Links to the client in insertion order.
	pub links: Vec<PersonAppLink>,
}

/// Owns relying-party application records.
#[derive(Clone)]
pub struct ClientRegistry {
	clients: Arc<dyn ClientStore>,
	links: Arc<dyn LinkStore>,
	persons: Arc<dyn PersonStore>,
	config: BrokerConfig,
}
impl ClientRegistry {
	/// Builds a registry over explicit stores after validating `config`.
	pub fn new(
		clients: Arc<dyn ClientStore>,
		links: Arc<dyn LinkStore>,
		persons: Arc<dyn PersonStore>,
		config: BrokerConfig,
	) -> Result<Self> {
		config.validate()?;

		Ok(Self { clients, links, persons, config })
	}

	/// Builds a registry whose every table lives in `store`.
	pub fn from_memory(store: Arc<MemoryStore>, config: BrokerConfig) -> Result<Self> {
		Self::new(store.clone(), store.clone(), store, config)
	}

	/// Lists every client in insertion order.
	pub async fn list(&self) -> Result<Vec<Client>> {
		Ok(self.clients.list_clients().await?)
	}

	/// Fetches one client.
	pub async fn get(&self, id: ClientId) -> Result<Client> {
		self.clients.fetch_client(id).await?.ok_or_else(|| Error::not_found("Client", id))
	}

	/// Fetches a client together with its links and linked persons.
	pub async fn detail(&self, id: ClientId) -> Result<ClientDetail> {
		let client = self.get(id).await?;
		let links = self.links.links_by_client(id).await?;
		let mut persons = Vec::with_capacity(links.len());

		for link in &links {
			if let Some(person) = self.persons.fetch_person(link.person_id).await? {
				persons.push(person);
			}
		}

		Ok(ClientDetail { client, links, persons })
	}

	/// Resolves the entry view of the client known externally as `client_id`.
	///
	/// Fails with [`Error::CallbackNotDeclared`] when the client has no callback URL and with
	/// [`Error::NotFound`] when no person is registered yet.
	pub async fn entry(&self, client_id: &str) -> Result<ClientEntry> {
		let identifier = ClientIdentifier::new(client_id)?;
		let client = self
			.clients
			.fetch_client_by_identifier(&identifier)
			.await?
			.ok_or_else(|| Error::not_found("Client", &identifier))?;

		if client.callback_url.is_none() {
			return Err(Error::CallbackNotDeclared { client_id: identifier.into() });
		}

		let persons = self.persons.list_persons().await?;

		if persons.is_empty() {
			return Err(Error::not_found("Person", "any"));
		}

		let links = self.links.links_by_client(client.id).await?;

		Ok(ClientEntry { client, persons, links })
	}

	/// Registers a client with no callback and no secret.
	///
	/// Input is validated before any storage call; a taken identifier surfaces as
	/// [`Error::Conflict`].
	pub async fn create(&self, client_id: &str, client_url: &str) -> Result<Client> {
		let client_id = ClientIdentifier::new(client_id)?;
		let client_url = parse_url("client_url", client_url)?;

		obs::observe(Operation::ClientCreate, "registry.create", async move {
			Ok(self.clients.insert_client(client_id, client_url).await?)
		})
		.await
	}

	/// Replaces the client addressed by `id` with `update`.
	///
	/// A non-empty callback URL mints a new secret that overwrites any previous one, on every
	/// call. An empty or absent callback clears the callback and keeps the stored secret.
	pub async fn update(&self, id: ClientId, update: ClientUpdate) -> Result<Client> {
		if update.id != id.get() {
			return Err(Error::validation(format!(
				"record id {} does not match client {id}",
				update.id
			)));
		}

		let changes = self.changes_from(update)?;

		obs::observe(Operation::ClientUpdate, "registry.update", async move {
			self.clients
				.update_client(id, changes)
				.await?
				.ok_or_else(|| Error::not_found("Client", id))
		})
		.await
	}

	/// Removes a client. Links still referencing it surface as a storage error.
	pub async fn delete(&self, id: ClientId) -> Result<()> {
		obs::observe(Operation::ClientDelete, "registry.delete", async move {
			if self.clients.delete_client(id).await? {
				Ok(())
			} else {
				Err(Error::not_found("Client", id))
			}
		})
		.await
	}

	fn changes_from(&self, update: ClientUpdate) -> Result<ClientChanges> {
		let client_id = ClientIdentifier::new(&update.client_id)?;
		let client_url = parse_url("client_url", &update.client_url)?;
		let callback = update.callback_url.as_deref().map(str::trim).filter(|raw| !raw.is_empty());
		let (callback_url, secret) = match callback {
			Some(raw) => {
				let callback_url = parse_url("callback_url", raw)?;
				let secret = Credential::generate(self.config.length_of(CredentialKind::Secret));

				obs::trace_credential(CredentialKind::Secret, &secret.fingerprint());

				(Some(callback_url), SecretChange::Rotate(secret))
			},
			None => (None, SecretChange::Keep),
		};

		Ok(ClientChanges { client_id, client_url, callback_url, secret })
	}
}
impl Debug for ClientRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientRegistry").field("config", &self.config).finish_non_exhaustive()
	}
}

fn parse_url(field: &str, raw: &str) -> Result<Url> {
	if raw.trim().is_empty() {
		return Err(Error::validation(format!("{field} must not be empty")));
	}

	Url::parse(raw.trim()).map_err(|e| Error::validation(format!("{field} is not a valid URL: {e}")))
}
