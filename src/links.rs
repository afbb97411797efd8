//! Person directory and person/client links carrying the per-pair profile document.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, PersonId},
	obs::{self, Operation},
	record::{Client, ClientSummary, LinkProfileUpdate, NewPerson, Person, PersonAppLink},
	store::{ClientStore, LinkStore, MemoryStore, PersonStore},
};

/// Person link view: the person, their link rows, and short summaries of the linked clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonLinks {
	/// The person record.
	pub person: Person,
	/// Links of the person in insertion order.
	pub links: Vec<PersonAppLink>,
	/// Clients referenced by `links`, in the same order.
	pub clients: Vec<ClientSummary>,
}

/// Pair view: one person, one client, and the link between them when it exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPair {
	/// Link of the pair, if any.
	pub link: Option<PersonAppLink>,
	/// The person record.
	pub person: Person,
	/// The client record.
	pub client: Client,
}

/// Front door for persons and their per-client profiles.
#[derive(Clone)]
pub struct LinkDirectory {
	persons: Arc<dyn PersonStore>,
	clients: Arc<dyn ClientStore>,
	links: Arc<dyn LinkStore>,
}
impl LinkDirectory {
	/// Builds a directory over explicit stores.
	pub fn new(
		persons: Arc<dyn PersonStore>,
		clients: Arc<dyn ClientStore>,
		links: Arc<dyn LinkStore>,
	) -> Self {
		Self { persons, clients, links }
	}

	/// Builds a directory whose every table lives in `store`.
	pub fn from_memory(store: Arc<MemoryStore>) -> Self {
		Self::new(store.clone(), store.clone(), store)
	}

	/// Validates and stores a new person.
	pub async fn add_person(&self, person: NewPerson) -> Result<Person> {
		person.validate()?;

		Ok(self.persons.insert_person(person).await?)
	}

	/// Validates and fully replaces an existing person.
	pub async fn replace_person(&self, id: PersonId, person: NewPerson) -> Result<Person> {
		person.validate()?;

		self.persons.replace_person(id, person).await?.ok_or_else(|| Error::not_found("Person", id))
	}

	/// Lists every person in insertion order.
	pub async fn persons(&self) -> Result<Vec<Person>> {
		Ok(self.persons.list_persons().await?)
	}

	/// Fetches the link of a pair; absence is not an error.
	pub async fn get(&self, person: PersonId, client: ClientId) -> Result<Option<PersonAppLink>> {
		Ok(self.links.fetch_link(person, client).await?)
	}

	/// Fetches a person, a client, and their link. Both records must exist; the link may not.
	pub async fn pair(&self, person: PersonId, client: ClientId) -> Result<LinkPair> {
		let link = self.get(person, client).await?;
		let person =
			self.persons.fetch_person(person).await?.ok_or_else(|| Error::not_found("Person", person))?;
		let client =
			self.clients.fetch_client(client).await?.ok_or_else(|| Error::not_found("Client", client))?;

		Ok(LinkPair { link, person, client })
	}

	/// Resolves the profile object of a pair. An absent link yields `{}`; a profile that is not a
	/// JSON object is a payload error.
	pub async fn profile_for(
		&self,
		person: PersonId,
		client: ClientId,
	) -> Result<JsonMap<String, JsonValue>> {
		match self.get(person, client).await? {
			Some(link) => Ok(link.profile_map()?),
			None => Ok(JsonMap::new()),
		}
	}

	/// Links `person` to `client`. A second link for the same pair is a conflict.
	pub async fn link(
		&self,
		person: PersonId,
		client: ClientId,
		profile: Option<String>,
	) -> Result<PersonAppLink> {
		let profile = normalize_profile(profile)?;

		obs::observe(Operation::LinkCreate, "links.link", async move {
			if self.persons.fetch_person(person).await?.is_none() {
				return Err(Error::not_found("Person", person));
			}
			if self.clients.fetch_client(client).await?.is_none() {
				return Err(Error::not_found("Client", client));
			}

			Ok(self.links.insert_link(person, client, profile).await?)
		})
		.await
	}

	/// Overwrites only the profile of the link addressed by `(person_id, client_id)`.
	pub async fn update(&self, update: LinkProfileUpdate) -> Result<PersonAppLink> {
		let profile = normalize_profile(update.profile)?;
		let (person, client) = (update.person_id, update.client_id);

		obs::observe(Operation::LinkUpdate, "links.update", async move {
			self.links
				.update_link_profile(LinkProfileUpdate { person_id: person, client_id: client, profile })
				.await?
				.ok_or_else(|| Error::not_found("Link", format!("{person}/{client}")))
		})
		.await
	}

	/// Fetches a person together with their links and the linked clients.
	pub async fn for_person(&self, id: PersonId) -> Result<PersonLinks> {
		let person =
			self.persons.fetch_person(id).await?.ok_or_else(|| Error::not_found("Person", id))?;
		let links = self.links.links_by_person(id).await?;
		let mut clients = Vec::with_capacity(links.len());

		for link in &links {
			if let Some(client) = self.clients.fetch_client(link.client_id).await? {
				clients.push(client.summary());
			}
		}

		Ok(PersonLinks { person, links, clients })
	}
}
impl Debug for LinkDirectory {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LinkDirectory").finish_non_exhaustive()
	}
}

// Profiles written through the directory must be syntactically valid JSON; blank text means none.
fn normalize_profile(profile: Option<String>) -> Result<Option<String>> {
	match profile {
		Some(raw) if raw.trim().is_empty() => Ok(None),
		Some(raw) => match serde_json::from_str::<serde::de::IgnoredAny>(&raw) {
			Ok(_) => Ok(Some(raw)),
			Err(e) => Err(Error::validation(format!("profile is not valid JSON: {e}"))),
		},
		None => Ok(None),
	}
}
