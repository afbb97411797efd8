// std
use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};
// crates.io
use url::Url;
// self
use profile_broker::{
	auth::{ClientId, ClientIdentifier},
	config::BrokerConfig,
	error::Error,
	links::LinkDirectory,
	record::{ClientChanges, ClientUpdate, LinkProfileUpdate, NewPerson},
	registry::ClientRegistry,
	store::{ClientStore, MemoryStore, StoreFuture},
};

// Counts every storage call made through the client table.
struct CountingClients {
	inner: MemoryStore,
	calls: AtomicUsize,
}
impl CountingClients {
	fn hit(&self) {
		self.calls.fetch_add(1, Ordering::SeqCst);
	}
}
impl ClientStore for CountingClients {
	fn list_clients(&self) -> StoreFuture<'_, Vec<profile_broker::record::Client>> {
		self.hit();
		self.inner.list_clients()
	}

	fn fetch_client(&self, id: ClientId) -> StoreFuture<'_, Option<profile_broker::record::Client>> {
		self.hit();
		self.inner.fetch_client(id)
	}

	fn fetch_client_by_identifier<'a>(
		&'a self,
		client_id: &'a ClientIdentifier,
	) -> StoreFuture<'a, Option<profile_broker::record::Client>> {
		self.hit();
		self.inner.fetch_client_by_identifier(client_id)
	}

	fn insert_client(
		&self,
		client_id: ClientIdentifier,
		client_url: Url,
	) -> StoreFuture<'_, profile_broker::record::Client> {
		self.hit();
		self.inner.insert_client(client_id, client_url)
	}

	fn update_client(
		&self,
		id: ClientId,
		changes: ClientChanges,
	) -> StoreFuture<'_, Option<profile_broker::record::Client>> {
		self.hit();
		self.inner.update_client(id, changes)
	}

	fn delete_client(&self, id: ClientId) -> StoreFuture<'_, bool> {
		self.hit();
		self.inner.delete_client(id)
	}
}

fn registry() -> (ClientRegistry, LinkDirectory) {
	let store = Arc::new(MemoryStore::default());

	(
		ClientRegistry::from_memory(store.clone(), BrokerConfig::default())
			.expect("Default configuration should build a registry."),
		LinkDirectory::from_memory(store),
	)
}

fn person(national_id: &str, email: &str) -> NewPerson {
	NewPerson {
		national_id: national_id.into(),
		given_name: "María".into(),
		family_name: "López".into(),
		email: email.into(),
		phone: None,
	}
}

fn update(id: ClientId, callback: Option<&str>) -> ClientUpdate {
	ClientUpdate {
		id: id.get(),
		client_id: "CRM".into(),
		client_url: "https://crm.mydomain.com/".into(),
		callback_url: callback.map(Into::into),
	}
}

#[tokio::test]
async fn create_validates_before_touching_storage() {
	let store = Arc::new(MemoryStore::default());
	let clients = Arc::new(CountingClients { inner: (*store).clone(), calls: AtomicUsize::new(0) });
	let registry =
		ClientRegistry::new(clients.clone(), store.clone(), store, BrokerConfig::default())
			.expect("Default configuration should build a registry.");
	let err = registry
		.create("", "https://x")
		.await
		.expect_err("An empty client identifier must be rejected.");

	assert!(matches!(err, Error::Validation { .. }));
	assert_eq!(err.status(), 400);
	assert_eq!(clients.calls.load(Ordering::SeqCst), 0);

	registry.create("X", "https://x").await.expect("A valid client should be created.");

	assert_eq!(clients.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn duplicate_identifiers_conflict() {
	let (registry, _) = registry();

	registry.create("CRM", "https://crm.mydomain.com/").await.expect("First create should work.");

	let err = registry
		.create("CRM", "https://other.mydomain.com/")
		.await
		.expect_err("Second create with the same identifier must fail.");

	assert!(matches!(err, Error::Conflict { .. }));
	assert_eq!(err.status(), 409);
}

#[tokio::test]
async fn every_callback_declaration_rotates_the_secret() {
	let (registry, _) = registry();
	let client = registry
		.create("CRM", "https://crm.mydomain.com/")
		.await
		.expect("Create should succeed.");

	assert!(client.secret.is_none());
	assert!(client.callback_url.is_none());

	let mut previous = None;

	for _ in 0..3 {
		let updated = registry
			.update(client.id, update(client.id, Some("https://crm.mydomain.com/authback")))
			.await
			.expect("Update with a callback should succeed.");
		let secret = updated.secret.expect("Declaring a callback must yield a secret.");

		assert_eq!(secret.expose().len(), BrokerConfig::DEFAULT_SECRET_LENGTH);
		assert!(secret.expose().chars().all(|c| c.is_ascii_alphanumeric()));
		assert_ne!(Some(secret.clone()), previous);

		previous = Some(secret);
	}

	let stored = registry.get(client.id).await.expect("Client should still exist.");

	assert_eq!(stored.secret, previous);
	assert_eq!(
		stored.callback_url.as_ref().map(Url::as_str),
		Some("https://crm.mydomain.com/authback")
	);
}

#[tokio::test]
async fn update_of_missing_client_is_not_found() {
	let (registry, _) = registry();
	let ghost = ClientId::new(12).expect("Client id fixture should be valid.");
	let err = registry
		.update(ghost, update(ghost, None))
		.await
		.expect_err("Updating a missing client must fail.");

	assert_eq!(err.status(), 404);
}

#[tokio::test]
async fn delete_with_dependent_links_is_a_storage_error() {
	let (registry, links) = registry();
	let person = links
		.add_person(person("87654321B", "mlo@mydomain.com"))
		.await
		.expect("Person should be added.");
	let linked = registry.create("APP1", "https://app1.mydomain.com/").await.expect("Create APP1.");
	let free = registry.create("APP2", "https://app2.mydomain.com/").await.expect("Create APP2.");

	links.link(person.id, linked.id, None).await.expect("Linking should succeed.");

	let err = registry.delete(linked.id).await.expect_err("Linked clients cannot be deleted.");

	assert!(matches!(err, Error::Storage(_)));
	assert_eq!(err.status(), 500);

	registry.delete(free.id).await.expect("Unlinked clients can be deleted.");

	assert!(matches!(registry.get(free.id).await, Err(Error::NotFound { .. })));
	assert_eq!(registry.list().await.expect("Listing should succeed.").len(), 1);
}

#[tokio::test]
async fn detail_and_person_views_follow_links() {
	let (registry, links) = registry();
	let juan = links
		.add_person(person("12345678A", "jperez@mydomain.com"))
		.await
		.expect("Person should be added.");
	let pedro = links
		.add_person(person("11111111C", "pg@mydomain.com"))
		.await
		.expect("Person should be added.");
	let crm = registry.create("CRM", "https://crm.mydomain.com/").await.expect("Create CRM.");
	let app = registry.create("APP1", "https://app1.mydomain.com/").await.expect("Create APP1.");

	links.link(juan.id, crm.id, Some(r#"{"role":"admin"}"#.into())).await.expect("Link 1.");
	links.link(juan.id, app.id, Some(r#"{"role":"user"}"#.into())).await.expect("Link 2.");
	links.link(pedro.id, crm.id, Some(r#"{"role":"user"}"#.into())).await.expect("Link 3.");

	let detail = registry.detail(crm.id).await.expect("Detail view should load.");

	assert_eq!(detail.client.id, crm.id);
	assert_eq!(detail.links.len(), 2);
	assert_eq!(detail.persons.iter().map(|p| p.id).collect::<Vec<_>>(), vec![juan.id, pedro.id]);

	let view = links.for_person(juan.id).await.expect("Person view should load.");

	assert_eq!(view.links.len(), 2);
	assert_eq!(
		view.clients.iter().map(|c| c.client_id.as_ref()).collect::<Vec<&str>>(),
		vec!["CRM", "APP1"]
	);
}

#[tokio::test]
async fn links_are_unique_per_pair_and_updated_by_pair() {
	let (registry, links) = registry();
	let person = links
		.add_person(person("12345678A", "jperez@mydomain.com"))
		.await
		.expect("Person should be added.");
	let crm = registry.create("CRM", "https://crm.mydomain.com/").await.expect("Create CRM.");
	let created = links
		.link(person.id, crm.id, Some(r#"{"role":"user"}"#.into()))
		.await
		.expect("First link should succeed.");
	let err = links
		.link(person.id, crm.id, None)
		.await
		.expect_err("A second link for the same pair must conflict.");

	assert!(matches!(err, Error::Conflict { .. }));

	let updated = links
		.update(LinkProfileUpdate {
			person_id: person.id,
			client_id: crm.id,
			profile: Some(r#"{"role":"admin"}"#.into()),
		})
		.await
		.expect("Profile update should succeed.");

	assert_eq!(updated.id, created.id);
	assert_eq!(updated.created_at, created.created_at);
	assert_eq!(
		links.profile_for(person.id, crm.id).await.expect("Profile should parse.")["role"],
		"admin"
	);

	let other = registry.create("APP2", "https://app2.mydomain.com/").await.expect("Create APP2.");
	let err = links
		.update(LinkProfileUpdate { person_id: person.id, client_id: other.id, profile: None })
		.await
		.expect_err("Updating a missing link must fail.");

	assert_eq!(err.status(), 404);
	assert!(
		links.profile_for(person.id, other.id).await.expect("Absent links are empty.").is_empty()
	);
}

#[tokio::test]
async fn person_fields_are_validated() {
	let (_, links) = registry();
	let err = links
		.add_person(person("12345678A", "no-at-sign"))
		.await
		.expect_err("Emails without `@` must be rejected.");

	assert_eq!(err.status(), 400);

	let stored = links
		.add_person(person("12345678A", "jperez@mydomain.com"))
		.await
		.expect("Valid persons should be stored.");
	let mut fields = stored.fields();

	fields.phone = Some("555123".into());

	let replaced =
		links.replace_person(stored.id, fields).await.expect("Full replacement should succeed.");

	assert_eq!(replaced.phone.as_deref(), Some("555123"));
	assert_eq!(links.persons().await.expect("Listing should succeed.").len(), 1);
}

#[tokio::test]
async fn entry_view_requires_a_declared_callback() {
	let (registry, links) = registry();
	let juan = links
		.add_person(person("12345678A", "jperez@mydomain.com"))
		.await
		.expect("Person should be added.");
	let crm = registry.create("CRM", "https://crm.mydomain.com/").await.expect("Create CRM.");
	let err = registry.entry("CRM").await.expect_err("Clients without a callback have no entry view.");

	assert!(matches!(err, Error::CallbackNotDeclared { ref client_id } if client_id == "CRM"));
	assert_eq!(err.status(), 500);

	registry
		.update(crm.id, update(crm.id, Some("https://crm.mydomain.com/authback")))
		.await
		.expect("Declaring a callback should succeed.");
	links.link(juan.id, crm.id, Some(r#"{"role":"admin"}"#.into())).await.expect("Link CRM.");

	let entry = registry.entry("CRM").await.expect("Entry view should load.");

	assert_eq!(entry.client.id, crm.id);
	assert_eq!(entry.persons.iter().map(|p| p.id).collect::<Vec<_>>(), vec![juan.id]);
	assert_eq!(entry.links.len(), 1);
	assert_eq!(entry.links[0].person_id, juan.id);
}

#[tokio::test]
async fn entry_view_resolves_by_external_identifier_only() {
	let (registry, links) = registry();
	let crm = registry.create("CRM", "https://crm.mydomain.com/").await.expect("Create CRM.");

	registry
		.update(crm.id, update(crm.id, Some("https://crm.mydomain.com/authback")))
		.await
		.expect("Declaring a callback should succeed.");

	let err = registry.entry("ERP").await.expect_err("Unknown identifiers must fail.");

	assert!(matches!(err, Error::NotFound { entity: "Client", .. }));
	assert_eq!(registry.entry("").await.expect_err("Blank identifiers must fail.").status(), 400);

	let err = registry.entry("CRM").await.expect_err("An empty person directory must fail.");

	assert!(matches!(err, Error::NotFound { entity: "Person", .. }));

	links
		.add_person(person("87654321B", "mlo@mydomain.com"))
		.await
		.expect("Person should be added.");

	let entry = registry.entry("CRM").await.expect("Entry view should load.");

	assert!(entry.links.is_empty());
	assert_eq!(entry.persons.len(), 1);
}

#[tokio::test]
async fn pair_view_joins_person_client_and_link() {
	let (registry, links) = registry();
	let juan = links
		.add_person(person("12345678A", "jperez@mydomain.com"))
		.await
		.expect("Person should be added.");
	let crm = registry.create("CRM", "https://crm.mydomain.com/").await.expect("Create CRM.");
	let unlinked = links.pair(juan.id, crm.id).await.expect("Pair view should load.");

	assert_eq!(unlinked.link, None);
	assert_eq!(unlinked.person.id, juan.id);
	assert_eq!(unlinked.client.id, crm.id);

	let link = links
		.link(juan.id, crm.id, Some(r#"{"role":"user"}"#.into()))
		.await
		.expect("Linking should succeed.");
	let linked = links.pair(juan.id, crm.id).await.expect("Pair view should load.");

	assert_eq!(linked.link, Some(link));

	let ghost = ClientId::new(77).expect("Client id fixture should be valid.");
	let err = links.pair(juan.id, ghost).await.expect_err("Unknown clients must fail.");

	assert!(matches!(err, Error::NotFound { entity: "Client", .. }));
}
