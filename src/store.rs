//! Storage contracts and built-in store implementations for persons, clients, links, and
//! sessions.
//!
//! Each table gets its own trait so deployments can mix backends. The contracts mirror what a
//! relational store guarantees: unique keys surface as [`StoreError::Conflict`], dangling
//! references as [`StoreError::ForeignKey`], and [`SessionStore::redeem_code`] is a single
//! conditional update that at most one caller can win per code.

pub mod memory;
#[cfg(feature = "postgres")] pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")] pub use postgres::PgStore;

// self
use crate::{
	_prelude::*,
	auth::{ClientId, ClientIdentifier, Credential, PersonId},
	record::{
		Client, ClientChanges, LinkProfileUpdate, NewPerson, Person, PersonAppLink, Session,
		SessionShapeError,
	},
};

/// Boxed future returned by every store operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Person directory contract. Persons are created and fully replaced, never deleted.
pub trait PersonStore
where
	Self: Send + Sync,
{
	/// Fetches a person by row identifier.
	fn fetch_person(&self, id: PersonId) -> StoreFuture<'_, Option<Person>>;

	/// Inserts a new person and returns the stored row.
	fn insert_person(&self, person: NewPerson) -> StoreFuture<'_, Person>;

	/// Replaces every mutable field of an existing person; `None` when the row is missing.
	fn replace_person(&self, id: PersonId, person: NewPerson) -> StoreFuture<'_, Option<Person>>;

	/// Lists persons in insertion order.
	fn list_persons(&self) -> StoreFuture<'_, Vec<Person>>;
}

/// Client registry persistence contract.
pub trait ClientStore
where
	Self: Send + Sync,
{
	/// Lists clients in insertion order.
	fn list_clients(&self) -> StoreFuture<'_, Vec<Client>>;

	/// Fetches a client by row identifier.
	fn fetch_client(&self, id: ClientId) -> StoreFuture<'_, Option<Client>>;

	/// Fetches a client by its external identifier.
	fn fetch_client_by_identifier<'a>(
		&'a self,
		client_id: &'a ClientIdentifier,
	) -> StoreFuture<'a, Option<Client>>;

	/// Inserts a client without callback or secret; duplicate identifiers conflict.
	fn insert_client(&self, client_id: ClientIdentifier, client_url: Url)
	-> StoreFuture<'_, Client>;

	/// Applies validated changes; `None` when the row is missing.
	fn update_client(&self, id: ClientId, changes: ClientChanges)
	-> StoreFuture<'_, Option<Client>>;

	/// Deletes a client; returns `false` when the row is missing. Dependent links are not
	/// cascaded and surface as [`StoreError::ForeignKey`].
	fn delete_client(&self, id: ClientId) -> StoreFuture<'_, bool>;
}

/// Person/client link persistence contract.
pub trait LinkStore
where
	Self: Send + Sync,
{
	/// Fetches the link for a `(person, client)` pair, if present.
	fn fetch_link(&self, person: PersonId, client: ClientId)
	-> StoreFuture<'_, Option<PersonAppLink>>;

	/// Lists links of a client in insertion order.
	fn links_by_client(&self, client: ClientId) -> StoreFuture<'_, Vec<PersonAppLink>>;

	/// Lists links of a person in insertion order.
	fn links_by_person(&self, person: PersonId) -> StoreFuture<'_, Vec<PersonAppLink>>;

	/// Creates the link for a pair; a second link for the same pair conflicts.
	fn insert_link(
		&self,
		person: PersonId,
		client: ClientId,
		profile: Option<String>,
	) -> StoreFuture<'_, PersonAppLink>;

	/// Overwrites only the profile of the link addressed by `(person_id, client_id)`.
	fn update_link_profile(
		&self,
		update: LinkProfileUpdate,
	) -> StoreFuture<'_, Option<PersonAppLink>>;
}

/// Session persistence contract.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Persists a new pending session bound to `code`; a code already in use conflicts.
	fn insert_pending(&self, code: Credential, payload: String) -> StoreFuture<'_, Session>;

	/// Atomically sets `token` and clears the code of the pending session holding `code`.
	///
	/// Implementations must perform the check and the write as one conditional update so that
	/// of any number of concurrent calls for the same code exactly one reports
	/// [`RedeemOutcome::Redeemed`].
	fn redeem_code<'a>(&'a self, code: &'a str, token: Credential)
	-> StoreFuture<'a, RedeemOutcome>;

	/// Fetches the redeemed session bound to `token`, if present.
	fn fetch_by_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<Session>>;
}

/// Result of a conditional code → token swap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedeemOutcome {
	/// The code was pending and now maps to the new token.
	Redeemed,
	/// No pending session holds the code (never issued or already redeemed).
	Missing,
}

/// Error type produced by store implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// A unique constraint rejected the write.
	#[error("Unique constraint violated: {message}.")]
	Conflict {
		/// Human-readable error payload.
		message: String,
	},
	/// A foreign-key constraint rejected the write.
	#[error("Foreign key constraint violated: {message}.")]
	ForeignKey {
		/// Human-readable error payload.
		message: String,
	},
	/// Serialization failures (row decoding, JSON columns) surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// The backend did not answer within the configured bound.
	#[error("Storage timed out: {message}.")]
	Timeout {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
impl From<SessionShapeError> for StoreError {
	fn from(e: SessionShapeError) -> Self {
		Self::Serialization { message: e.to_string() }
	}
}
