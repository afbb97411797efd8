//! Postgres-backed store built on `sqlx`.
//!
//! Every statement is parameterized. The code → token swap is a single conditional `UPDATE`, so
//! the database's row locking decides the one winner among concurrent redemptions.

// crates.io
use sqlx::{
	FromRow, PgPool,
	postgres::{PgConnectOptions, PgPoolOptions},
};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, ClientIdentifier, Credential, LinkId, PersonId, SessionId},
	config::{self, BrokerConfig},
	record::{
		Client, ClientChanges, LinkProfileUpdate, NewPerson, Person, PersonAppLink, SecretChange,
		Session,
	},
	store::{
		ClientStore, LinkStore, PersonStore, RedeemOutcome, SessionStore, StoreError, StoreFuture,
	},
};

const SCHEMA: [&str; 4] = [
	"CREATE TABLE IF NOT EXISTS persons (
		id BIGSERIAL PRIMARY KEY,
		national_id VARCHAR(32) NOT NULL,
		given_name VARCHAR(255) NOT NULL,
		family_name VARCHAR(255) NOT NULL,
		email VARCHAR(255) NOT NULL,
		phone VARCHAR(20),
		created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
		CONSTRAINT email_check CHECK (position('@' IN email) > 0),
		CONSTRAINT phone_check CHECK (phone ~ '^[0-9]+$')
	)",
	"CREATE TABLE IF NOT EXISTS clients (
		id BIGSERIAL PRIMARY KEY,
		client_id VARCHAR(32) NOT NULL UNIQUE,
		client_url VARCHAR(255) NOT NULL,
		callback_url VARCHAR(255),
		secret VARCHAR(255),
		created_at TIMESTAMPTZ NOT NULL DEFAULT now()
	)",
	"CREATE TABLE IF NOT EXISTS person_app_link (
		id BIGSERIAL PRIMARY KEY,
		person_id BIGINT NOT NULL REFERENCES persons (id),
		client_id BIGINT NOT NULL REFERENCES clients (id),
		profile JSONB,
		created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
		UNIQUE (person_id, client_id)
	)",
	"CREATE TABLE IF NOT EXISTS sessions (
		id BIGSERIAL PRIMARY KEY,
		code VARCHAR(255) UNIQUE,
		token VARCHAR(255) UNIQUE,
		payload JSON NOT NULL,
		created_at TIMESTAMPTZ NOT NULL DEFAULT now()
	)",
];
const PERSON_COLUMNS: &str =
	"id, national_id, given_name, family_name, email, phone, created_at";
const CLIENT_COLUMNS: &str = "id, client_id, client_url, callback_url, secret, created_at";
const LINK_COLUMNS: &str = "id, person_id, client_id, profile::text AS profile, created_at";
const SESSION_COLUMNS: &str = "id, code, token, payload::text AS payload, created_at";
// Postgres `query_canceled`, raised when `statement_timeout` fires.
const QUERY_CANCELED: &str = "57014";

/// Relational store over a Postgres connection pool.
#[derive(Clone, Debug)]
pub struct PgStore {
	pool: PgPool,
}
impl PgStore {
	/// Connects to `database_url`, bounding pool acquisition and every statement by
	/// [`BrokerConfig::store_timeout`].
	pub async fn connect(database_url: &str, config: &BrokerConfig) -> Result<Self, StoreError> {
		let timeout = config::to_std(config.store_timeout);
		let options = PgConnectOptions::from_str(database_url)
			.map_err(map_sqlx)?
			.options([("statement_timeout", timeout.as_millis())]);
		let pool =
			PgPoolOptions::new().acquire_timeout(timeout).connect_with(options).await.map_err(map_sqlx)?;

		Ok(Self { pool })
	}

	/// Wraps an existing pool; timeouts are whatever the pool was configured with.
	pub fn from_pool(pool: PgPool) -> Self {
		Self { pool }
	}

	/// Returns the underlying pool.
	pub fn pool(&self) -> &PgPool {
		&self.pool
	}

	/// Creates the persons, clients, link, and session tables when they do not exist yet.
	pub async fn ensure_schema(&self) -> Result<(), StoreError> {
		for statement in SCHEMA {
			sqlx::query(statement).execute(&self.pool).await.map_err(map_sqlx)?;
		}

		Ok(())
	}
}

impl PersonStore for PgStore {
	fn fetch_person(&self, id: PersonId) -> StoreFuture<'_, Option<Person>> {
		Box::pin(async move {
			let row = sqlx::query_as::<_, PersonRow>(&format!(
				"SELECT {PERSON_COLUMNS} FROM persons WHERE id = $1"
			))
			.bind(id.get())
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx)?;

			row.map(Person::try_from).transpose()
		})
	}

	fn insert_person(&self, person: NewPerson) -> StoreFuture<'_, Person> {
		Box::pin(async move {
			sqlx::query_as::<_, PersonRow>(&format!(
				"INSERT INTO persons (national_id, given_name, family_name, email, phone) \
				 VALUES ($1, $2, $3, $4, $5) RETURNING {PERSON_COLUMNS}"
			))
			.bind(person.national_id)
			.bind(person.given_name)
			.bind(person.family_name)
			.bind(person.email)
			.bind(person.phone)
			.fetch_one(&self.pool)
			.await
			.map_err(map_sqlx)?
			.try_into()
		})
	}

	fn replace_person(&self, id: PersonId, person: NewPerson) -> StoreFuture<'_, Option<Person>> {
		Box::pin(async move {
			let row = sqlx::query_as::<_, PersonRow>(&format!(
				"UPDATE persons SET national_id = $1, given_name = $2, family_name = $3, \
				 email = $4, phone = $5 WHERE id = $6 RETURNING {PERSON_COLUMNS}"
			))
			.bind(person.national_id)
			.bind(person.given_name)
			.bind(person.family_name)
			.bind(person.email)
			.bind(person.phone)
			.bind(id.get())
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx)?;

			row.map(Person::try_from).transpose()
		})
	}

	fn list_persons(&self) -> StoreFuture<'_, Vec<Person>> {
		Box::pin(async move {
			sqlx::query_as::<_, PersonRow>(&format!(
				"SELECT {PERSON_COLUMNS} FROM persons ORDER BY id"
			))
			.fetch_all(&self.pool)
			.await
			.map_err(map_sqlx)?
			.into_iter()
			.map(Person::try_from)
			.collect()
		})
	}
}

impl ClientStore for PgStore {
	fn list_clients(&self) -> StoreFuture<'_, Vec<Client>> {
		Box::pin(async move {
			sqlx::query_as::<_, ClientRow>(&format!("SELECT {CLIENT_COLUMNS} FROM clients ORDER BY id"))
				.fetch_all(&self.pool)
				.await
				.map_err(map_sqlx)?
				.into_iter()
				.map(Client::try_from)
				.collect()
		})
	}

	fn fetch_client(&self, id: ClientId) -> StoreFuture<'_, Option<Client>> {
		Box::pin(async move {
			let row = sqlx::query_as::<_, ClientRow>(&format!(
				"SELECT {CLIENT_COLUMNS} FROM clients WHERE id = $1"
			))
			.bind(id.get())
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx)?;

			row.map(Client::try_from).transpose()
		})
	}

	fn fetch_client_by_identifier<'a>(
		&'a self,
		client_id: &'a ClientIdentifier,
	) -> StoreFuture<'a, Option<Client>> {
		Box::pin(async move {
			let row = sqlx::query_as::<_, ClientRow>(&format!(
				"SELECT {CLIENT_COLUMNS} FROM clients WHERE client_id = $1"
			))
			.bind(&**client_id)
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx)?;

			row.map(Client::try_from).transpose()
		})
	}

	fn insert_client(
		&self,
		client_id: ClientIdentifier,
		client_url: Url,
	) -> StoreFuture<'_, Client> {
		Box::pin(async move {
			sqlx::query_as::<_, ClientRow>(&format!(
				"INSERT INTO clients (client_id, client_url) VALUES ($1, $2) RETURNING {CLIENT_COLUMNS}"
			))
			.bind(String::from(client_id))
			.bind(client_url.as_str())
			.fetch_one(&self.pool)
			.await
			.map_err(map_sqlx)?
			.try_into()
		})
	}

	fn update_client(
		&self,
		id: ClientId,
		changes: ClientChanges,
	) -> StoreFuture<'_, Option<Client>> {
		Box::pin(async move {
			let secret = match changes.secret {
				SecretChange::Keep => None,
				SecretChange::Rotate(secret) => Some(secret.expose().to_owned()),
			};
			let row = sqlx::query_as::<_, ClientRow>(&format!(
				"UPDATE clients SET client_id = $1, client_url = $2, callback_url = $3, \
				 secret = COALESCE($4, secret) WHERE id = $5 RETURNING {CLIENT_COLUMNS}"
			))
			.bind(String::from(changes.client_id))
			.bind(changes.client_url.as_str())
			.bind(changes.callback_url.as_ref().map(Url::as_str))
			.bind(secret)
			.bind(id.get())
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx)?;

			row.map(Client::try_from).transpose()
		})
	}

	fn delete_client(&self, id: ClientId) -> StoreFuture<'_, bool> {
		Box::pin(async move {
			let result = sqlx::query("DELETE FROM clients WHERE id = $1")
				.bind(id.get())
				.execute(&self.pool)
				.await
				.map_err(map_sqlx)?;

			Ok(result.rows_affected() > 0)
		})
	}
}

impl LinkStore for PgStore {
	fn fetch_link(
		&self,
		person: PersonId,
		client: ClientId,
	) -> StoreFuture<'_, Option<PersonAppLink>> {
		Box::pin(async move {
			let row = sqlx::query_as::<_, LinkRow>(&format!(
				"SELECT {LINK_COLUMNS} FROM person_app_link WHERE person_id = $1 AND client_id = $2"
			))
			.bind(person.get())
			.bind(client.get())
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx)?;

			row.map(PersonAppLink::try_from).transpose()
		})
	}

	fn links_by_client(&self, client: ClientId) -> StoreFuture<'_, Vec<PersonAppLink>> {
		Box::pin(async move {
			sqlx::query_as::<_, LinkRow>(&format!(
				"SELECT {LINK_COLUMNS} FROM person_app_link WHERE client_id = $1 ORDER BY id"
			))
			.bind(client.get())
			.fetch_all(&self.pool)
			.await
			.map_err(map_sqlx)?
			.into_iter()
			.map(PersonAppLink::try_from)
			.collect()
		})
	}

	fn links_by_person(&self, person: PersonId) -> StoreFuture<'_, Vec<PersonAppLink>> {
		Box::pin(async move {
			sqlx::query_as::<_, LinkRow>(&format!(
				"SELECT {LINK_COLUMNS} FROM person_app_link WHERE person_id = $1 ORDER BY id"
			))
			.bind(person.get())
			.fetch_all(&self.pool)
			.await
			.map_err(map_sqlx)?
			.into_iter()
			.map(PersonAppLink::try_from)
			.collect()
		})
	}

	fn insert_link(
		&self,
		person: PersonId,
		client: ClientId,
		profile: Option<String>,
	) -> StoreFuture<'_, PersonAppLink> {
		Box::pin(async move {
			sqlx::query_as::<_, LinkRow>(&format!(
				"INSERT INTO person_app_link (person_id, client_id, profile) \
				 VALUES ($1, $2, $3::jsonb) RETURNING {LINK_COLUMNS}"
			))
			.bind(person.get())
			.bind(client.get())
			.bind(profile)
			.fetch_one(&self.pool)
			.await
			.map_err(map_sqlx)?
			.try_into()
		})
	}

	fn update_link_profile(
		&self,
		update: LinkProfileUpdate,
	) -> StoreFuture<'_, Option<PersonAppLink>> {
		Box::pin(async move {
			let row = sqlx::query_as::<_, LinkRow>(&format!(
				"UPDATE person_app_link SET profile = $1::jsonb \
				 WHERE person_id = $2 AND client_id = $3 RETURNING {LINK_COLUMNS}"
			))
			.bind(update.profile)
			.bind(update.person_id.get())
			.bind(update.client_id.get())
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx)?;

			row.map(PersonAppLink::try_from).transpose()
		})
	}
}

impl SessionStore for PgStore {
	fn insert_pending(&self, code: Credential, payload: String) -> StoreFuture<'_, Session> {
		Box::pin(async move {
			sqlx::query_as::<_, SessionRow>(&format!(
				"INSERT INTO sessions (code, payload) VALUES ($1, $2::json) RETURNING {SESSION_COLUMNS}"
			))
			.bind(code.expose())
			.bind(payload)
			.fetch_one(&self.pool)
			.await
			.map_err(map_sqlx)?
			.try_into()
		})
	}

	fn redeem_code<'a>(
		&'a self,
		code: &'a str,
		token: Credential,
	) -> StoreFuture<'a, RedeemOutcome> {
		Box::pin(async move {
			let result = sqlx::query(
				"UPDATE sessions SET token = $1, code = NULL WHERE code = $2 AND token IS NULL",
			)
			.bind(token.expose())
			.bind(code)
			.execute(&self.pool)
			.await
			.map_err(map_sqlx)?;

			Ok(if result.rows_affected() == 1 {
				RedeemOutcome::Redeemed
			} else {
				RedeemOutcome::Missing
			})
		})
	}

	fn fetch_by_token<'a>(&'a self, token: &'a str) -> StoreFuture<'a, Option<Session>> {
		Box::pin(async move {
			let row = sqlx::query_as::<_, SessionRow>(&format!(
				"SELECT {SESSION_COLUMNS} FROM sessions WHERE token = $1"
			))
			.bind(token)
			.fetch_optional(&self.pool)
			.await
			.map_err(map_sqlx)?;

			row.map(Session::try_from).transpose()
		})
	}
}

#[derive(FromRow)]
struct PersonRow {
	id: i64,
	national_id: String,
	given_name: String,
	family_name: String,
	email: String,
	phone: Option<String>,
	created_at: OffsetDateTime,
}
impl TryFrom<PersonRow> for Person {
	type Error = StoreError;

	fn try_from(row: PersonRow) -> Result<Self, Self::Error> {
		Ok(Self {
			id: decode("persons.id", PersonId::new(row.id))?,
			national_id: row.national_id,
			given_name: row.given_name,
			family_name: row.family_name,
			email: row.email,
			phone: row.phone,
			created_at: row.created_at,
		})
	}
}

#[derive(FromRow)]
struct ClientRow {
	id: i64,
	client_id: String,
	client_url: String,
	callback_url: Option<String>,
	secret: Option<String>,
	created_at: OffsetDateTime,
}
impl TryFrom<ClientRow> for Client {
	type Error = StoreError;

	fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
		Ok(Self {
			id: decode("clients.id", ClientId::new(row.id))?,
			client_id: decode("clients.client_id", ClientIdentifier::new(&row.client_id))?,
			client_url: decode("clients.client_url", Url::parse(&row.client_url))?,
			callback_url: row
				.callback_url
				.filter(|raw| !raw.is_empty())
				.map(|raw| decode("clients.callback_url", Url::parse(&raw)))
				.transpose()?,
			secret: row.secret.map(Credential::new),
			created_at: row.created_at,
		})
	}
}

#[derive(FromRow)]
struct LinkRow {
	id: i64,
	person_id: i64,
	client_id: i64,
	profile: Option<String>,
	created_at: OffsetDateTime,
}
impl TryFrom<LinkRow> for PersonAppLink {
	type Error = StoreError;

	fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
		Ok(Self {
			id: decode("person_app_link.id", LinkId::new(row.id))?,
			person_id: decode("person_app_link.person_id", PersonId::new(row.person_id))?,
			client_id: decode("person_app_link.client_id", ClientId::new(row.client_id))?,
			profile: row.profile,
			created_at: row.created_at,
		})
	}
}

#[derive(FromRow)]
struct SessionRow {
	id: i64,
	code: Option<String>,
	token: Option<String>,
	payload: String,
	created_at: OffsetDateTime,
}
impl TryFrom<SessionRow> for Session {
	type Error = StoreError;

	fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
		let id = decode("sessions.id", SessionId::new(row.id))?;

		Ok(Session::from_columns(id, row.code, row.token, row.payload, row.created_at)?)
	}
}

fn decode<T, E>(column: &str, result: Result<T, E>) -> Result<T, StoreError>
where
	E: Display,
{
	result.map_err(|e| StoreError::Serialization { message: format!("{column}: {e}") })
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
	let message = e.to_string();

	match &e {
		sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict { message },
		sqlx::Error::Database(db) if db.is_foreign_key_violation() =>
			StoreError::ForeignKey { message },
		sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) =>
			StoreError::Timeout { message },
		sqlx::Error::PoolTimedOut => StoreError::Timeout { message },
		sqlx::Error::ColumnDecode { .. }
		| sqlx::Error::ColumnNotFound(_)
		| sqlx::Error::Decode(_)
		| sqlx::Error::TypeNotFound { .. } => StoreError::Serialization { message },
		_ => StoreError::Backend { message },
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn pool_and_decode_failures_are_classified() {
		assert!(matches!(map_sqlx(sqlx::Error::PoolTimedOut), StoreError::Timeout { .. }));
		assert!(matches!(
			map_sqlx(sqlx::Error::ColumnNotFound("payload".into())),
			StoreError::Serialization { .. }
		));
		assert!(matches!(map_sqlx(sqlx::Error::RowNotFound), StoreError::Backend { .. }));
	}

	#[test]
	fn rows_with_invalid_identifiers_fail_to_decode() {
		let row = ClientRow {
			id: 1,
			client_id: "has space".into(),
			client_url: "https://crm.example.com/".into(),
			callback_url: Some(String::new()),
			secret: None,
			created_at: OffsetDateTime::UNIX_EPOCH,
		};
		let err = Client::try_from(row).expect_err("Identifiers with whitespace must not decode.");

		assert!(matches!(err, StoreError::Serialization { ref message } if message.starts_with("clients.client_id")));
	}

	#[test]
	fn schema_declares_uniqueness_for_codes_and_tokens() {
		let sessions = SCHEMA[3];

		assert!(sessions.contains("code VARCHAR(255) UNIQUE"));
		assert!(sessions.contains("token VARCHAR(255) UNIQUE"));
		assert!(SCHEMA[2].contains("UNIQUE (person_id, client_id)"));
	}
}
