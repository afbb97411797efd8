//! Session broker that trades single-use codes for bearer tokens on behalf of relying-party
//! applications, with a client registry, person/app profile links, and race-safe session stores.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod broker;
pub mod config;
pub mod error;
pub mod links;
pub mod obs;
pub mod record;
pub mod registry;
#[cfg(feature = "reqwest")] pub mod relay;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{ClientIdentifier, PersonId},
		broker::SessionBroker,
		config::BrokerConfig,
		record::{Client, NewPerson},
		store::{ClientStore, MemoryStore, PersonStore},
	};

	/// Builds a [`SessionBroker`] over a fresh in-memory store with the default configuration.
	pub fn build_memory_broker() -> (SessionBroker, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::default());
		let broker = SessionBroker::from_memory(store.clone(), BrokerConfig::default())
			.expect("Default broker configuration should be valid.");

		(broker, store)
	}

	/// Inserts a valid person fixture and returns its identifier.
	pub async fn seed_person(store: &MemoryStore, national_id: &str) -> PersonId {
		let person = NewPerson {
			national_id: national_id.into(),
			given_name: "Juan".into(),
			family_name: "Pérez".into(),
			email: format!("{}@example.com", national_id.to_lowercase()),
			phone: Some("123456789".into()),
		};

		store
			.insert_person(person)
			.await
			.expect("Seeding a person fixture should succeed.")
			.id
	}

	/// Inserts a client fixture (without callback or secret) and returns the stored row.
	pub async fn seed_client(store: &MemoryStore, identifier: &str) -> Client {
		let identifier = ClientIdentifier::new(identifier)
			.expect("Client identifier fixture should be valid.");
		let url = Url::parse(&format!("https://{}.example.com/", identifier.to_lowercase()))
			.expect("Client URL fixture should parse.");

		store
			.insert_client(identifier, url)
			.await
			.expect("Seeding a client fixture should succeed.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map as JsonMap, Value as JsonValue};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
