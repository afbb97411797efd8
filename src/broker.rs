//! Session broker: code issuance, single-use code → token exchange, and token-gated payload
//! retrieval.

mod profile;
mod redeem;
mod start;

pub use start::*;

// self
use crate::{
	_prelude::*,
	auth::{Credential, CredentialKind},
	config::BrokerConfig,
	obs::RedeemMetrics,
	store::{ClientStore, LinkStore, MemoryStore, PersonStore, SessionStore, StoreError},
};
#[cfg(feature = "reqwest")] use crate::{error::ConfigError, relay::RelayClient};

/// Number of times a credential is regenerated after a unique-key collision before giving up.
pub const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Where sessions live. A broker uses exactly one model.
#[derive(Clone)]
pub enum SessionBackend {
	/// Sessions are persisted and exchanged locally.
	Local(Arc<dyn SessionStore>),
	/// Session start is forwarded to a remote authorization service that owns the exchange.
	#[cfg(feature = "reqwest")]
	Relay(Arc<RelayClient>),
}
impl Debug for SessionBackend {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			SessionBackend::Local(_) => f.write_str("Local(..)"),
			#[cfg(feature = "reqwest")]
			SessionBackend::Relay(relay) => f.debug_tuple("Relay").field(relay).finish(),
		}
	}
}

/// Orchestrates session start, code redemption, and profile retrieval.
///
/// The broker holds no per-request state of its own; every guarantee about single use comes
/// from [`SessionStore::redeem_code`]. Clone it freely across tasks.
#[derive(Clone)]
pub struct SessionBroker {
	/// Person lookups during session start.
	pub persons: Arc<dyn PersonStore>,
	/// Client lookups during session start.
	pub clients: Arc<dyn ClientStore>,
	/// Profile lookups during session start.
	pub links: Arc<dyn LinkStore>,
	/// Session model in use.
	pub backend: SessionBackend,
	/// Credential lengths and advisory expiry.
	pub config: BrokerConfig,
	/// Shared counters for code redemption outcomes.
	pub redeem_metrics: Arc<RedeemMetrics>,
}
impl SessionBroker {
	/// Creates a broker backed by a local session store.
	pub fn new(
		persons: Arc<dyn PersonStore>,
		clients: Arc<dyn ClientStore>,
		links: Arc<dyn LinkStore>,
		sessions: Arc<dyn SessionStore>,
		config: BrokerConfig,
	) -> Result<Self> {
		Self::with_backend(persons, clients, links, SessionBackend::Local(sessions), config)
	}

	/// Creates a broker whose every table lives in `store`.
	pub fn from_memory(store: Arc<MemoryStore>, config: BrokerConfig) -> Result<Self> {
		Self::new(store.clone(), store.clone(), store.clone(), store, config)
	}

	/// Creates a broker that forwards session start to a remote authorization service.
	#[cfg(feature = "reqwest")]
	pub fn with_relay(
		persons: Arc<dyn PersonStore>,
		clients: Arc<dyn ClientStore>,
		links: Arc<dyn LinkStore>,
		relay: RelayClient,
		config: BrokerConfig,
	) -> Result<Self> {
		Self::with_backend(persons, clients, links, SessionBackend::Relay(Arc::new(relay)), config)
	}

	fn with_backend(
		persons: Arc<dyn PersonStore>,
		clients: Arc<dyn ClientStore>,
		links: Arc<dyn LinkStore>,
		backend: SessionBackend,
		config: BrokerConfig,
	) -> Result<Self> {
		config.validate()?;

		Ok(Self { persons, clients, links, backend, config, redeem_metrics: Default::default() })
	}

	fn local_sessions(&self, operation: &'static str) -> Result<&dyn SessionStore> {
		#[cfg(not(feature = "reqwest"))]
		let _ = operation;

		match &self.backend {
			SessionBackend::Local(sessions) => Ok(sessions.as_ref()),
			#[cfg(feature = "reqwest")]
			SessionBackend::Relay(_) => Err(ConfigError::SessionsDelegated { operation }.into()),
		}
	}

	/// Generates a credential of `kind` and hands it to `write`, regenerating on unique-key
	/// collisions up to [`MAX_CREDENTIAL_ATTEMPTS`] times.
	async fn mint<T, F, Fut>(&self, kind: CredentialKind, mut write: F) -> Result<(Credential, T)>
	where
		F: FnMut(Credential) -> Fut,
		Fut: Future<Output = Result<T, StoreError>>,
	{
		let len = self.config.length_of(kind);
		let mut attempt = 1;

		loop {
			let credential = Credential::generate(len);

			match write(credential.clone()).await {
				Ok(value) => return Ok((credential, value)),
				Err(StoreError::Conflict { .. }) if attempt < MAX_CREDENTIAL_ATTEMPTS => attempt += 1,
				Err(e) => return Err(e.into()),
			}
		}
	}
}
impl Debug for SessionBroker {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionBroker")
			.field("backend", &self.backend)
			.field("config", &self.config)
			.field("redeem_metrics", &self.redeem_metrics)
			.finish()
	}
}
