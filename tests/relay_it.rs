#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use profile_broker::{
	auth::PersonId,
	broker::SessionBroker,
	config::{BrokerConfig, RelayConfig},
	error::{ConfigError, Error, UpstreamError},
	links::LinkDirectory,
	record::NewPerson,
	registry::ClientRegistry,
	relay::RelayClient,
	store::MemoryStore,
};

const SHARED_SECRET: &str = "super-secret-token";

struct Relay {
	broker: SessionBroker,
	person: PersonId,
	client: profile_broker::auth::ClientId,
}

async fn relay_broker(server: &MockServer) -> color_eyre::Result<Relay> {
	let store = Arc::new(MemoryStore::default());
	let links = LinkDirectory::from_memory(store.clone());
	let registry = ClientRegistry::from_memory(store.clone(), BrokerConfig::default())?;
	let person = links
		.add_person(NewPerson {
			national_id: "12345678A".into(),
			given_name: "Juan".into(),
			family_name: "Pérez".into(),
			email: "jperez@mydomain.com".into(),
			phone: None,
		})
		.await?;
	let client = registry.create("CRM", "https://crm.mydomain.com/").await?;

	links.link(person.id, client.id, Some(r#"{"role":"admin"}"#.into())).await?;

	let relay = RelayClient::new(RelayConfig::new(&server.url("/sessions"), SHARED_SECRET)?)?;
	let broker = SessionBroker::with_relay(
		store.clone(),
		store.clone(),
		store,
		relay,
		BrokerConfig::default(),
	)?;

	Ok(Relay { broker, person: person.id, client: client.id })
}

#[tokio::test]
async fn relay_forwards_session_start() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let relay = relay_broker(&server).await?;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/sessions")
				.header("authorization", format!("Bearer {SHARED_SECRET}"))
				.json_body(json!({
					"client_id": "CRM",
					"user_id": 1,
					"expires_in_min": 60,
					"attributes": { "role": "admin" }
				}));
			then.status(200).header("content-type", "application/json").json_body(json!({
				"client_id": "CRM",
				"code": "remote-code",
				"user_id": 1,
				"expires_at": "2025-11-10T13:00:00Z",
				"attributes": { "role": "admin" }
			}));
		})
		.await;
	let grant = relay.broker.start_session(relay.person, relay.client).await?;

	mock.assert_async().await;

	assert_eq!(grant.code.expose(), "remote-code");
	assert_eq!(grant.expires_in_min, 60);

	Ok(())
}

#[tokio::test]
async fn relay_surfaces_non_success_status() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let relay = relay_broker(&server).await?;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/sessions");
			then.status(403).body("forbidden");
		})
		.await;
	let err = relay
		.broker
		.start_session(relay.person, relay.client)
		.await
		.expect_err("A 403 from the authorization service must fail the call.");

	mock.assert_async().await;

	assert!(matches!(
		err,
		Error::Upstream(UpstreamError::Status { status: 403, ref message }) if message == "forbidden"
	));
	assert_eq!(err.status(), 500);

	Ok(())
}

#[tokio::test]
async fn relay_rejects_malformed_responses() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let relay = relay_broker(&server).await?;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/sessions");
			then.status(200).header("content-type", "application/json").body("{\"code\":42}");
		})
		.await;
	let err = relay
		.broker
		.start_session(relay.person, relay.client)
		.await
		.expect_err("A malformed response must fail the call.");

	mock.assert_async().await;

	match err {
		Error::Upstream(UpstreamError::MalformedResponse { source, status }) => {
			assert_eq!(status, 200);
			assert_eq!(source.path().to_string(), "code");
		},
		other => panic!("Unexpected error: {other:?}"),
	}

	Ok(())
}

#[tokio::test]
async fn relay_rejects_empty_codes() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let relay = relay_broker(&server).await?;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/sessions");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"client_id": "CRM",
				"code": ""
			}));
		})
		.await;
	let err = relay
		.broker
		.start_session(relay.person, relay.client)
		.await
		.expect_err("An empty code from the authorization service must fail the call.");

	mock.assert_async().await;

	assert!(matches!(err, Error::Upstream(UpstreamError::MissingCode { status: 200 })));
	assert_eq!(err.status(), 500);

	Ok(())
}

#[tokio::test]
async fn relay_mode_delegates_exchange() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let relay = relay_broker(&server).await?;

	assert!(matches!(
		relay.broker.redeem_code("remote-code").await,
		Err(Error::Config(ConfigError::SessionsDelegated { operation: "redeem_code" }))
	));
	assert!(matches!(
		relay.broker.fetch_profile("token").await,
		Err(Error::Config(ConfigError::SessionsDelegated { operation: "fetch_profile" }))
	));

	Ok(())
}
