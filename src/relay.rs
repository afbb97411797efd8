//! Session start delegated to a remote authorization service over HTTP.
//!
//! The relay replaces the local session store: the remote service issues the code and owns the
//! exchange. Failures propagate as [`UpstreamError`] without retries.

// crates.io
use reqwest::redirect::Policy;
// self
use crate::{
	_prelude::*,
	auth::{ClientIdentifier, Credential, PersonId},
	config::{self, RelayConfig},
	error::{ConfigError, UpstreamError},
};

const MAX_ERROR_BODY: usize = 512;

/// Body posted to the authorization service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySessionRequest {
	/// External identifier of the requesting client.
	pub client_id: ClientIdentifier,
	/// Person the session is started for.
	pub user_id: PersonId,
	/// Advisory expiry hint.
	pub expires_in_min: u32,
	/// Parsed link profile.
	pub attributes: JsonMap<String, JsonValue>,
}

/// Subset of the service response the broker relies on.
#[derive(Clone, Debug, Deserialize)]
pub struct RelaySessionResponse {
	/// Code issued by the remote service.
	pub code: Credential,
	/// Echoed client identifier, when present.
	#[serde(default)]
	pub client_id: Option<String>,
	/// Echoed person identifier, when present.
	#[serde(default)]
	pub user_id: Option<i64>,
	/// Expiry reported by the service, kept opaque.
	#[serde(default)]
	pub expires_at: Option<JsonValue>,
}

/// HTTP client for the remote authorization service.
#[derive(Clone)]
pub struct RelayClient {
	http: ReqwestClient,
	config: RelayConfig,
}
impl RelayClient {
	/// Builds a relay client bounded by the configured timeout. Redirects are not followed.
	pub fn new(config: RelayConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		let http = ReqwestClient::builder()
			.timeout(config::to_std(config.timeout))
			.redirect(Policy::none())
			.build()
			.map_err(ConfigError::http_client_build)?;

		Ok(Self { http, config })
	}

	/// Returns the configuration the client was built with.
	pub fn config(&self) -> &RelayConfig {
		&self.config
	}

	/// Posts a session-start request and returns the remotely issued code.
	pub async fn post_session(
		&self,
		request: &RelaySessionRequest,
	) -> Result<RelaySessionResponse, UpstreamError> {
		let response = self
			.http
			.post(self.config.endpoint.clone())
			.bearer_auth(self.config.bearer.expose())
			.json(request)
			.send()
			.await?;
		let status = response.status();
		let body = response.bytes().await?;

		if !status.is_success() {
			let mut message = String::from_utf8_lossy(&body).into_owned();

			if message.len() > MAX_ERROR_BODY {
				let cut = (0..=MAX_ERROR_BODY).rev().find(|i| message.is_char_boundary(*i)).unwrap_or(0);

				message.truncate(cut);
			}

			return Err(UpstreamError::Status { status: status.as_u16(), message });
		}

		let mut de = serde_json::Deserializer::from_slice(&body);
		let session: RelaySessionResponse = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| UpstreamError::MalformedResponse { source, status: status.as_u16() })?;

		if session.code.expose().trim().is_empty() {
			return Err(UpstreamError::MissingCode { status: status.as_u16() });
		}

		Ok(session)
	}
}
impl Debug for RelayClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RelayClient").field("config", &self.config).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn request_uses_wire_field_names() {
		let request = RelaySessionRequest {
			client_id: ClientIdentifier::new("CRM").expect("Client identifier fixture should be valid."),
			user_id: PersonId::new(7).expect("Person id fixture should be valid."),
			expires_in_min: 60,
			attributes: JsonMap::new(),
		};

		assert_eq!(
			serde_json::to_value(&request).expect("Request should serialize."),
			serde_json::json!({
				"client_id": "CRM",
				"user_id": 7,
				"expires_in_min": 60,
				"attributes": {}
			})
		);
	}

	#[test]
	fn zero_timeout_is_rejected() {
		let config = RelayConfig::with_default_endpoint("shared")
			.expect("Relay configuration should build.")
			.with_timeout(Duration::ZERO);

		assert!(matches!(RelayClient::new(config), Err(ConfigError::NonPositiveTimeout { .. })));
	}
}
