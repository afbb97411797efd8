// self
use crate::{
	_prelude::*,
	broker::SessionBroker,
	obs::{self, Operation},
};

impl SessionBroker {
	/// Returns the payload stored for `token`, byte for byte.
	///
	/// Read-only and repeatable. An unknown token yields `Ok(None)` rather than an error; the
	/// HTTP layer renders that as an empty body (see [`crate::api::profile_body`]).
	pub async fn fetch_profile(&self, token: &str) -> Result<Option<String>> {
		let sessions = self.local_sessions("fetch_profile")?;

		if token.is_empty() {
			return Ok(None);
		}

		obs::observe(Operation::FetchProfile, "broker.fetch_profile", async move {
			Ok(sessions.fetch_by_token(token).await?.map(|session| session.payload))
		})
		.await
	}
}
