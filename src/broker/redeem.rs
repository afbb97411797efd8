// self
use crate::{
	_prelude::*,
	auth::{Credential, CredentialKind},
	broker::SessionBroker,
	obs::{self, Operation},
	store::RedeemOutcome,
};

impl SessionBroker {
	/// Exchanges a pending code for a freshly minted bearer token.
	///
	/// The swap is one conditional store update, so of any number of concurrent calls with the
	/// same code exactly one returns a token and the rest get [`Error::NotFound`]. A code is
	/// never accepted twice.
	pub async fn redeem_code(&self, code: &str) -> Result<Credential> {
		if code.trim().is_empty() {
			return Err(Error::validation("code is required"));
		}

		let sessions = self.local_sessions("redeem_code")?;

		obs::observe(Operation::RedeemCode, "broker.redeem_code", async move {
			self.redeem_metrics.record_attempt();

			let (token, outcome) = self
				.mint(CredentialKind::Token, move |token| sessions.redeem_code(code, token))
				.await?;

			match outcome {
				RedeemOutcome::Redeemed => {
					self.redeem_metrics.record_redeemed();
					obs::trace_credential(CredentialKind::Token, &token.fingerprint());

					Ok(token)
				},
				RedeemOutcome::Missing => {
					self.redeem_metrics.record_rejected();

					Err(Error::not_found("Code", Credential::new(code).fingerprint()))
				},
			}
		})
		.await
	}
}
