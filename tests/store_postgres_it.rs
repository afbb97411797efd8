#![cfg(feature = "postgres")]

// std
use std::sync::Arc;
// self
use profile_broker::{
	auth::Credential,
	config::BrokerConfig,
	store::{PgStore, RedeemOutcome, SessionStore},
};

const CONTENDERS: usize = 16;

// Run with `DATABASE_URL=postgres://... cargo test --features postgres -- --ignored`.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires a Postgres database in DATABASE_URL"]
async fn concurrent_redemptions_race_through_one_conditional_update() -> color_eyre::Result<()> {
	let url = std::env::var("DATABASE_URL")?;
	let store = Arc::new(PgStore::connect(&url, &BrokerConfig::default()).await?);

	store.ensure_schema().await?;

	let code = Credential::generate(BrokerConfig::DEFAULT_CODE_LENGTH);
	let session = store.insert_pending(code.clone(), r#"{"profile":{}}"#.into()).await?;
	let code = Arc::new(code.expose().to_owned());
	let handles = (0..CONTENDERS)
		.map(|_| {
			let store = store.clone();
			let code = code.clone();

			tokio::spawn(async move {
				let token = Credential::generate(BrokerConfig::DEFAULT_TOKEN_LENGTH);
				let outcome = store.redeem_code(&code, token.clone()).await?;

				color_eyre::Result::<_>::Ok((outcome, token))
			})
		})
		.collect::<Vec<_>>();
	let mut winners = Vec::new();

	for handle in handles {
		let (outcome, token) = handle.await??;

		if outcome == RedeemOutcome::Redeemed {
			winners.push(token);
		}
	}

	assert_eq!(winners.len(), 1);

	let redeemed = store
		.fetch_by_token(winners[0].expose())
		.await?
		.expect("The winning token should resolve to the session.");

	assert_eq!(redeemed.id, session.id);
	assert!(redeemed.code().is_none());
	assert_eq!(store.redeem_code(&code, Credential::generate(255)).await?, RedeemOutcome::Missing);

	Ok(())
}
