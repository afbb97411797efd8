//! Optional observability helpers for broker operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `profile_broker.op` with the `op`
//!   (operation) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `profile_broker_operation_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the broker, registry, and link directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Issuing a single-use code.
	StartSession,
	/// Exchanging a code for a token.
	RedeemCode,
	/// Resolving a token into its payload.
	FetchProfile,
	/// Registering a client.
	ClientCreate,
	/// Replacing a client record.
	ClientUpdate,
	/// Removing a client.
	ClientDelete,
	/// Linking a person to a client.
	LinkCreate,
	/// Overwriting a link profile.
	LinkUpdate,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::StartSession => "start_session",
			Operation::RedeemCode => "redeem_code",
			Operation::FetchProfile => "fetch_profile",
			Operation::ClientCreate => "client_create",
			Operation::ClientUpdate => "client_update",
			Operation::ClientDelete => "client_delete",
			Operation::LinkCreate => "link_create",
			Operation::LinkUpdate => "link_update",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}

	/// Maps a result onto its success/failure label.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { Outcome::Success } else { Outcome::Failure }
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside an operation span and records attempt plus final outcome.
pub(crate) async fn observe<T, Fut>(op: Operation, stage: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = OperationSpan::new(op, stage);

	record_outcome(op, Outcome::Attempt);

	let result = span.instrument(fut).await;

	record_outcome(op, Outcome::of(&result));

	result
}
