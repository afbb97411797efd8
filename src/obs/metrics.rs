// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::obs::{Operation, Outcome};

/// Records an operation outcome via the global metrics recorder (when enabled).
pub fn record_outcome(op: Operation, outcome: Outcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"profile_broker_operation_total",
			"op" => op.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (op, outcome);
	}
}

/// Thread-safe counters for code redemption.
#[derive(Debug, Default)]
pub struct RedeemMetrics {
	attempts: AtomicU64,
	redeemed: AtomicU64,
	rejected: AtomicU64,
}
impl RedeemMetrics {
	/// Returns the total number of redemption attempts.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of codes exchanged for a token.
	pub fn redeemed(&self) -> u64 {
		self.redeemed.load(Ordering::Relaxed)
	}

	/// Returns the number of attempts that found no pending code.
	pub fn rejected(&self) -> u64 {
		self.rejected.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_redeemed(&self) {
		self.redeemed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_rejected(&self) {
		self.rejected.fetch_add(1, Ordering::Relaxed);
	}
}
