//! Redacted credential wrapper plus the generator for codes, tokens, and client secrets.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

const FINGERPRINT_LEN: usize = 12;

/// Credential classes minted by the broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CredentialKind {
	/// Single-use authorization code.
	Code,
	/// Client secret issued when a callback URL is declared.
	Secret,
	/// Bearer token redeemable for a profile payload.
	Token,
}
impl CredentialKind {
	/// Returns a stable label suitable for span fields and error messages.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialKind::Code => "code",
			CredentialKind::Secret => "secret",
			CredentialKind::Token => "token",
		}
	}
}
impl Display for CredentialKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Redacted credential wrapper keeping codes, tokens, and secrets out of logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);
impl Credential {
	/// Wraps an existing credential string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Draws a fresh `[A-Za-z0-9]` credential of `len` characters from the thread-local CSPRNG.
	pub fn generate(len: usize) -> Self {
		Self(rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Short, log-safe digest that identifies the credential without revealing it.
	pub fn fingerprint(&self) -> String {
		let digest = Sha256::digest(self.0.as_bytes());
		let mut encoded = URL_SAFE_NO_PAD.encode(digest);

		encoded.truncate(FINGERPRINT_LEN);

		encoded
	}

	/// Returns `true` when the wrapped value is empty.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl AsRef<str> for Credential {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Credential").field(&"<redacted>").finish()
	}
}
impl Display for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::collections::HashSet;
	// self
	use super::*;

	#[test]
	fn credential_formatters_redact() {
		let secret = Credential::new("super-secret");

		assert_eq!(format!("{secret:?}"), "Credential(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert_eq!(secret.expose(), "super-secret");
	}

	#[test]
	fn generated_credentials_use_alphanumeric_charset() {
		for len in [1, 32, 64, 255] {
			let credential = Credential::generate(len);

			assert_eq!(credential.expose().len(), len);
			assert!(credential.expose().chars().all(|c| c.is_ascii_alphanumeric()));
		}
	}

	#[test]
	fn generated_credentials_do_not_repeat() {
		let issued: HashSet<_> =
			(0..512).map(|_| Credential::generate(32).expose().to_owned()).collect();

		assert_eq!(issued.len(), 512);
	}

	#[test]
	fn fingerprint_is_stable_and_short() {
		let a = Credential::new("code-a");

		assert_eq!(a.fingerprint(), Credential::new("code-a").fingerprint());
		assert_ne!(a.fingerprint(), Credential::new("code-b").fingerprint());
		assert_eq!(a.fingerprint().len(), FINGERPRINT_LEN);
		assert!(!a.fingerprint().contains("code-a"));
	}

	#[test]
	fn serializes_as_plain_string() {
		let payload = serde_json::to_string(&Credential::new("abc"))
			.expect("Credential should serialize to JSON.");

		assert_eq!(payload, "\"abc\"");
	}
}
