//! Strongly typed identifiers enforced across the broker domain.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_row_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "i64", into = "i64")]
		pub struct $name(i64);
		impl $name {
			/// Creates a new row identifier; ids start at 1.
			pub fn new(value: i64) -> Result<Self, IdentifierError> {
				if value <= 0 {
					return Err(IdentifierError::NonPositive { kind: $kind });
				}

				Ok(Self(value))
			}

			/// Returns the raw database value.
			pub const fn get(self) -> i64 {
				self.0
			}
		}
		impl From<$name> for i64 {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<i64> for $name {
			type Error = IdentifierError;

			fn try_from(value: i64) -> Result<Self, Self::Error> {
				Self::new(value)
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				Display::fmt(&self.0, f)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				let value = s
					.trim()
					.parse::<i64>()
					.map_err(|_| IdentifierError::NotNumeric { kind: $kind })?;

				Self::new(value)
			}
		}
	};
}

/// Maximum length of an externally visible client identifier (`VARCHAR(32)`).
pub const CLIENT_IDENTIFIER_MAX_LEN: usize = 32;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty")]
	Empty {
		/// Kind of identifier.
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace")]
	ContainsWhitespace {
		/// Kind of identifier.
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters")]
	TooLong {
		/// Kind of identifier.
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
	/// A row identifier was zero or negative.
	#[error("{kind} id must be a positive integer")]
	NonPositive {
		/// Kind of identifier.
		kind: &'static str,
	},
	/// A row identifier could not be parsed from text.
	#[error("{kind} id is not a number")]
	NotNumeric {
		/// Kind of identifier.
		kind: &'static str,
	},
}

def_row_id! { PersonId, "Row identifier of a person record.", "Person" }
def_row_id! { ClientId, "Row identifier of a relying-party client record.", "Client" }
def_row_id! { LinkId, "Row identifier of a person/client link record.", "Link" }
def_row_id! { SessionId, "Row identifier of a broker session record.", "Session" }

/// Externally visible identifier of a relying-party application (unique across clients).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientIdentifier(String);
impl ClientIdentifier {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for ClientIdentifier {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for ClientIdentifier {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<ClientIdentifier> for String {
	fn from(value: ClientIdentifier) -> Self {
		value.0
	}
}
impl TryFrom<String> for ClientIdentifier {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Borrow<str> for ClientIdentifier {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl Debug for ClientIdentifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ClientIdentifier({})", self.0)
	}
}
impl Display for ClientIdentifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for ClientIdentifier {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(view: &str) -> Result<(), IdentifierError> {
	const KIND: &str = "Client";

	if view.is_empty() {
		return Err(IdentifierError::Empty { kind: KIND });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind: KIND });
	}
	if view.chars().count() > CLIENT_IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind: KIND, max: CLIENT_IDENTIFIER_MAX_LEN });
	}

	Ok(())
}
