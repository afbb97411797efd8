//! Person identity records.

// self
use crate::{_prelude::*, auth::PersonId};

/// Identity record for a person that relying parties may request sessions for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
	/// Row identifier.
	pub id: PersonId,
	/// Legal identifier (national id document number).
	pub national_id: String,
	/// Given name.
	pub given_name: String,
	/// Family name(s).
	pub family_name: String,
	/// Contact email; always contains `@`.
	pub email: String,
	/// Optional contact phone, digits only.
	pub phone: Option<String>,
	/// Creation instant.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}
impl Person {
	/// Returns the mutable fields so a caller can submit a full replacement.
	pub fn fields(&self) -> NewPerson {
		NewPerson {
			national_id: self.national_id.clone(),
			given_name: self.given_name.clone(),
			family_name: self.family_name.clone(),
			email: self.email.clone(),
			phone: self.phone.clone(),
		}
	}
}

/// Field set used to create a person or fully replace an existing one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPerson {
	/// Legal identifier (national id document number).
	pub national_id: String,
	/// Given name.
	pub given_name: String,
	/// Family name(s).
	pub family_name: String,
	/// Contact email.
	pub email: String,
	/// Optional contact phone.
	#[serde(default)]
	pub phone: Option<String>,
}
impl NewPerson {
	/// Maximum length of the national id column.
	pub const NATIONAL_ID_MAX_LEN: usize = 32;
	/// Maximum length of the phone column.
	pub const PHONE_MAX_LEN: usize = 20;

	/// Applies the column constraints of the persons table.
	pub fn validate(&self) -> Result<()> {
		let required = [
			("national_id", &self.national_id),
			("given_name", &self.given_name),
			("family_name", &self.family_name),
			("email", &self.email),
		];

		if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
			return Err(Error::validation(format!("{field} is required")));
		}
		if self.national_id.chars().count() > Self::NATIONAL_ID_MAX_LEN {
			return Err(Error::validation(format!(
				"national_id exceeds {} characters",
				Self::NATIONAL_ID_MAX_LEN
			)));
		}
		if !self.email.contains('@') {
			return Err(Error::validation("email must contain `@`"));
		}
		if let Some(phone) = self.phone.as_deref().filter(|phone| !phone.is_empty()) {
			if !phone.chars().all(|c| c.is_ascii_digit()) {
				return Err(Error::validation("phone must contain digits only"));
			}
			if phone.len() > Self::PHONE_MAX_LEN {
				return Err(Error::validation(format!(
					"phone exceeds {} digits",
					Self::PHONE_MAX_LEN
				)));
			}
		}

		Ok(())
	}
}
