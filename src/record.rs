//! Persisted records: persons, relying-party clients, person/client links, and broker sessions.

pub mod client;
pub mod link;
pub mod person;
pub mod session;

pub use client::*;
pub use link::*;
pub use person::*;
pub use session::*;
