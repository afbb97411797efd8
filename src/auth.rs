//! Identifiers and credentials shared by the registry, link directory, and session broker.

pub mod credential;
pub mod id;

pub use credential::*;
pub use id::*;
