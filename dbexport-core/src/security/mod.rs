//! Credential handling.
//!
//! Credentials are kept apart from every serializable configuration type
//! and are wiped from memory when dropped.

mod credentials;

pub use credentials::Credentials;
