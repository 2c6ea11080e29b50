//! Pan API client and types.

pub mod client;
pub mod error;
pub(crate) mod types;

pub use client::PanStore;
pub use error::ErrorCatalog;

use std::sync::OnceLock;

use regex::Regex;

/// The service renders 128-bit values (login tokens, CSRF tokens, slice
/// hashes) as 32 lowercase hex characters.
pub(crate) fn hex_128bit() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^[a-z0-9]{32}$").expect("valid regex"))
}
