//! Session establishment and teardown.

mod auth;

pub use auth::{CaptchaSolver, Session};
