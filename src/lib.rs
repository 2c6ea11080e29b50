//! # panlib
//!
//! Asynchronous client library for the Baidu pan cloud-storage service.
//!
//! ## Features
//!
//! - Password login with optional captcha callback
//! - Directory listing, file info and keyword search
//! - Delete, copy, move, rename and directory creation
//! - Streaming downloads with byte-range support
//! - Single-request and sliced uploads
//! - Storage quota
//! - TTL response cache with request coalescing and precise invalidation
//!
//! ## Example
//!
//! ```no_run
//! use panlib::PanClient;
//!
//! #[tokio::main]
//! async fn main() -> panlib::Result<()> {
//!     let client = PanClient::login("user", "password", None).await?;
//!     for file in client.list("/").await? {
//!         println!("{} ({} bytes)", file.name, file.size);
//!     }
//!     client.close().await
//! }
//! ```

pub mod api;
pub mod cache;
pub mod client;
pub mod error;
pub mod fs;
pub mod http;
pub mod session;
pub mod store;

pub use api::{ErrorCatalog, PanStore};
pub use cache::ResponseCache;
pub use client::{PanClient, PanOptions};
pub use error::{PanError, Result};
pub use fs::{FileInfo, Quota};
pub use session::{CaptchaSolver, Session};
pub use store::{ByteStream, RemoteStore};
