#![deny(clippy::all)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! vftpd is an embeddable, async FTP(S) server engine.
//!
//! It owns the protocol and the path/permission model but not storage
//! policy or identity: callers supply an [`auth::Authenticator`] and mount
//! points carrying their own [`path::PathPermissionBits`], and the engine
//! drives the control channel, data channel, and directory listings on top
//! of the local filesystem underneath those mounts.
//!
//! It runs on top of the Tokio asynchronous run-time and uses async I/O
//! throughout, including a memory-mapped file path for large transfers.
//!
//! # Quick Start
//!
//! Add the vftpd and tokio crates to your project's dependencies in Cargo.toml
//!
//! ```toml
//! [dependencies]
//! vftpd = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//! Now you're ready to develop your server! Add the following to src/main.rs:
//!
//! ```no_run
//! use std::sync::Arc;
//! use vftpd::auth::AnonymousAuthenticator;
//! use vftpd::path::{PathKind, PathPermissionBits, VirtualPath};
//!
//! #[tokio::main]
//! pub async fn main() {
//!     let ftp_home = std::env::temp_dir();
//!     let bits = PathPermissionBits::CAN_READ | PathPermissionBits::CAN_LIST | PathPermissionBits::IS_RECURSIVE;
//!     let mount = VirtualPath::new("/".to_string(), ftp_home, bits, PathKind::Directory);
//!
//!     let server = vftpd::Server::with_authenticator(Arc::new(AnonymousAuthenticator))
//!         .greeting("Welcome to my FTP server")
//!         .mount(mount)
//!         .unwrap()
//!         .build();
//!
//!     server.listen("127.0.0.1:2121").await.unwrap();
//! }
//! ```
//! You can now run your server with cargo run and connect to localhost:2121 with your favourite FTP client e.g.:
//!
//! ```sh
//! lftp -p 2121 localhost
//! ```

pub mod auth;
pub mod config;
pub mod entity;
pub mod error;
pub mod fs;
pub mod listing;
#[cfg(feature = "prometheus")]
pub(crate) mod metrics;
pub mod path;
pub(crate) mod server;

pub use crate::error::ServerError;
pub use crate::server::dispatcher::{ClientCommand, FtpCodec};
pub use crate::server::{Server, ServerBuilder};
