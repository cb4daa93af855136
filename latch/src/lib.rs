//! # Latch
//!
//! Latch is a client-side login gate. It validates credentials locally,
//! submits them to a remote authority, stores the returned session token,
//! and locks itself for a while after too many consecutive rejections.
//!
//! The lock survives restarts: it is persisted to the durable store and
//! restored when the gate is built.
//!
//! ## Example
//!
//! ```rust,no_run
//! use latch::{Credentials, LatchBuilder};
//! use latch_core::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = LatchBuilder::new()
//!         .with_store(Arc::new(MemoryStore::new()))
//!         .with_http_authority("http://127.0.0.1:3000/api/auth/login")
//!         .build()
//!         .await?;
//!
//!     match controller.submit(&Credentials::new("user@example.com", "secret")).await {
//!         Ok(success) => println!("go to {}", success.destination),
//!         Err(e) => println!("{e}"),
//!     }
//!
//!     controller.shutdown().await;
//!     Ok(())
//! }
//! ```
pub mod authority;
pub mod builder;
pub mod config;
pub mod controller;
pub mod error;
pub mod form;
pub mod session;

pub use authority::{
    AuthOutcome, AuthResponse, AuthResponseBody, Authority, HttpAuthority, LoginRequest,
    TransportError,
};
pub use builder::{LatchBuilder, LatchBuilderError, NoStorage, WithStorage};
pub use config::{ConfigError, LatchConfig};
pub use controller::{Credentials, GateStatus, LoginController, LoginSuccess, TokenStorage};
pub use error::LoginError;
pub use form::FormState;
pub use session::{LoginSession, SessionOutcome};

/// Re-export core types from latch_core
pub use latch_core::{LockoutPolicy, LockoutState, RemainingLockout};

#[cfg(feature = "sqlite")]
pub use latch_storage_sqlite::SqliteStorage;
