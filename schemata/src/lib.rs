//! # Schemata
//!
//! An event-sourced, in-memory replica of a shared schema catalog for Tokio.
//!
//! Every process builds its own replica by consuming two topics from the
//! beginning: entry updates (`{UUID, spec}`) and alias bindings
//! (`{UUID, alias}`). There is no central query server and nothing is
//! persisted. Callers may ask for an entry or alias before it has arrived
//! and get a one-shot signal the moment it does, whatever order the entry
//! and its alias come in.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use schemata::{memory::MemoryLog, *};
//!
//! #[tokio::main]
//! async fn main() -> Result {
//!     let log = MemoryLog::new();
//!     let repo = CatalogRepository::new(log.connect(), Config::default());
//!     let handle = repo.run().await?;
//!
//!     let updater = Updater::new(log.connect(), Config::default());
//!     let spec = r#"{"type": "object", "required": ["sku"]}"#;
//!     let (_, version) = updater
//!         .create_schema("orders", spec, &codec::JsonSchemaCompiler)
//!         .await?;
//!
//!     let orders = repo.versioned();
//!     orders.wait_ready(&version).await?;
//!     let bytes = orders.encode(&version, &serde_json::json!({"sku": "A-1"}))?;
//!     println!("{}", String::from_utf8_lossy(&bytes));
//!
//!     handle.shutdown().await
//! }
//! ```
//!
//! ## Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ReadinessRegistry`] | Key-addressable table of one-shot wait signals |
//! | [`ObservableStore`] | Concurrent map that signals waiters on every write |
//! | [`EventRouter`] | Poll loop dispatching transport records by [`Topic`] |
//! | [`CatalogRepository`] | The replica: entries, aliases and readiness waits |
//! | [`Versioned`] | The replica addressed by [`NameVersion`] |
//! | [`Ready`] | Future resolving once a key is present |
//!
//! ## Collaborators
//!
//! The replica is generic over two seams:
//!
//! - [`transport::Transport`] - subscribe, poll, produce. [`memory::MemoryLog`]
//!   is an in-process implementation.
//! - [`codec::Compiler`] - turns specification text into a codec.
//!   [`codec::JsonSchemaCompiler`] is the default.
//!
//! ## Waiting
//!
//! Readiness signals impose no timeout. Bound them with
//! [`tokio::time::timeout`] or [`Ready::or_cancelled`]:
//!
//! ```rust,ignore
//! let token = CancellationToken::new();
//! if !repo.wait_alias_ready(&alias).or_cancelled(&token).await? {
//!     return Ok(()); // gave up
//! }
//! ```
//!
//! ## Logging
//!
//! The crate logs through [`tracing`] and never installs a subscriber.

mod alias;
mod config;
mod entry_id;
mod error;
mod name_version;
mod observable;
mod readiness;
mod repository;
mod router;
mod topic;
mod versioned;

pub mod codec;
pub mod commands;
pub mod explorer;
pub mod memory;
pub mod transport;

pub use alias::Alias;
pub use commands::Updater;
pub use config::Config;
pub use entry_id::EntryId;
pub use error::Error;
pub use name_version::NameVersion;
pub use observable::ObservableStore;
pub use readiness::{ReadinessRegistry, Ready};
pub use repository::CatalogRepository;
pub use router::{EventRouter, Handler, RouterState, StopHandle};
pub use topic::Topic;
pub use transport::{Message, TransportEvent};
pub use versioned::Versioned;

/// Convenience alias for `Result<T, schemata::Error>`.
pub type Result<T = ()> = std::result::Result<T, Error>;
