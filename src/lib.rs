//! # Funnel
//!
//! A lightweight CRM server for tracking customers and sales leads, usable
//! both as a standalone binary and as a library.
//!
//! Every customer is bound to the principal that created it, and every lead
//! derives its owner through its customer. All data access is scoped through
//! that ownership chain.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! funnel = { version = "0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::path::PathBuf;
//! use funnel::server::{AppState, create_router};
//! use funnel::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new(&PathBuf::from("./data/funnel.db")).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState {
//!     store: Arc::new(store),
//! });
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes the CLI binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
