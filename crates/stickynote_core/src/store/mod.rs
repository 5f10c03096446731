//! Document store client.
//!
//! # Responsibility
//! - Own the single connection to the document database for one process.
//! - Expose collection-level document CRUD plus a change revision feed.
//!
//! # Invariants
//! - A `StoreClient` is constructed explicitly and shared by `Arc`; there is
//!   no global connection handle.
//! - The revision counter advances only after a write has committed.

mod client;

pub use client::{StoreClient, StoreError, StoreResult, StoredDocument};
