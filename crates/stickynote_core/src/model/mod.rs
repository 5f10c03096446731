//! Domain model for sticky notes.
//!
//! # Responsibility
//! - Define the canonical note shape used by sync and presentation layers.
//! - Keep the stored document shape separate from the in-memory shape.
//!
//! # Invariants
//! - Every note is identified by a store-assigned `NoteId`.

pub mod note;
