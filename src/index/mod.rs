//! Artifact indexer and store.
//!
//! Filenames are inferred from structured artifact identifiers; per-directory indexes are
//! rebuilt from scratch from the artifacts on disk.

pub mod artifact_id;
pub mod rebuild;
pub mod store;
