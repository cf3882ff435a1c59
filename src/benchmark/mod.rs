//! Agent structural legibility benchmark.
//!
//! Five prompted tiers are sent to a chat-completion model; replies are scored,
//! aggregated, and written with their prompts and hashes for provenance.

pub mod client;
pub mod runner;
pub mod tiers;
