//! Scanning primitives: line pattern matching, heredoc block detection, corpus walking.

pub mod heredoc;
pub mod patterns;
pub mod text;
pub mod walker;
