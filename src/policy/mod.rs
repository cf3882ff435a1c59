//! Governance policy: the injected lookup table and the scope classifier.

pub mod scope;
pub mod table;
