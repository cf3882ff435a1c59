//! GVA-prefixed error types with structured error codes.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, GvaError>;

/// Top-level error type for the governance auditors.
#[derive(Debug, Error)]
pub enum GvaError {
    /// A configuration value failed validation.
    #[error("[GVA-1001] invalid configuration: {details}")]
    InvalidConfig {
        /// Which value and why.
        details: String,
    },

    /// An explicitly named config file does not exist.
    #[error("[GVA-1002] missing configuration file: {path}")]
    MissingConfig {
        /// Path that was requested.
        path: PathBuf,
    },

    /// TOML or environment override could not be parsed.
    #[error("[GVA-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        /// File path or variable name.
        context: &'static str,
        /// Parser message.
        details: String,
    },

    /// A policy regex failed to compile or lacks a required capture group.
    #[error("[GVA-1004] invalid rule pattern {rule_id}: {details}")]
    InvalidPattern {
        /// Rule the pattern belongs to.
        rule_id: String,
        /// Compiler message.
        details: String,
    },

    /// An artifact identifier is outside the `artifact/` namespace or malformed.
    #[error("[GVA-2001] invalid artifact id {artifact_id:?}: {reason}")]
    InvalidArtifactId {
        /// Offending identifier.
        artifact_id: String,
        /// What is wrong with it.
        reason: String,
    },

    /// User-supplied input was rejected.
    #[error("[GVA-2002] invalid input {path}: {details}")]
    InvalidInput {
        /// Input location.
        path: PathBuf,
        /// What is wrong with it.
        details: String,
    },

    /// JSON or TOML (de)serialization failed.
    #[error("[GVA-2101] serialization failure in {context}: {details}")]
    Serialization {
        /// Format being handled.
        context: &'static str,
        /// Serializer message.
        details: String,
    },

    /// Filesystem operation failed.
    #[error("[GVA-3002] IO failure at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An external command could not run or exited unsuccessfully.
    #[error("[GVA-3003] external command `{command}` failed: {details}")]
    Command {
        /// Command line.
        command: String,
        /// Spawn error or captured stderr.
        details: String,
    },

    /// Model endpoint request failed.
    #[error("[GVA-3004] model request failed: {details}")]
    Network {
        /// Transport or HTTP status detail.
        details: String,
    },

    /// Any other failure during a run.
    #[error("[GVA-3900] runtime failure: {details}")]
    Runtime {
        /// Failure description.
        details: String,
    },
}

impl GvaError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "GVA-1001",
            Self::MissingConfig { .. } => "GVA-1002",
            Self::ConfigParse { .. } => "GVA-1003",
            Self::InvalidPattern { .. } => "GVA-1004",
            Self::InvalidArtifactId { .. } => "GVA-2001",
            Self::InvalidInput { .. } => "GVA-2002",
            Self::Serialization { .. } => "GVA-2101",
            Self::Io { .. } => "GVA-3002",
            Self::Command { .. } => "GVA-3003",
            Self::Network { .. } => "GVA-3004",
            Self::Runtime { .. } => "GVA-3900",
        }
    }

    /// Whether the failure stems from user-supplied input rather than the environment.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::InvalidPattern { .. }
                | Self::InvalidArtifactId { .. }
                | Self::InvalidInput { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for GvaError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for GvaError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<regex::Error> for GvaError {
    fn from(value: regex::Error) -> Self {
        Self::InvalidPattern {
            rule_id: "<anonymous>".to_string(),
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<GvaError> {
        vec![
            GvaError::InvalidConfig {
                details: String::new(),
            },
            GvaError::MissingConfig {
                path: PathBuf::new(),
            },
            GvaError::ConfigParse {
                context: "",
                details: String::new(),
            },
            GvaError::InvalidPattern {
                rule_id: String::new(),
                details: String::new(),
            },
            GvaError::InvalidArtifactId {
                artifact_id: String::new(),
                reason: String::new(),
            },
            GvaError::InvalidInput {
                path: PathBuf::new(),
                details: String::new(),
            },
            GvaError::Serialization {
                context: "",
                details: String::new(),
            },
            GvaError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            GvaError::Command {
                command: String::new(),
                details: String::new(),
            },
            GvaError::Network {
                details: String::new(),
            },
            GvaError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(GvaError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn display_embeds_code() {
        for err in all_variants() {
            let msg = err.to_string();
            assert!(
                msg.contains(err.code()),
                "display should contain error code {}: {msg}",
                err.code()
            );
        }
    }

    #[test]
    fn user_errors_are_classified() {
        assert!(
            GvaError::InvalidArtifactId {
                artifact_id: "x".to_string(),
                reason: "bad".to_string(),
            }
            .is_user_error()
        );
        assert!(
            !GvaError::Network {
                details: "timeout".to_string()
            }
            .is_user_error()
        );
        assert!(!GvaError::io("/tmp/x", std::io::Error::other("gone")).is_user_error());
    }

    #[test]
    fn io_convenience_constructor() {
        let err = GvaError::io(
            "/tmp/registry.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "GVA-3002");
        assert!(err.to_string().contains("/tmp/registry.json"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: GvaError = json_err.into();
        assert_eq!(err.code(), "GVA-2101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: GvaError = toml_err.into();
        assert_eq!(err.code(), "GVA-1003");
    }

    #[test]
    fn from_regex_error() {
        let regex_err = regex::Regex::new("(unclosed").unwrap_err();
        let err: GvaError = regex_err.into();
        assert_eq!(err.code(), "GVA-1004");
    }
}
