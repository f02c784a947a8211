use std::path::PathBuf;

use thiserror::Error;

use crate::validate::ValidationError;

#[derive(Debug, Error)]
pub enum LayerconfError {
    #[error("Error while parsing configuration file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration from {path}: configuration should be a table/object")]
    NotATable { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("At least one config directory must be specified; call .path() on the builder")]
    NoSearchPaths,

    #[error("Configuration failed validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("Unknown keys in configuration: {}", .0.join(", "))]
    UnknownKeys(Vec<String>),

    #[error("Cannot coerce value '{value}' of '{key}' to {expected}")]
    Coercion {
        key: String,
        value: String,
        expected: String,
    },

    #[error("Configuration for '{0}' has already been registered")]
    AlreadyRegistered(String),

    #[error("Invalid defaults: {0}")]
    InvalidDefaults(String),

    #[error("Failed to deserialize configuration: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("Unable to find {file_name} in {start} or any parent directory")]
    SettingsNotFound { file_name: String, start: PathBuf },

    #[error("Invalid settings file {path}: {message}")]
    InvalidSettings { path: PathBuf, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_mentions_path_and_parsing() {
        let err = LayerconfError::Parse {
            path: "/etc/app/default.json".into(),
            message: "expected value at line 1 column 1".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("default.json"));
        assert!(msg.to_lowercase().contains("error while parsing"));
        assert!(msg.contains("line 1"));
    }

    #[test]
    fn no_search_paths_mentions_builder_method() {
        let err = LayerconfError::NoSearchPaths;
        assert!(err.to_string().contains(".path()"));
    }

    #[test]
    fn unknown_keys_lists_every_key() {
        let err = LayerconfError::UnknownKeys(vec!["typo".into(), "database.typo".into()]);
        let msg = err.to_string();
        assert!(msg.contains("typo, database.typo"));
    }

    #[test]
    fn already_registered_names_module() {
        let err = LayerconfError::AlreadyRegistered("crypto".into());
        assert!(err.to_string().contains("crypto"));
    }
}
