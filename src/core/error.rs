use thiserror::Error;

use crate::core::types::{ExecutionId, ObjectId};

#[derive(Error, Debug)]
pub enum IveError {
    #[error("Unknown process template: {0}")]
    UnknownProcess(String),

    #[error("Object not found: {0:?}")]
    ObjectNotFound(ObjectId),

    #[error("Process execution is not running: {0:?}")]
    ProcessNotRunning(ExecutionId),

    #[error("Process template is not delegated: {0}")]
    NotDelegated(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IveError>;
