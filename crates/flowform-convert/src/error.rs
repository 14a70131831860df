//! Conversion errors

use flowform_core::FlowError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the exporter, importer and config loader
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Record or model error from the core crate
    #[error(transparent)]
    Flow(#[from] FlowError),

    /// Input text is not valid JSON, or a graph shape failed to decode
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A relational batch without a single node record has no start node to lay out from
    #[error("Record batch contains no node records")]
    EmptyBatch,

    /// Top-level value is neither a record array nor an object with `nodes` and `edges`
    #[error("Unrecognized input shape: expected an array of records or an object with nodes and edges")]
    UnrecognizedShape,

    /// Config file is not valid TOML for [`crate::ConvertConfig`]
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// Config file could not be read
    #[error("Failed to read configuration {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Environment override with an unparsable value
    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
}

pub type Result<T> = std::result::Result<T, ConvertError>;
