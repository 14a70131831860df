//! Error types shared by the flow model and record layer

use thiserror::Error;

/// Core error type for flow graphs, record batches and the criteria catalog
#[derive(Error, Debug)]
pub enum FlowError {
    /// Input text is not valid JSON
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A record has no `model` discriminator
    #[error("Record at index {0} is missing its model tag")]
    MissingModel(usize),

    /// A record's body does not match the shape of its model kind
    #[error("Malformed {kind} record: {source}")]
    MalformedRecord {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Top-level value is not an array of records
    #[error("Expected a JSON array of records")]
    NotABatch,

    /// Catalog lookup by id failed
    #[error("Criterion not found: {0}")]
    CriterionNotFound(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
