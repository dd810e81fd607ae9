//! Error taxonomy for the engine.
//!
//! Contract violations (mismatched metadata, unknown names, duplicate labels, field
//! collisions) and data-shape failures get their own variants. Failures raised inside a
//! metric or preprocessor body are `anyhow` errors wrapped with the metric and community name.

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot combine metrics with differing level or returntype ({context}): {details}")]
    IncompatibleMetrics { context: String, details: String },

    #[error("unknown {kind} '{name}'")]
    Unknown { kind: &'static str, name: String },

    #[error("'{name}' is not tagged as a {expected} (it is a {found})")]
    WrongKind { name: String, expected: &'static str, found: &'static str },

    #[error("label names already present in the collection: {}", .0.join(", "))]
    DuplicateLabels(Vec<String>),

    #[error("field '{field}' produced with differing values ({context})")]
    FieldCollision { field: String, context: String },

    #[error("index of field '{field}' cannot be unified: {reason}")]
    MixedIndex { field: String, reason: String },

    #[error("shape error: {0}")]
    Shape(String),

    #[error("missing column '{column}' ({context})")]
    MissingColumn { column: String, context: String },

    #[error("community '{community}' is inconsistent: {reason}")]
    Integrity { community: String, reason: String },

    #[error("metric '{metric}' failed on community '{community}'")]
    Metric {
        metric: String,
        community: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("preprocessor '{preprocessor}' failed on community '{community}'")]
    Preprocessor {
        preprocessor: String,
        community: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("frame operation failed: {0}")]
    Frame(#[from] polars::prelude::PolarsError),

    #[error("invalid argument: {0}")]
    Invalid(String),

    #[error(transparent)]
    Load(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn metric(metric: &str, community: &str, err: anyhow::Error) -> Self {
        Error::Metric { metric: metric.to_string(), community: community.to_string(), source: err.into() }
    }

    pub(crate) fn preprocessor(preprocessor: &str, community: &str, err: anyhow::Error) -> Self {
        Error::Preprocessor { preprocessor: preprocessor.to_string(), community: community.to_string(), source: err.into() }
    }

    pub(crate) fn missing_column(column: &str, context: impl Into<String>) -> Self {
        Error::MissingColumn { column: column.to_string(), context: context.into() }
    }
}
