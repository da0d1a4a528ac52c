use common::{GeometryError, TensorError};
use thiserror::Error;
use uuid::Uuid;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("vehicle not found: {0}")]
    EntityNotFound(Uuid),

    #[error("engine error: {0}")]
    Engine(String),

    #[error("image load error: {0}")]
    Load(String),

    #[error("worker error: {0}")]
    Worker(String),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Wraps an engine-side `anyhow` error, keeping its context chain.
    pub fn from_engine(err: anyhow::Error) -> Self {
        Self::Engine(format!("{:#}", err))
    }

    pub fn from_load(err: anyhow::Error) -> Self {
        Self::Load(format!("{:#}", err))
    }
}

impl From<GeometryError> for PipelineError {
    fn from(err: GeometryError) -> Self {
        match err {
            GeometryError::Validation(msg) => Self::Validation(msg),
            GeometryError::Transform(msg) => Self::Transform(msg),
        }
    }
}

impl From<TensorError> for PipelineError {
    fn from(err: TensorError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<tokio::task::JoinError> for PipelineError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}
