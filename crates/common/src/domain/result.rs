use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Malformed telemetry message: {0}")]
    MalformedMessage(String),

    #[error("Sink delivery failed: {0}")]
    SinkError(#[source] anyhow::Error),

    #[error("Messaging error: {0}")]
    MessagingError(#[from] anyhow::Error),
}
