use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("unknown movement type: {0:?}")]
    UnknownMovementType(String),
    #[error("unknown incident status: {0:?}")]
    UnknownIncidentStatus(String),
}
