use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Unable to load model. Check the specified path: {path} ({reason})")]
    ModelLoad { path: String, reason: String },
    #[error("Error occurred while opening the image: {0}")]
    ImageDecode(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("Please select a valid source type! ({0})")]
    InvalidSelection(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DomainError {
    /// Identificador estable para el frontend.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::ModelLoad { .. } => "model_load",
            DomainError::ImageDecode(_) => "image_decode",
            DomainError::Inference(_) => "inference",
            DomainError::SourceUnavailable(_) => "source_unavailable",
            DomainError::InvalidSelection(_) => "invalid_selection",
            DomainError::InvalidInput(_) => "invalid_input",
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Mensaje visible en la página. Todo error termina aquí, nunca en un panic.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserMessage {
    pub kind: &'static str,
    pub message: String,
}

impl From<&DomainError> for UserMessage {
    fn from(err: &DomainError) -> Self {
        Self { kind: err.kind(), message: err.to_string() }
    }
}
