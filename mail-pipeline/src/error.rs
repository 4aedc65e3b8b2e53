use error_common::{ErrorKind, GatewayError};
use thiserror::Error;

/// MIME model errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("Empty message")]
    Empty,

    #[error("Malformed header line: {0}")]
    MalformedHeader(String),

    #[error("Invalid {encoding} content: {reason}")]
    InvalidEncoding { encoding: String, reason: String },

    #[error("Invalid address list: {0}")]
    InvalidAddress(String),

    #[error("Missing part: {0}")]
    MissingPart(String),

    #[error("Message assembly failed: {0}")]
    Build(String),
}

pub type MailResult<T> = Result<T, MailError>;

/// Errors returned by the sign-encrypt and decrypt-verify pipelines.
///
/// The stage failure itself is always a [`GatewayError`]; the remaining
/// variants carry causes from the lower layers when a stage surfaces them
/// unchanged.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Mail error: {0}")]
    Mail(#[from] MailError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Device error: {0}")]
    Device(#[from] device_manager::DeviceError),
}

impl PipelineError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            PipelineError::Gateway(error) => error.kind(),
            PipelineError::Mail(_) | PipelineError::Crypto(_) => Some(ErrorKind::Format),
            PipelineError::Device(_) => Some(ErrorKind::DeviceCall),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
