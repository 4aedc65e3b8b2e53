use const_oid::ObjectIdentifier;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("ASN.1 encoding error: {0}")]
    Der(#[from] der::Error),

    #[error("Unexpected content type: expected {expected}, found {found}")]
    UnexpectedContentType {
        expected: ObjectIdentifier,
        found: ObjectIdentifier,
    },

    #[error("Missing content: {0}")]
    MissingContent(String),

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Invalid encrypted data format: {0}")]
    InvalidFormat(String),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
