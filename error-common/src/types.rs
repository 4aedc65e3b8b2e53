use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failure classes of the mail transformation stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Format,
    Version,
    CardNotFound,
    DeviceCall,
    Integrity,
    AddressEligibility,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Format => "format",
            ErrorKind::Version => "version",
            ErrorKind::CardNotFound => "card_not_found",
            ErrorKind::DeviceCall => "device_call",
            ErrorKind::Integrity => "integrity",
            ErrorKind::AddressEligibility => "address_eligibility",
        };
        f.write_str(name)
    }
}

/// Gateway error taxonomy
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed MIME or CMS structure
    #[error("Format error: {0}")]
    Format(String),

    /// Unsupported or newer KOM-LE version
    #[error("Version error: {0}")]
    Version(String),

    /// No card satisfies the selection criteria
    #[error("Card not found: {0}")]
    CardNotFound(String),

    /// Token device returned a non-OK status or failed
    #[error("Device call failed: {0}")]
    DeviceCall(String),

    /// Signature or header comparison failed
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Address rejected for certificate or version reasons
    #[error("Address not eligible: {address}: {reason}")]
    AddressEligibility { address: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal system errors
    #[error("Internal error: {0}")]
    InternalError(String),

    /// Wrapped external errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            GatewayError::Format(_) => Some(ErrorKind::Format),
            GatewayError::Version(_) => Some(ErrorKind::Version),
            GatewayError::CardNotFound(_) => Some(ErrorKind::CardNotFound),
            GatewayError::DeviceCall(_) => Some(ErrorKind::DeviceCall),
            GatewayError::Integrity(_) => Some(ErrorKind::Integrity),
            GatewayError::AddressEligibility { .. } => Some(ErrorKind::AddressEligibility),
            GatewayError::ConfigError(_) | GatewayError::InternalError(_) | GatewayError::Other(_) => None,
        }
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

pub fn log_error(context: &str, error: &GatewayError) {
    tracing::error!(
        context = context,
        kind = ?error.kind(),
        error = %error,
        "Gateway error occurred"
    );
}
