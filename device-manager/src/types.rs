use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

// ============================================================================
// CARDS
// ============================================================================

/// Opaque handle the token device assigns to an inserted card
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CardHandle(pub String);

impl CardHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardType {
    #[serde(rename = "SMC-B")]
    SmcB,
    #[serde(rename = "SM-B")]
    SmB,
    #[serde(rename = "HBA")]
    Hba,
    #[serde(rename = "HBAx")]
    HbaX,
    Other(String),
}

impl CardType {
    pub fn from_code(code: &str) -> Self {
        match code {
            "SMC-B" => CardType::SmcB,
            "SM-B" => CardType::SmB,
            "HBA" => CardType::Hba,
            "HBAx" => CardType::HbaX,
            other => {
                debug!(code = other, "Unknown card type");
                CardType::Other(other.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PinStatus {
    Verified,
    Verifiable,
    Blocked,
    Other(String),
}

impl PinStatus {
    pub fn from_code(code: &str) -> Self {
        match code {
            "VERIFIED" => PinStatus::Verified,
            "VERIFIABLE" => PinStatus::Verifiable,
            "BLOCKED" => PinStatus::Blocked,
            other => {
                debug!(code = other, "Unknown PIN status");
                PinStatus::Other(other.to_string())
            }
        }
    }
}

/// Card state as reported by the token device, read fresh per transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoCard {
    pub card_handle: CardHandle,
    pub card_type: CardType,
    pub pin_status: PinStatus,
    pub iccsn: String,
    pub telematik_id: Option<String>,
}

impl CryptoCard {
    /// SMC-B with a verified PIN, the only cards used for signing and decryption.
    pub fn is_usable_smcb(&self) -> bool {
        self.card_type == CardType::SmcB && self.pin_status == PinStatus::Verified
    }
}

// ============================================================================
// CERTIFICATES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertRef {
    #[serde(rename = "C.AUT")]
    CAut,
    #[serde(rename = "C.ENC")]
    CEnc,
    #[serde(rename = "C.SIG")]
    CSig,
    #[serde(rename = "C.QES")]
    CQes,
}

impl fmt::Display for CertRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CertRef::CAut => "C.AUT",
            CertRef::CEnc => "C.ENC",
            CertRef::CSig => "C.SIG",
            CertRef::CQes => "C.QES",
        };
        f.write_str(code)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardCertificate {
    pub cert_ref: CertRef,
    /// DER encoded X.509 certificate
    pub der: Vec<u8>,
}

// ============================================================================
// OPERATION RESPONSES
// ============================================================================

pub const STATUS_OK: &str = "OK";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationStatus {
    pub result: String,
    pub error: Option<String>,
}

impl OperationStatus {
    pub fn ok() -> Self {
        Self {
            result: STATUS_OK.to_string(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            result: "FAILED".to_string(),
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result == STATUS_OK
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(error) => write!(f, "{}: {}", self.result, error),
            None => f.write_str(&self.result),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    pub status: OperationStatus,
    /// DER SignedData with the document encapsulated
    pub signature: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptResponse {
    pub status: OperationStatus,
    /// DER ContentInfo of the AuthEnvelopedData
    pub document: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptResponse {
    pub status: OperationStatus,
    pub document: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub status: OperationStatus,
    /// e.g. VALID, INCONCLUSIVE, INVALID
    pub high_level_result: Option<String>,
    pub report: Option<VerificationReport>,
}

/// Signature verification report returned by the token device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub high_level_result: String,
    pub signer: Option<String>,
    pub signing_time: Option<DateTime<Utc>>,
    pub details: Vec<String>,
}

// ============================================================================
// PRODUCT INFORMATION
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub product_name: String,
    pub product_type: String,
    pub product_type_version: String,
    pub hw_version: String,
    pub fw_version: String,
}

impl ProductInfo {
    /// Value of the `X-KIM-KONVersion` header.
    pub fn kon_version_header(&self) -> String {
        format!(
            "<{}><{}><{}><{}><{}>",
            self.product_name, self.product_type, self.product_type_version, self.hw_version, self.fw_version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(card_type: CardType, pin_status: PinStatus) -> CryptoCard {
        CryptoCard {
            card_handle: CardHandle::new("SMC-B-1"),
            card_type,
            pin_status,
            iccsn: "80276883110000017222".to_string(),
            telematik_id: Some("5-2-123456789".to_string()),
        }
    }

    #[test]
    fn test_usable_smcb() {
        assert!(card(CardType::SmcB, PinStatus::Verified).is_usable_smcb());
        assert!(!card(CardType::SmcB, PinStatus::Verifiable).is_usable_smcb());
        assert!(!card(CardType::SmcB, PinStatus::Blocked).is_usable_smcb());
        assert!(!card(CardType::Hba, PinStatus::Verified).is_usable_smcb());
    }

    #[test]
    fn test_codes() {
        assert_eq!(CardType::from_code("SMC-B"), CardType::SmcB);
        assert_eq!(CardType::from_code("EGK"), CardType::Other("EGK".to_string()));
        assert_eq!(PinStatus::from_code("TRANSPORT_PIN"), PinStatus::Other("TRANSPORT_PIN".to_string()));
        assert_eq!(CertRef::CEnc.to_string(), "C.ENC");
        assert_eq!(serde_json::to_string(&CardType::SmcB).unwrap(), "\"SMC-B\"");
        assert_eq!(serde_json::to_string(&PinStatus::Verified).unwrap(), "\"VERIFIED\"");
    }

    #[test]
    fn test_operation_status() {
        assert!(OperationStatus::ok().is_ok());
        let failed = OperationStatus::failed("4085 PIN not verified");
        assert!(!failed.is_ok());
        assert_eq!(failed.to_string(), "FAILED: 4085 PIN not verified");
    }

    #[test]
    fn test_kon_version_header() {
        let info = ProductInfo {
            product_name: "KoCoBox".to_string(),
            product_type: "Konnektor".to_string(),
            product_type_version: "4.9.3".to_string(),
            hw_version: "2.0.0".to_string(),
            fw_version: "4.9.3".to_string(),
        };
        assert_eq!(info.kon_version_header(), "<KoCoBox><Konnektor><4.9.3><2.0.0><4.9.3>");
    }
}
