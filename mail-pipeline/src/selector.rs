use crypto::IssuerSerial;
use device_manager::{CardHandle, CertRef, CryptoCard, TokenDevice};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    #[error("No usable card: {0}")]
    NotFound(String),
}

/// First SMC-B with a verified PIN, in device order.
///
/// # Errors
///
/// [`SelectError::NotFound`] when no card qualifies.
pub fn select_signing_card(cards: &[CryptoCard]) -> Result<CardHandle, SelectError> {
    let card = cards
        .iter()
        .find(|card| card.is_usable_smcb())
        .ok_or_else(|| SelectError::NotFound("no SMC-B with verified PIN for signing".to_string()))?;
    debug!(card = %card.card_handle, "Selected signing card");
    Ok(card.card_handle.clone())
}

/// First usable SMC-B holding a C.ENC certificate whose issuer/serial is
/// one of `targets`.
///
/// Cards whose certificates cannot be read are skipped.
///
/// # Errors
///
/// [`SelectError::NotFound`] when no card matches.
pub async fn select_decryption_card(
    device: &dyn TokenDevice,
    cards: &[CryptoCard],
    targets: &[IssuerSerial],
) -> Result<CardHandle, SelectError> {
    for card in cards.iter().filter(|card| card.is_usable_smcb()) {
        let certificates = match device.read_certificate(&card.card_handle, CertRef::CEnc).await {
            Ok(certificates) => certificates,
            Err(e) => {
                warn!(card = %card.card_handle, error = %e, "Reading C.ENC failed, skipping card");
                continue;
            }
        };

        for certificate in &certificates {
            match IssuerSerial::from_certificate_der(&certificate.der) {
                Ok(issuer_serial) if targets.contains(&issuer_serial) => {
                    debug!(card = %card.card_handle, target = %issuer_serial, "Selected decryption card");
                    return Ok(card.card_handle.clone());
                }
                Ok(_) => {}
                Err(e) => warn!(card = %card.card_handle, error = %e, "Unreadable C.ENC certificate"),
            }
        }
    }

    Err(SelectError::NotFound(format!(
        "no SMC-B holds a certificate for {} target(s)",
        targets.len()
    )))
}
