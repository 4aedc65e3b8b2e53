use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    CardCertificate, CardHandle, CertRef, CryptoCard, DecryptResponse, EncryptResponse, ProductInfo, SignResponse,
    VerifyResponse,
};

// ============================================================================
// TOKEN DEVICE TRAIT
// ============================================================================

/// Capabilities of the token device (Konnektor) used by the mail pipelines.
///
/// A non-OK [`OperationStatus`](crate::OperationStatus) in a response is a
/// regular outcome; `Err` is reserved for transport and protocol failures.
/// Timeouts and retries belong to the implementation.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait TokenDevice: Send + Sync {
    /// Cards currently inserted, in device order.
    async fn list_cards(&self) -> Result<Vec<CryptoCard>>;

    async fn read_certificate(&self, card: &CardHandle, cert_ref: CertRef) -> Result<Vec<CardCertificate>>;

    /// Signs `document` as attached CMS SignedData carrying the DER
    /// recipient-emails attribute as a signed attribute.
    async fn sign(&self, card: &CardHandle, document: &[u8], recipient_emails: &[u8]) -> Result<SignResponse>;

    /// Encrypts `document` as AuthEnvelopedData for the given DER certificates.
    async fn encrypt(
        &self,
        recipient_keys: &[Vec<u8>],
        document: &[u8],
        recipient_emails: &[u8],
    ) -> Result<EncryptResponse>;

    async fn decrypt(&self, card: &CardHandle, encrypted: &[u8]) -> Result<DecryptResponse>;

    async fn verify(&self, signed: &[u8]) -> Result<VerifyResponse>;

    /// `true` when the device can encrypt for ECC recipient keys.
    fn ecc_encryption_available(&self) -> bool;

    fn product_info(&self) -> ProductInfo;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CardType, OperationStatus, PinStatus};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_mock_device_is_object_safe() {
        let mut mock = MockTokenDevice::new();
        mock.expect_list_cards().times(1).returning(|| {
            Ok(vec![CryptoCard {
                card_handle: CardHandle::new("h1"),
                card_type: CardType::SmcB,
                pin_status: PinStatus::Verified,
                iccsn: "80276883110000017222".to_string(),
                telematik_id: None,
            }])
        });
        mock.expect_sign()
            .withf(|card, document, _| card.as_str() == "h1" && document == b"doc")
            .times(1)
            .returning(|_, _, _| {
                Ok(SignResponse {
                    status: OperationStatus::ok(),
                    signature: Some(vec![1, 2, 3]),
                })
            });
        mock.expect_ecc_encryption_available().return_const(true);

        let device: Arc<dyn TokenDevice> = Arc::new(mock);
        let cards = device.list_cards().await.unwrap();
        assert_eq!(cards.len(), 1);
        let response = device.sign(&cards[0].card_handle, b"doc", b"").await.unwrap();
        assert!(response.status.is_ok());
        assert!(device.ecc_encryption_available());
    }
}
