#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use config_engine::GatewayConfig;
use crypto::{fixtures, CmsEnvelope, RecipientCertificate};
use device_manager::{
    CardCertificate, CardHandle, CardType, CertRef, CryptoCard, DecryptResponse, DeviceError, EncryptResponse,
    OperationStatus, PinStatus, ProductInfo, SignResponse, TokenDevice, VerificationReport, VerifyResponse,
};

pub const SENDER: &str = "praxis@kim.telematik";
pub const RECIPIENT_A: &str = "apotheke@kim.telematik";
pub const RECIPIENT_B: &str = "labor@kim.telematik";

/// Token device that "encrypts" by wrapping the payload in a fixture
/// envelope and "signs" by wrapping it in attached SignedData.
pub struct LoopbackDevice {
    cards: Vec<CryptoCard>,
    enc_certs: HashMap<String, Vec<u8>>,
    pub sign_calls: AtomicUsize,
    pub encrypt_calls: AtomicUsize,
    pub decrypt_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
}

impl LoopbackDevice {
    pub fn new() -> Self {
        Self {
            cards: Vec::new(),
            enc_certs: HashMap::new(),
            sign_calls: AtomicUsize::new(0),
            encrypt_calls: AtomicUsize::new(0),
            decrypt_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        }
    }

    /// Inserts a verified SMC-B holding `enc_cert` as C.ENC.
    pub fn with_card(mut self, handle: &str, enc_cert: Vec<u8>) -> Self {
        self.cards.push(smcb(handle, PinStatus::Verified));
        self.enc_certs.insert(handle.to_string(), enc_cert);
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenDevice for LoopbackDevice {
    async fn list_cards(&self) -> device_manager::Result<Vec<CryptoCard>> {
        Ok(self.cards.clone())
    }

    async fn read_certificate(
        &self,
        card: &CardHandle,
        cert_ref: CertRef,
    ) -> device_manager::Result<Vec<CardCertificate>> {
        let der = self
            .enc_certs
            .get(card.as_str())
            .ok_or_else(|| DeviceError::NotFound(card.to_string()))?;
        Ok(vec![CardCertificate {
            cert_ref,
            der: der.clone(),
        }])
    }

    async fn sign(
        &self,
        _card: &CardHandle,
        document: &[u8],
        _recipient_emails: &[u8],
    ) -> device_manager::Result<SignResponse> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        let signature = fixtures::signed_data(document).map_err(|e| DeviceError::ProtocolError(e.to_string()))?;
        Ok(SignResponse {
            status: OperationStatus::ok(),
            signature: Some(signature),
        })
    }

    async fn encrypt(
        &self,
        recipient_keys: &[Vec<u8>],
        document: &[u8],
        recipient_emails: &[u8],
    ) -> device_manager::Result<EncryptResponse> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);
        let envelope = fixtures::auth_enveloped_data(recipient_keys, Some(recipient_emails), document)
            .map_err(|e| DeviceError::ProtocolError(e.to_string()))?;
        Ok(EncryptResponse {
            status: OperationStatus::ok(),
            document: Some(envelope),
        })
    }

    async fn decrypt(&self, _card: &CardHandle, encrypted: &[u8]) -> device_manager::Result<DecryptResponse> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        let envelope = CmsEnvelope::from_der(encrypted).map_err(|e| DeviceError::ProtocolError(e.to_string()))?;
        Ok(DecryptResponse {
            status: OperationStatus::ok(),
            document: envelope.encrypted_content().map(<[u8]>::to_vec),
        })
    }

    async fn verify(&self, _signed: &[u8]) -> device_manager::Result<VerifyResponse> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(VerifyResponse {
            status: OperationStatus::ok(),
            high_level_result: Some("VALID".to_string()),
            report: Some(report()),
        })
    }

    fn ecc_encryption_available(&self) -> bool {
        false
    }

    fn product_info(&self) -> ProductInfo {
        product_info()
    }
}

pub fn smcb(handle: &str, pin_status: PinStatus) -> CryptoCard {
    CryptoCard {
        card_handle: CardHandle::new(handle),
        card_type: CardType::SmcB,
        pin_status,
        iccsn: "80276883110000017222".to_string(),
        telematik_id: Some("5-2-KH-TEST-01".to_string()),
    }
}

pub fn report() -> VerificationReport {
    VerificationReport {
        high_level_result: "VALID".to_string(),
        signer: Some("Praxis Test".to_string()),
        signing_time: None,
        details: Vec::new(),
    }
}

pub fn product_info() -> ProductInfo {
    ProductInfo {
        product_name: "Test-Konnektor".to_string(),
        product_type: "Konnektor".to_string(),
        product_type_version: "4.8.0".to_string(),
        hw_version: "1.0.0".to_string(),
        fw_version: "4.8.0".to_string(),
    }
}

/// RSA encryption certificate for `address`.
pub fn enc_cert(address: &str, serial: u8) -> Vec<u8> {
    fixtures::certificate(address, &[serial], false).unwrap()
}

pub fn recipient(address: &str, serial: u8) -> RecipientCertificate {
    RecipientCertificate::new(address, vec![enc_cert(address, serial)]).unwrap()
}

pub fn config() -> Arc<GatewayConfig> {
    Arc::new(GatewayConfig::default())
}

pub fn origin_mail() -> Vec<u8> {
    format!(
        "Date: Fri, 15 Mar 2024 08:30:00 +0000\r\n\
         From: Praxis Dr. Test <{SENDER}>\r\n\
         To: {RECIPIENT_A}, Labor <{RECIPIENT_B}>\r\n\
         Subject: Befund\r\n\
         Message-ID: <befund-1@kim.telematik>\r\n\
         X-KIM-Dienstkennung: Arztbrief;eArztbrief;V1.2\r\n\
         MIME-Version: 1.0\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         Anbei der Befund.\r\n"
    )
    .into_bytes()
}
