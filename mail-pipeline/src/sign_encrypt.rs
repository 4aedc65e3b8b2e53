use std::sync::Arc;

use chrono::{Duration, Utc};
use config_engine::GatewayConfig;
use crypto::recipient_emails::encode_attribute;
use crypto::{CertificateForm, RecipientCertificate};
use device_manager::{CardHandle, TokenDevice};
use error_common::codes::{CODE_X009, CODE_X010, CODE_X011, CODE_X013};
use error_common::{log_error, ErrorCode, ErrorContextKind, GatewayError};
use logger_redacted::redacted_info;
use mail_builder::mime::MimePart;
use tracing::{debug, info};

use crate::address::RECIPIENT_HEADERS;
use crate::constants::{
    KOM_LE_SUBJECT, MESSAGE_RFC822_PREAMBLE, SMIME_DISPOSITION, SMIME_ENVELOPED_CONTENT_TYPE, SMIME_FILENAME,
    SMIME_SIGNED_CONTENT_TYPE, X_KIM_CM_VERSION, X_KIM_DIENSTKENNUNG, X_KIM_KON_VERSION, X_KIM_PREFIX,
    X_KIM_PT_VERSION, X_KOM_LE_VERSION,
};
use crate::error::{PipelineError, PipelineResult};
use crate::message::{format_date, Headers, MailMessage, TransferEncoding};
use crate::selector::select_signing_card;
use crate::sending_check::check_sending_mail;
use crate::transaction::MailTransaction;
use crate::validator::{validate, ValidationMode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignEncryptOutcome {
    /// The client already sent a KIM envelope; these are its bytes, untouched.
    AlreadyEncrypted(Vec<u8>),
    /// Freshly signed, encrypted and composed mail.
    Composed(Vec<u8>),
}

impl SignEncryptOutcome {
    pub fn bytes(&self) -> &[u8] {
        match self {
            SignEncryptOutcome::AlreadyEncrypted(bytes) | SignEncryptOutcome::Composed(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            SignEncryptOutcome::AlreadyEncrypted(bytes) | SignEncryptOutcome::Composed(bytes) => bytes,
        }
    }
}

const STAGE: &str = "sign encrypt mail";

/// Turns an outgoing plain mail into a signed and encrypted KIM mail.
pub struct SignEncryptComposer {
    device: Arc<dyn TokenDevice>,
    config: Arc<GatewayConfig>,
}

impl SignEncryptComposer {
    pub fn new(device: Arc<dyn TokenDevice>, config: Arc<GatewayConfig>) -> Self {
        Self { device, config }
    }

    /// Signs `origin` with the institution card, encrypts it for every
    /// recipient and sender certificate and composes the outgoing mail.
    ///
    /// # Errors
    ///
    /// Each failing stage records its code in the SignEncrypt context and
    /// returns the matching [`GatewayError`]; later stages are not run.
    pub async fn compose(
        &self,
        tx: &mut MailTransaction,
        origin: &[u8],
        recipient_certs: &[RecipientCertificate],
        sender_certs: &[RecipientCertificate],
    ) -> PipelineResult<SignEncryptOutcome> {
        tx.log.enter(STAGE);
        let result = self.run(tx, origin, recipient_certs, sender_certs).await;
        if let Err(PipelineError::Gateway(error)) = &result {
            log_error(STAGE, error);
        }
        tx.log.leave(STAGE);
        result
    }

    async fn run(
        &self,
        tx: &mut MailTransaction,
        origin: &[u8],
        recipient_certs: &[RecipientCertificate],
        sender_certs: &[RecipientCertificate],
    ) -> PipelineResult<SignEncryptOutcome> {
        let mut origin_message = MailMessage::parse(origin)
            .map_err(|e| fail(tx, &[CODE_X013], GatewayError::Format(format!("origin mail unparseable: {e}"))))?;
        check_sending_mail(tx, &mut origin_message, recipient_certs)?;

        if let Some(embedded) = already_encrypted(tx, &origin_message) {
            info!(transaction = tx.id(), "Mail is already encrypted by the client");
            return Ok(SignEncryptOutcome::AlreadyEncrypted(embedded));
        }

        // recipients with a recorded address error get no copy; a sender is
        // only added when no recipient shares the address
        let mut recipients: Vec<&RecipientCertificate> = recipient_certs
            .iter()
            .filter(|r| !tx.errors.is_address_ineligible(r.mail_address()))
            .collect();
        for sender in sender_certs {
            if !recipients.iter().any(|r| r.mail_address() == sender.mail_address()) {
                recipients.push(sender);
            }
        }

        let form = CertificateForm::for_device(self.device.ecc_encryption_available());
        debug!(form = ?form, recipients = recipients.len(), "Encrypting for recipients");
        let attribute = encode_attribute(&recipients, form).map_err(|e| {
            fail(tx, &[CODE_X009], GatewayError::Format(format!("recipient-emails attribute: {e}")))
        })?;

        let card = self.signing_card(tx).await?;
        let signature = self.sign(tx, &card, &origin_message.to_bytes(), &attribute).await?;
        let signed_part = signed_part(signature).to_bytes();
        let encrypted = self.encrypt(tx, &recipients, form, &signed_part, &attribute).await?;
        let composed = self.compose_mail(tx, &origin_message, &encrypted)?;
        Ok(SignEncryptOutcome::Composed(composed.to_bytes()))
    }

    async fn signing_card(&self, tx: &mut MailTransaction) -> PipelineResult<CardHandle> {
        let cards = self
            .device
            .list_cards()
            .await
            .map_err(|e| fail(tx, &[CODE_X010], GatewayError::DeviceCall(format!("listing cards: {e}"))))?;
        select_signing_card(&cards).map_err(|e| fail(tx, &[CODE_X010], GatewayError::CardNotFound(e.to_string())))
    }

    async fn sign(
        &self,
        tx: &mut MailTransaction,
        card: &CardHandle,
        origin: &[u8],
        attribute: &[u8],
    ) -> PipelineResult<Vec<u8>> {
        tx.log.info(&format!("signing with card {card}"));
        let mut document = MESSAGE_RFC822_PREAMBLE.as_bytes().to_vec();
        document.extend_from_slice(origin);

        let response = self
            .device
            .sign(card, &document, attribute)
            .await
            .map_err(|e| fail(tx, &[CODE_X009], GatewayError::DeviceCall(format!("sign: {e}"))))?;
        if !response.status.is_ok() {
            return Err(fail(
                tx,
                &[CODE_X009],
                GatewayError::DeviceCall(format!("sign response for card {card}: {}", response.status)),
            ));
        }
        match response.signature {
            Some(signature) if !signature.is_empty() => Ok(signature),
            _ => Err(fail(
                tx,
                &[CODE_X009],
                GatewayError::DeviceCall(format!("empty signature for card {card}")),
            )),
        }
    }

    async fn encrypt(
        &self,
        tx: &mut MailTransaction,
        recipients: &[&RecipientCertificate],
        form: CertificateForm,
        signed_part: &[u8],
        attribute: &[u8],
    ) -> PipelineResult<Vec<u8>> {
        let keys: Vec<Vec<u8>> = recipients
            .iter()
            .flat_map(|recipient| recipient.certificates_for(form).iter().cloned())
            .collect();
        if keys.is_empty() {
            return Err(fail(
                tx,
                &[CODE_X011],
                GatewayError::Format("no encryption certificate for any recipient".to_string()),
            ));
        }
        tx.log.info(&format!("encrypting for {} certificate(s)", keys.len()));

        let response = self
            .device
            .encrypt(&keys, signed_part, attribute)
            .await
            .map_err(|e| fail(tx, &[CODE_X011], GatewayError::DeviceCall(format!("encrypt: {e}"))))?;
        if !response.status.is_ok() {
            return Err(fail(
                tx,
                &[CODE_X011],
                GatewayError::DeviceCall(format!("encrypt response: {}", response.status)),
            ));
        }
        match response.document {
            Some(document) if !document.is_empty() => Ok(document),
            _ => Err(fail(
                tx,
                &[CODE_X011],
                GatewayError::DeviceCall("empty encrypt response document".to_string()),
            )),
        }
    }

    fn compose_mail(
        &self,
        tx: &mut MailTransaction,
        origin: &MailMessage,
        encrypted: &[u8],
    ) -> PipelineResult<MailMessage> {
        let mut headers = Headers::new();
        for name in ["Date", "From", "Sender", "Reply-To"] {
            for field in origin.headers.fields(name) {
                headers.add_field(field.clone());
            }
        }

        // recipient headers were filtered by the sending check
        for name in RECIPIENT_HEADERS {
            for field in origin.headers.fields(name) {
                headers.add_field(field.clone());
            }
        }

        let dienstkennung = origin
            .headers
            .get(X_KIM_DIENSTKENNUNG)
            .unwrap_or_else(|| self.config.dienstkennung.clone());
        headers.set(X_KIM_DIENSTKENNUNG, &dienstkennung);
        headers.set(X_KOM_LE_VERSION, self.config.komle_version.official());
        headers.set("Subject", KOM_LE_SUBJECT);
        if let Some(message_id) = origin.headers.fields("Message-ID").next() {
            headers.set_field(message_id.clone());
        }
        for field in origin
            .headers
            .iter()
            .filter(|field| field.name().to_ascii_lowercase().starts_with(X_KIM_PREFIX))
        {
            headers.set_field(field.clone());
        }

        let retention_days = tx.retention_days.unwrap_or(self.config.retention_days);
        let expires = Utc::now() + Duration::days(i64::from(retention_days));
        headers.set("Expires", &format_date(expires));
        headers.set(X_KIM_CM_VERSION, &self.config.cm_version);
        headers.set(X_KIM_PT_VERSION, &self.config.pt_version);
        headers.set(X_KIM_KON_VERSION, &self.device.product_info().kon_version_header());

        headers.set("MIME-Version", "1.0");

        let body = MailMessage::from_part(
            MimePart::new(SMIME_ENVELOPED_CONTENT_TYPE, encrypted.to_vec()).attachment(SMIME_FILENAME),
        )
        .map_err(|e| fail(tx, &[CODE_X011], GatewayError::Format(format!("composing encrypted mail: {e}"))))?;
        let mut composed = MailMessage::single(headers, Vec::new());
        composed.adopt(body);

        redacted_info!(transaction = tx.id(); "composed encrypted mail for {}", tx.user_address);
        Ok(composed)
    }
}

/// Records `codes` in the SignEncrypt context and wraps `error`.
fn fail(tx: &mut MailTransaction, codes: &[ErrorCode], error: GatewayError) -> PipelineError {
    tx.record_all(ErrorContextKind::SignEncrypt, codes);
    tx.log.error(&error.to_string());
    PipelineError::Gateway(error)
}

/// The signed part handed to the encryption step.
fn signed_part(signature: Vec<u8>) -> MailMessage {
    let mut headers = Headers::new();
    headers.set("Content-Type", SMIME_SIGNED_CONTENT_TYPE);
    headers.set("Content-Transfer-Encoding", TransferEncoding::Binary.as_str());
    headers.set("Content-Disposition", SMIME_DISPOSITION);
    MailMessage::single(headers, signature)
}

/// Bytes of an embedded KIM envelope when the client encrypted the mail
/// itself: a multipart/mixed with two parts, one of them message/rfc822,
/// which passes validation.
fn already_encrypted(tx: &mut MailTransaction, origin: &MailMessage) -> Option<Vec<u8>> {
    if !origin.is_mime_type("multipart/mixed") || origin.parts().len() != 2 {
        return None;
    }
    let part = origin.parts().iter().find(|part| part.is_mime_type("message/rfc822"))?;
    let bytes = part.decoded_body().ok()?;
    let embedded = match MailMessage::parse(&bytes) {
        Ok(embedded) => embedded,
        Err(e) => {
            tx.log.warn(&format!("embedded message unparseable: {e}"));
            return None;
        }
    };

    let outcome = validate(tx, &embedded, ValidationMode::Compose);
    if outcome.valid && tx.errors.encrypt_format.is_empty() {
        tx.log.info("body part is encrypted");
        Some(bytes)
    } else {
        tx.log.info("body part is not encrypted");
        None
    }
}
