use config_engine::KomLeVersion;
use crypto::{CmsEnvelope, CryptoError};
use error_common::codes::{CODE_4008, CODE_X014, CODE_X015, CODE_X016, CODE_X017, CODE_X018, CODE_X019, CODE_X020};
use error_common::{ErrorCode, ErrorContextKind};
use tracing::debug;

use crate::constants::{KOM_LE_SUBJECT, SMIME_MEDIA_TYPE, X_KOM_LE_VERSION};
use crate::message::MailMessage;
use crate::transaction::MailTransaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Checking a mail the client already encrypted
    Compose,
    /// Checking an incoming mail before decryption
    Decrypt,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub valid: bool,
    /// Parsed envelope, Decrypt mode only
    pub envelope: Option<CmsEnvelope>,
    /// Decoded CMS bytes, Decrypt mode only
    pub encrypted_bytes: Option<Vec<u8>>,
}

const STAGE: &str = "check encrypted mail format";

/// Checks that `message` is a well-formed KIM envelope.
///
/// Failures are recorded in the EncryptFormat context and reported through
/// `valid`; nothing is propagated.
pub fn validate(tx: &mut MailTransaction, message: &MailMessage, mode: ValidationMode) -> ValidationOutcome {
    tx.log.enter(STAGE);
    let outcome = match check(message) {
        Ok((envelope, encrypted_bytes)) => {
            tx.log.info("encrypted mail format is valid");
            match mode {
                ValidationMode::Compose => ValidationOutcome {
                    valid: true,
                    ..ValidationOutcome::default()
                },
                ValidationMode::Decrypt => ValidationOutcome {
                    valid: true,
                    envelope: Some(envelope),
                    encrypted_bytes: Some(encrypted_bytes),
                },
            }
        }
        Err(codes) => {
            tx.record_all(ErrorContextKind::EncryptFormat, &codes);
            ValidationOutcome::default()
        }
    };
    tx.log.leave(STAGE);
    outcome
}

fn check(message: &MailMessage) -> Result<(CmsEnvelope, Vec<u8>), Vec<ErrorCode>> {
    let versions = message.headers.get_all(X_KOM_LE_VERSION);
    let version_ok = matches!(versions.as_slice(), [value] if value.parse::<KomLeVersion>().is_ok());
    if !version_ok {
        debug!(values = ?versions, "Invalid KOM-LE version header");
        return Err(vec![CODE_X014, CODE_4008]);
    }

    if message.headers.get("Subject").as_deref() != Some(KOM_LE_SUBJECT) {
        return Err(vec![CODE_X015]);
    }

    let is_smime = message.content_type().essence().starts_with(SMIME_MEDIA_TYPE);
    let is_attachment = message.disposition().is_some_and(|d| d.is_attachment());
    if !is_smime || message.is_multipart() || !is_attachment {
        return Err(vec![CODE_X016]);
    }

    let encrypted = message.decoded_body().map_err(|e| {
        debug!(error = %e, "Undecodable envelope body");
        vec![CODE_X020]
    })?;
    if encrypted.is_empty() {
        return Err(vec![CODE_X016]);
    }

    let envelope = CmsEnvelope::from_der(&encrypted).map_err(|e| match e {
        CryptoError::UnexpectedContentType { found, .. } => {
            debug!(content_type = %found, "Envelope is not authenticated-enveloped-data");
            vec![CODE_X017]
        }
        other => {
            debug!(error = %other, "Unparseable envelope");
            vec![CODE_X020]
        }
    })?;

    if envelope.recipient_count() == 0 {
        return Err(vec![CODE_X018]);
    }

    match envelope.recipient_emails() {
        Ok(entries) if !entries.is_empty() => Ok((envelope, encrypted)),
        Ok(_) => Err(vec![CODE_X019]),
        Err(e) => {
            debug!(error = %e, "Recipient-emails attribute unusable");
            Err(vec![CODE_X019])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SMIME_DISPOSITION, SMIME_ENVELOPED_CONTENT_TYPE};
    use crate::message::Headers;
    use crypto::fixtures;
    use crypto::oids::ID_ENVELOPED_DATA;
    use crypto::recipient_emails::encode_attribute;
    use crypto::{CertificateForm, RecipientCertificate};

    fn envelope_der(with_emails: bool) -> Vec<u8> {
        let cert = fixtures::certificate("praxis@kim.telematik", &[1], false).unwrap();
        let recipient = RecipientCertificate::new("praxis@kim.telematik", vec![cert.clone()]).unwrap();
        let attribute = encode_attribute(&[&recipient], CertificateForm::Rsa).unwrap();
        let emails = with_emails.then_some(attribute.as_slice());
        fixtures::auth_enveloped_data(&[cert], emails, b"payload").unwrap()
    }

    fn kim_mail(version: Option<&str>, subject: &str, body: &[u8]) -> MailMessage {
        let mut headers = Headers::new();
        if let Some(version) = version {
            headers.add(X_KOM_LE_VERSION, version);
        }
        headers.add("Subject", subject);
        headers.add("Content-Type", SMIME_ENVELOPED_CONTENT_TYPE);
        headers.add("Content-Disposition", SMIME_DISPOSITION);
        let mut message = MailMessage::single(headers, Vec::new());
        if !body.is_empty() {
            message.set_binary(SMIME_ENVELOPED_CONTENT_TYPE, body).unwrap();
        }
        message
    }

    fn run(message: &MailMessage, mode: ValidationMode) -> (ValidationOutcome, MailTransaction) {
        let mut tx = MailTransaction::new("praxis@kim.telematik");
        let outcome = validate(&mut tx, message, mode);
        (outcome, tx)
    }

    #[test]
    fn test_valid_envelope_in_decrypt_mode() {
        let der = envelope_der(true);
        let (outcome, tx) = run(&kim_mail(Some("1.5"), KOM_LE_SUBJECT, &der), ValidationMode::Decrypt);
        assert!(outcome.valid);
        assert_eq!(outcome.encrypted_bytes.as_deref(), Some(der.as_slice()));
        assert_eq!(outcome.envelope.unwrap().recipient_count(), 1);
        assert!(tx.errors.is_empty());
    }

    #[test]
    fn test_compose_mode_returns_no_envelope() {
        let (outcome, _) = run(&kim_mail(Some("1.5+"), KOM_LE_SUBJECT, &envelope_der(true)), ValidationMode::Compose);
        assert!(outcome.valid);
        assert!(outcome.envelope.is_none());
        assert!(outcome.encrypted_bytes.is_none());
    }

    #[test]
    fn test_version_header_checks() {
        let der = envelope_der(true);
        for version in [None, Some("2.0")] {
            let (outcome, tx) = run(&kim_mail(version, KOM_LE_SUBJECT, &der), ValidationMode::Decrypt);
            assert!(!outcome.valid);
            assert!(tx.errors.encrypt_format.contains(CODE_X014));
            assert!(tx.errors.encrypt_format.contains(CODE_4008));
        }

        let mut twice = kim_mail(Some("1.5"), KOM_LE_SUBJECT, &der);
        twice.headers.add(X_KOM_LE_VERSION, "1.5");
        assert!(!run(&twice, ValidationMode::Decrypt).0.valid);
    }

    #[test]
    fn test_subject_and_content_type() {
        let der = envelope_der(true);
        let (_, tx) = run(&kim_mail(Some("1.5"), "Befund", &der), ValidationMode::Decrypt);
        assert_eq!(tx.errors.encrypt_format.codes(), &[CODE_X015]);

        let mut inline = kim_mail(Some("1.5"), KOM_LE_SUBJECT, &der);
        inline.headers.set("Content-Disposition", "inline");
        let (_, tx) = run(&inline, ValidationMode::Decrypt);
        assert_eq!(tx.errors.encrypt_format.codes(), &[CODE_X016]);

        let (_, tx) = run(&kim_mail(Some("1.5"), KOM_LE_SUBJECT, b""), ValidationMode::Decrypt);
        assert_eq!(tx.errors.encrypt_format.codes(), &[CODE_X016]);
    }

    #[test]
    fn test_wrong_cms_type_and_garbage() {
        let enveloped = fixtures::content_info(ID_ENVELOPED_DATA, b"x").unwrap();
        let (_, tx) = run(&kim_mail(Some("1.5"), KOM_LE_SUBJECT, &enveloped), ValidationMode::Decrypt);
        assert_eq!(tx.errors.encrypt_format.codes(), &[CODE_X017]);

        let (_, tx) = run(&kim_mail(Some("1.5"), KOM_LE_SUBJECT, b"garbage"), ValidationMode::Decrypt);
        assert_eq!(tx.errors.encrypt_format.codes(), &[CODE_X020]);
    }

    #[test]
    fn test_missing_recipient_emails() {
        let (outcome, tx) = run(&kim_mail(Some("1.5"), KOM_LE_SUBJECT, &envelope_der(false)), ValidationMode::Decrypt);
        assert!(!outcome.valid);
        assert_eq!(tx.errors.encrypt_format.codes(), &[CODE_X019]);
    }
}
