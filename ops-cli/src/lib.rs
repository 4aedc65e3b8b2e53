//! Operator commands of `kimctl`
//!
//! Offline helpers for gateway operators: checking whether a stored mail is
//! a well-formed KIM envelope, inspecting its recipients, looking up KIM
//! error codes and printing the effective configuration. Nothing here talks
//! to the token device.

use anyhow::{Context, Result};
use config_engine::GatewayConfig;
use crypto::{CertificateSummary, CmsEnvelope, IssuerSerial};
use error_common::codes::ALL;
use error_common::ErrorCode;
use mail_pipeline::constants::X_KOM_LE_VERSION;
use mail_pipeline::{validate, MailMessage, MailTransaction, ValidationMode};
use serde::Serialize;

/// Result of `kimctl check-format`.
#[derive(Debug, Clone, Serialize)]
pub struct FormatReport {
    pub valid: bool,
    pub version: Option<String>,
    pub recipients: usize,
    pub codes: Vec<ErrorCode>,
}

/// Runs the envelope validator against a stored mail.
pub fn check_format(bytes: &[u8]) -> Result<FormatReport> {
    let message = MailMessage::parse(bytes).context("mail is not parseable")?;
    let mut tx = MailTransaction::new("kimctl@localhost");
    let outcome = validate(&mut tx, &message, ValidationMode::Decrypt);
    Ok(FormatReport {
        valid: outcome.valid,
        version: message.headers.get(X_KOM_LE_VERSION),
        recipients: outcome.envelope.map_or(0, |envelope| envelope.recipient_count()),
        codes: tx.errors.encrypt_format.codes().to_vec(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipientEntry {
    pub email: String,
    pub issuer_serial: Option<IssuerSerial>,
}

/// Result of `kimctl inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeReport {
    pub recipient_infos: Vec<IssuerSerial>,
    pub recipient_emails: Vec<RecipientEntry>,
    /// Targets of the requested mailbox, when one was given.
    pub targets: Option<Vec<IssuerSerial>>,
}

/// Lists the recipients of a KIM mail's envelope.
pub fn inspect(bytes: &[u8], user: Option<&str>) -> Result<EnvelopeReport> {
    let message = MailMessage::parse(bytes).context("mail is not parseable")?;
    let der = message.decoded_body().context("envelope body is not decodable")?;
    let envelope = CmsEnvelope::from_der(&der).context("body is not a CMS envelope")?;

    let recipient_emails = envelope
        .recipient_emails()
        .context("recipient-emails attribute unusable")?
        .into_iter()
        .map(|entry| RecipientEntry {
            email: entry.email,
            issuer_serial: entry.issuer_serial,
        })
        .collect();
    let targets = user.map(|address| envelope.targets_for(address)).transpose()?;

    Ok(EnvelopeReport {
        recipient_infos: envelope.recipient_issuer_serials(),
        recipient_emails,
        targets,
    })
}

/// Facts of a DER encoded certificate.
pub fn inspect_certificate(der: &[u8]) -> Result<CertificateSummary> {
    CertificateSummary::from_der(der).context("not a DER certificate")
}

/// Catalogue entries, all or those whose id starts with `prefix`.
pub fn codes(prefix: Option<&str>) -> Vec<ErrorCode> {
    ALL.iter()
        .copied()
        .filter(|code| prefix.map_or(true, |prefix| code.id().starts_with(prefix)))
        .collect()
}

pub fn render_config(config: &GatewayConfig) -> Result<String> {
    serde_yaml::to_string(config).context("serializing configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crypto::fixtures;
    use crypto::recipient_emails::encode_attribute;
    use crypto::{CertificateForm, RecipientCertificate};
    use mail_pipeline::constants::{KOM_LE_SUBJECT, SMIME_DISPOSITION, SMIME_ENVELOPED_CONTENT_TYPE};
    use mail_pipeline::Headers;

    fn kim_mail() -> Vec<u8> {
        let cert = fixtures::certificate("apotheke@kim.telematik", &[5], false).unwrap();
        let recipient = RecipientCertificate::new("apotheke@kim.telematik", vec![cert.clone()]).unwrap();
        let attribute = encode_attribute(&[&recipient], CertificateForm::Rsa).unwrap();
        let der = fixtures::auth_enveloped_data(&[cert], Some(&attribute), b"payload").unwrap();

        let mut headers = Headers::new();
        headers.add(X_KOM_LE_VERSION, "1.5");
        headers.add("Subject", KOM_LE_SUBJECT);
        headers.add("Content-Disposition", SMIME_DISPOSITION);
        let mut message = MailMessage::single(headers, Vec::new());
        message.set_binary(SMIME_ENVELOPED_CONTENT_TYPE, &der).unwrap();
        message.to_bytes()
    }

    #[test]
    fn test_check_format() {
        let report = check_format(&kim_mail()).unwrap();
        assert!(report.valid);
        assert_eq!(report.version.as_deref(), Some("1.5"));
        assert_eq!(report.recipients, 1);
        assert!(report.codes.is_empty());

        let report = check_format(b"Subject: hallo\r\n\r\ntext").unwrap();
        assert!(!report.valid);
        let ids: Vec<&str> = report.codes.iter().map(ErrorCode::id).collect();
        assert_eq!(ids, vec!["X014", "4008"]);
    }

    #[test]
    fn test_inspect_targets() {
        let report = inspect(&kim_mail(), Some("Apotheke@kim.telematik")).unwrap();
        assert_eq!(report.recipient_infos.len(), 1);
        assert_eq!(report.recipient_emails[0].email, "apotheke@kim.telematik");
        assert_eq!(report.targets.unwrap(), report.recipient_infos);
    }

    #[test]
    fn test_code_filter() {
        assert_eq!(codes(None).len(), ALL.len());
        assert!(codes(Some("X0")).iter().all(|code| code.id().starts_with("X0")));
        assert!(codes(Some("9")).is_empty());
    }

    #[test]
    fn test_render_config() {
        let yaml = render_config(&GatewayConfig::default()).unwrap();
        assert!(yaml.lines().any(|line| line.starts_with("komle_version:") && line.contains("1.5+")));
        assert!(yaml.contains("retention_days: 90"));
    }
}
