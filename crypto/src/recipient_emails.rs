//! The recipient-emails attribute binds each recipient mail address to the
//! certificate its content-encryption key was wrapped for.
//!
//! ```text
//! RecipientEmail ::= SEQUENCE {
//!     email  IA5String,
//!     rid    RecipientIdentifier }
//! ```
//!
//! The attribute (OID 1.2.276.0.76.4.173) carries one `RecipientEmail` value
//! per recipient certificate and travels in the unauthenticated attributes of
//! the envelope and in the signed attributes of the inner signature.

use cms::enveloped_data::RecipientIdentifier;
use der::asn1::{Any, Ia5String, SetOfVec};
use der::{Decode, Encode, Sequence};
use tracing::warn;
use x509_cert::attr::Attribute;

use crate::certificate::{issuer_and_serial, parse_certificate, CertificateForm, IssuerSerial, RecipientCertificate};
use crate::error::{CryptoError, CryptoResult};
use crate::oids::ID_RECIPIENT_EMAILS;

#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct RecipientEmail {
    pub email: Ia5String,
    pub rid: RecipientIdentifier,
}

/// Decoded attribute entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientEmailEntry {
    pub email: String,
    /// `None` when the entry identifies the key by subject key identifier.
    pub issuer_serial: Option<IssuerSerial>,
}

/// Builds the attribute for the given recipients, one entry per certificate
/// of the chosen form.
pub fn build_attribute(recipients: &[&RecipientCertificate], form: CertificateForm) -> CryptoResult<Attribute> {
    let mut values = Vec::new();
    for recipient in recipients {
        for der in recipient.certificates_for(form) {
            let cert = parse_certificate(der)?;
            let entry = RecipientEmail {
                email: Ia5String::new(recipient.mail_address())?,
                rid: RecipientIdentifier::IssuerAndSerialNumber(issuer_and_serial(&cert)),
            };
            values.push(Any::encode_from(&entry)?);
        }
    }
    Ok(Attribute {
        oid: ID_RECIPIENT_EMAILS,
        values: SetOfVec::try_from(values)?,
    })
}

/// DER encoding of [`build_attribute`], as handed to the token device.
pub fn encode_attribute(recipients: &[&RecipientCertificate], form: CertificateForm) -> CryptoResult<Vec<u8>> {
    Ok(build_attribute(recipients, form)?.to_der()?)
}

/// Decodes every value of a recipient-emails attribute.
pub fn parse_attribute(attribute: &Attribute) -> CryptoResult<Vec<RecipientEmailEntry>> {
    if attribute.oid != ID_RECIPIENT_EMAILS {
        return Err(CryptoError::UnexpectedContentType {
            expected: ID_RECIPIENT_EMAILS,
            found: attribute.oid,
        });
    }
    attribute
        .values
        .iter()
        .map(|value| {
            let entry = RecipientEmail::from_der(&value.to_der()?).map_err(|e| {
                warn!(error = %e, "Undecodable recipient-emails entry");
                e
            })?;
            let issuer_serial = match &entry.rid {
                RecipientIdentifier::IssuerAndSerialNumber(ias) => Some(IssuerSerial::from_issuer_and_serial(ias)),
                RecipientIdentifier::SubjectKeyIdentifier(_) => None,
            };
            Ok(RecipientEmailEntry {
                email: entry.email.to_string(),
                issuer_serial,
            })
        })
        .collect()
}

pub fn parse_attribute_der(der: &[u8]) -> CryptoResult<Vec<RecipientEmailEntry>> {
    parse_attribute(&Attribute::from_der(der)?)
}

/// Issuer/serial targets registered for a mail address (case-insensitive).
pub fn targets_for(entries: &[RecipientEmailEntry], address: &str) -> Vec<IssuerSerial> {
    let wanted = address.trim().to_lowercase();
    entries
        .iter()
        .filter(|entry| entry.email.to_lowercase() == wanted)
        .filter_map(|entry| entry.issuer_serial.clone())
        .collect()
}
