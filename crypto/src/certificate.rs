use cms::cert::IssuerAndSerialNumber;
use der::Decode;
use serde::Serialize;
use std::fmt;
use tracing::debug;
use x509_cert::serial_number::SerialNumber;
use x509_cert::Certificate;

use crate::error::{CryptoError, CryptoResult};
use crate::oids::ID_EC_PUBLIC_KEY;

/// Issuer distinguished name plus serial number of a certificate.
///
/// The issuer is rendered as an RFC 4514 string and the serial as uppercase hex
/// without leading zero bytes, so values computed from a certificate and from a
/// CMS `IssuerAndSerialNumber` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IssuerSerial {
    pub issuer: String,
    pub serial: String,
}

impl IssuerSerial {
    pub fn from_certificate(cert: &Certificate) -> Self {
        Self {
            issuer: cert.tbs_certificate.issuer.to_string(),
            serial: serial_hex(&cert.tbs_certificate.serial_number),
        }
    }

    pub fn from_certificate_der(der: &[u8]) -> CryptoResult<Self> {
        Ok(Self::from_certificate(&parse_certificate(der)?))
    }

    pub fn from_issuer_and_serial(value: &IssuerAndSerialNumber) -> Self {
        Self {
            issuer: value.issuer.to_string(),
            serial: serial_hex(&value.serial_number),
        }
    }
}

impl fmt::Display for IssuerSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.issuer, self.serial)
    }
}

fn serial_hex(serial: &SerialNumber) -> String {
    let bytes = serial.as_bytes();
    let first_significant = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len().saturating_sub(1));
    hex::encode_upper(bytes.get(first_significant..).unwrap_or(bytes))
}

pub fn parse_certificate(der: &[u8]) -> CryptoResult<Certificate> {
    Certificate::from_der(der).map_err(|e| {
        debug!(error = %e, len = der.len(), "Certificate does not parse");
        CryptoError::InvalidCertificate(e.to_string())
    })
}

pub fn issuer_and_serial(cert: &Certificate) -> IssuerAndSerialNumber {
    IssuerAndSerialNumber {
        issuer: cert.tbs_certificate.issuer.clone(),
        serial_number: cert.tbs_certificate.serial_number.clone(),
    }
}

/// `true` when the subject public key is an elliptic curve key.
pub fn is_ecc(cert: &Certificate) -> bool {
    cert.tbs_certificate.subject_public_key_info.algorithm.oid == ID_EC_PUBLIC_KEY
}

/// Which of a recipient's encryption certificates go into an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CertificateForm {
    /// Every certificate, used when the token device can encrypt for ECC keys.
    Ecc,
    /// RSA certificates only.
    Rsa,
}

impl CertificateForm {
    pub fn for_device(ecc_available: bool) -> Self {
        if ecc_available {
            CertificateForm::Ecc
        } else {
            CertificateForm::Rsa
        }
    }
}

/// Encryption certificates resolved for one mail address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientCertificate {
    mail_address: String,
    certificates: Vec<Vec<u8>>,
    rsa_certificates: Vec<Vec<u8>>,
}

impl RecipientCertificate {
    /// Classifies the certificates; the address is stored lowercased.
    pub fn new(mail_address: &str, certificates: Vec<Vec<u8>>) -> CryptoResult<Self> {
        let mut rsa_certificates = Vec::new();
        for der in &certificates {
            if !is_ecc(&parse_certificate(der)?) {
                rsa_certificates.push(der.clone());
            }
        }
        Ok(Self {
            mail_address: mail_address.trim().to_lowercase(),
            certificates,
            rsa_certificates,
        })
    }

    pub fn mail_address(&self) -> &str {
        &self.mail_address
    }

    pub fn certificates(&self) -> &[Vec<u8>] {
        &self.certificates
    }

    pub fn rsa_certificates(&self) -> &[Vec<u8>] {
        &self.rsa_certificates
    }

    pub fn certificates_for(&self, form: CertificateForm) -> &[Vec<u8>] {
        match form {
            CertificateForm::Ecc => &self.certificates,
            CertificateForm::Rsa => &self.rsa_certificates,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }
}

/// Human readable certificate facts for operator output.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateSummary {
    pub subject: String,
    pub issuer_serial: IssuerSerial,
    pub ecc: bool,
    pub not_after: String,
}

impl CertificateSummary {
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let cert = parse_certificate(der)?;
        Ok(Self {
            subject: cert.tbs_certificate.subject.to_string(),
            issuer_serial: IssuerSerial::from_certificate(&cert),
            ecc: is_ecc(&cert),
            not_after: cert.tbs_certificate.validity.not_after.to_date_time().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_issuer_serial_matches_between_cert_and_cms() {
        let der = fixtures::certificate("arzt@praxis.kim.telematik", &[0x00, 0xA1, 0x0F], false).unwrap();
        let cert = parse_certificate(&der).unwrap();

        let from_cert = IssuerSerial::from_certificate(&cert);
        let from_cms = IssuerSerial::from_issuer_and_serial(&issuer_and_serial(&cert));
        assert_eq!(from_cert, from_cms);
        assert_eq!(from_cert.serial, "A10F");
        assert!(from_cert.issuer.contains("CN=KIM Test CA"));
    }

    #[test]
    fn test_rsa_subset_excludes_ecc() {
        let rsa = fixtures::certificate("a@b.kim.telematik", &[1], false).unwrap();
        let ecc = fixtures::certificate("a@b.kim.telematik", &[2], true).unwrap();
        let recipient = RecipientCertificate::new("A@B.kim.telematik", vec![rsa.clone(), ecc]).unwrap();

        assert_eq!(recipient.mail_address(), "a@b.kim.telematik");
        assert_eq!(recipient.certificates_for(CertificateForm::Ecc).len(), 2);
        assert_eq!(recipient.certificates_for(CertificateForm::Rsa), &[rsa]);
    }

    #[test]
    fn test_invalid_certificate() {
        assert!(matches!(
            RecipientCertificate::new("a@b.de", vec![vec![0x30, 0x01]]),
            Err(CryptoError::InvalidCertificate(_))
        ));
    }

    #[test]
    fn test_summary() {
        let der = fixtures::certificate("a@b.kim.telematik", &[7], true).unwrap();
        let summary = CertificateSummary::from_der(&der).unwrap();
        assert!(summary.ecc);
        assert_eq!(summary.issuer_serial.serial, "07");
        assert!(summary.subject.contains("a@b.kim.telematik"));
    }
}
