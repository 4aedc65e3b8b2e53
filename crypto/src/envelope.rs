use cms::content_info::{CmsVersion, ContentInfo};
use cms::enveloped_data::{EncryptedContentInfo, OriginatorInfo, RecipientIdentifier, RecipientInfo, RecipientInfos};
use der::asn1::OctetString;
use der::{Decode, Encode, Sequence};
use tracing::debug;
use x509_cert::attr::{Attribute, Attributes};

use crate::certificate::IssuerSerial;
use crate::error::{CryptoError, CryptoResult};
use crate::oids::{ID_CT_AUTH_ENVELOPED_DATA, ID_RECIPIENT_EMAILS};
use crate::recipient_emails::{self, RecipientEmailEntry};

/// The `AuthEnvelopedData` type is defined in [RFC 5083 Section 2.1].
///
/// ```text
///   AuthEnvelopedData ::= SEQUENCE {
///       version CMSVersion,
///       originatorInfo [0] IMPLICIT OriginatorInfo OPTIONAL,
///       recipientInfos RecipientInfos,
///       authEncryptedContentInfo EncryptedContentInfo,
///       authAttrs [1] IMPLICIT AuthAttributes OPTIONAL,
///       mac MessageAuthenticationCode,
///       unauthAttrs [2] IMPLICIT UnauthAttributes OPTIONAL }
/// ```
///
/// [RFC 5083 Section 2.1]: https://www.rfc-editor.org/rfc/rfc5083#section-2.1
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct AuthEnvelopedData {
    pub version: CmsVersion,
    #[asn1(
        context_specific = "0",
        tag_mode = "IMPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub originator_info: Option<OriginatorInfo>,
    pub recip_infos: RecipientInfos,
    pub auth_encrypted_content: EncryptedContentInfo,
    #[asn1(
        context_specific = "1",
        tag_mode = "IMPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub auth_attrs: Option<Attributes>,
    pub mac: OctetString,
    #[asn1(
        context_specific = "2",
        tag_mode = "IMPLICIT",
        constructed = "true",
        optional = "true"
    )]
    pub unauth_attrs: Option<Attributes>,
}

/// A KIM mail envelope: ContentInfo wrapping AuthEnvelopedData.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CmsEnvelope {
    pub data: AuthEnvelopedData,
}

impl CmsEnvelope {
    /// Parses a DER ContentInfo.
    ///
    /// Any content type other than authenticated-enveloped-data is rejected
    /// with [`CryptoError::UnexpectedContentType`].
    pub fn from_der(bytes: &[u8]) -> CryptoResult<Self> {
        let content_info = ContentInfo::from_der(bytes).map_err(|e| {
            debug!(error = %e, len = bytes.len(), "Envelope is not a DER ContentInfo");
            e
        })?;
        if content_info.content_type != ID_CT_AUTH_ENVELOPED_DATA {
            debug!(content_type = %content_info.content_type, "Rejecting envelope content type");
            return Err(CryptoError::UnexpectedContentType {
                expected: ID_CT_AUTH_ENVELOPED_DATA,
                found: content_info.content_type,
            });
        }
        let data = AuthEnvelopedData::from_der(&content_info.content.to_der()?).map_err(|e| {
            debug!(error = %e, "Malformed AuthEnvelopedData");
            e
        })?;
        debug!(recipients = data.recip_infos.0.len(), "Parsed envelope");
        Ok(Self { data })
    }

    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        let content_info = ContentInfo {
            content_type: ID_CT_AUTH_ENVELOPED_DATA,
            content: der::Any::encode_from(&self.data)?,
        };
        Ok(content_info.to_der()?)
    }

    pub fn recipient_count(&self) -> usize {
        self.data.recip_infos.0.len()
    }

    /// Issuer/serial of every key transport recipient.
    pub fn recipient_issuer_serials(&self) -> Vec<IssuerSerial> {
        self.data
            .recip_infos
            .0
            .iter()
            .filter_map(|info| match info {
                RecipientInfo::Ktri(ktri) => match &ktri.rid {
                    RecipientIdentifier::IssuerAndSerialNumber(ias) => Some(IssuerSerial::from_issuer_and_serial(ias)),
                    RecipientIdentifier::SubjectKeyIdentifier(_) => None,
                },
                _ => None,
            })
            .collect()
    }

    pub fn recipient_emails_attribute(&self) -> Option<&Attribute> {
        self.data
            .unauth_attrs
            .as_ref()
            .and_then(|attrs| attrs.iter().find(|attr| attr.oid == ID_RECIPIENT_EMAILS))
    }

    /// Decoded recipient-emails entries.
    pub fn recipient_emails(&self) -> CryptoResult<Vec<RecipientEmailEntry>> {
        let attribute = self
            .recipient_emails_attribute()
            .ok_or_else(|| CryptoError::MissingContent("recipient-emails attribute".to_string()))?;
        recipient_emails::parse_attribute(attribute)
    }

    /// Issuer/serial targets the envelope registers for a mail address.
    pub fn targets_for(&self, address: &str) -> CryptoResult<Vec<IssuerSerial>> {
        Ok(recipient_emails::targets_for(&self.recipient_emails()?, address))
    }

    pub fn encrypted_content(&self) -> Option<&[u8]> {
        self.data
            .auth_encrypted_content
            .encrypted_content
            .as_ref()
            .map(OctetString::as_bytes)
    }
}
