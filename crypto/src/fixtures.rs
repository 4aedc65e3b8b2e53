//! Test builders for certificates and CMS structures.
//!
//! Envelopes built here are structurally valid but not encrypted: the payload
//! is stored as-is in the encrypted content field and MACs and wrapped keys are
//! constant filler bytes.

use cms::content_info::{CmsVersion, ContentInfo};
use cms::enveloped_data::{
    EncryptedContentInfo, KeyTransRecipientInfo, RecipientIdentifier, RecipientInfo, RecipientInfos,
};
use cms::signed_data::EncapsulatedContentInfo;
use der::asn1::{Any, BitString, Null, OctetString, SetOfVec, UtcTime};
use der::{Decode, Encode, Sequence};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::str::FromStr;
use std::time::Duration;
use x509_cert::attr::Attribute;
use x509_cert::certificate::{Certificate, TbsCertificate, Version};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};

use crate::certificate::{issuer_and_serial, parse_certificate};
use crate::envelope::{AuthEnvelopedData, CmsEnvelope};
use crate::error::CryptoResult;
use crate::oids::{
    BRAINPOOL_P256R1, ID_AES256_GCM, ID_DATA, ID_EC_PUBLIC_KEY, ID_RSAES_OAEP, ID_SHA256, ID_SIGNED_DATA,
    RSA_ENCRYPTION, SHA256_WITH_RSA,
};

pub const TEST_CA: &str = "CN=KIM Test CA,O=gematik Test,C=DE";

/// Issued 2023-11-14, valid for ten years.
const NOT_BEFORE_UNIX: u64 = 1_700_000_000;
const TEN_YEARS: u64 = 10 * 365 * 24 * 60 * 60;

/// A self-consistent test certificate issued by [`TEST_CA`].
pub fn certificate(subject_cn: &str, serial: &[u8], ecc: bool) -> CryptoResult<Vec<u8>> {
    let algorithm = if ecc {
        AlgorithmIdentifierOwned {
            oid: ID_EC_PUBLIC_KEY,
            parameters: Some(Any::encode_from(&BRAINPOOL_P256R1)?),
        }
    } else {
        AlgorithmIdentifierOwned {
            oid: RSA_ENCRYPTION,
            parameters: Some(Any::encode_from(&Null)?),
        }
    };
    let key_bytes: Vec<u8> = if ecc { vec![0x04; 65] } else { vec![0x30, 0x03, 0x02, 0x01, 0x03] };

    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(serial)?,
        signature: AlgorithmIdentifierOwned {
            oid: SHA256_WITH_RSA,
            parameters: None,
        },
        issuer: Name::from_str(TEST_CA)?,
        validity: Validity {
            not_before: Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(NOT_BEFORE_UNIX))?),
            not_after: Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(
                NOT_BEFORE_UNIX + TEN_YEARS,
            ))?),
        },
        subject: Name::from_str(&format!("CN={subject_cn}"))?,
        subject_public_key_info: SubjectPublicKeyInfoOwned {
            algorithm,
            subject_public_key: BitString::from_bytes(&key_bytes)?,
        },
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: None,
    };

    let certificate = Certificate {
        tbs_certificate,
        signature_algorithm: AlgorithmIdentifierOwned {
            oid: SHA256_WITH_RSA,
            parameters: None,
        },
        signature: BitString::from_bytes(&[0u8; 64])?,
    };
    Ok(certificate.to_der()?)
}

/// AuthEnvelopedData ContentInfo with one key transport recipient per
/// certificate and an optional DER recipient-emails attribute.
pub fn auth_enveloped_data(
    recipient_certs: &[Vec<u8>],
    recipient_emails: Option<&[u8]>,
    payload: &[u8],
) -> CryptoResult<Vec<u8>> {
    let mut infos = Vec::new();
    for der in recipient_certs {
        let cert = parse_certificate(der)?;
        infos.push(RecipientInfo::Ktri(KeyTransRecipientInfo {
            version: CmsVersion::V0,
            rid: RecipientIdentifier::IssuerAndSerialNumber(issuer_and_serial(&cert)),
            key_enc_alg: AlgorithmIdentifierOwned {
                oid: ID_RSAES_OAEP,
                parameters: None,
            },
            enc_key: OctetString::new(vec![0xAB; 32])?,
        }));
    }

    let unauth_attrs = match recipient_emails {
        Some(der) => Some(SetOfVec::try_from(vec![Attribute::from_der(der)?])?),
        None => None,
    };

    let data = AuthEnvelopedData {
        version: CmsVersion::V0,
        originator_info: None,
        recip_infos: RecipientInfos(SetOfVec::try_from(infos)?),
        auth_encrypted_content: EncryptedContentInfo {
            content_type: ID_DATA,
            content_enc_alg: AlgorithmIdentifierOwned {
                oid: ID_AES256_GCM,
                parameters: None,
            },
            encrypted_content: Some(OctetString::new(payload)?),
        },
        auth_attrs: None,
        mac: OctetString::new(vec![0u8; 16])?,
        unauth_attrs,
    };
    CmsEnvelope { data }.to_der()
}

/// ContentInfo of an arbitrary type wrapping an OCTET STRING.
pub fn content_info(content_type: const_oid::ObjectIdentifier, content: &[u8]) -> CryptoResult<Vec<u8>> {
    let content_info = ContentInfo {
        content_type,
        content: Any::encode_from(&OctetString::new(content)?)?,
    };
    Ok(content_info.to_der()?)
}

/// SignedData without certificates or CRLs. Signer infos are encoded as an
/// empty SET, which is all decoding needs.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct SignedDataSkeleton {
    version: CmsVersion,
    digest_algorithms: SetOfVec<AlgorithmIdentifierOwned>,
    encap_content_info: EncapsulatedContentInfo,
    signer_infos: SetOfVec<AlgorithmIdentifierOwned>,
}

fn signed_data_with(econtent: Option<Any>) -> CryptoResult<Vec<u8>> {
    let skeleton = SignedDataSkeleton {
        version: CmsVersion::V1,
        digest_algorithms: SetOfVec::try_from(vec![AlgorithmIdentifierOwned {
            oid: ID_SHA256,
            parameters: None,
        }])?,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent,
        },
        signer_infos: SetOfVec::new(),
    };
    let content_info = ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::encode_from(&skeleton)?,
    };
    Ok(content_info.to_der()?)
}

/// Attached SignedData encapsulating `content`.
pub fn signed_data(content: &[u8]) -> CryptoResult<Vec<u8>> {
    signed_data_with(Some(Any::encode_from(&OctetString::new(content)?)?))
}

/// SignedData without encapsulated content.
pub fn detached_signed_data() -> CryptoResult<Vec<u8>> {
    signed_data_with(None)
}
