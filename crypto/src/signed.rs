use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use der::asn1::OctetString;
use der::{Decode, Encode};
use tracing::debug;

use crate::error::{CryptoError, CryptoResult};
use crate::oids::ID_SIGNED_DATA;

/// Returns the encapsulated content of a DER SignedData ContentInfo.
pub fn extract_signed_content(bytes: &[u8]) -> CryptoResult<Vec<u8>> {
    let content_info = ContentInfo::from_der(bytes)?;
    if content_info.content_type != ID_SIGNED_DATA {
        debug!(content_type = %content_info.content_type, "Signed content is not SignedData");
        return Err(CryptoError::UnexpectedContentType {
            expected: ID_SIGNED_DATA,
            found: content_info.content_type,
        });
    }
    let signed_data = SignedData::from_der(&content_info.content.to_der()?)?;
    let econtent = signed_data
        .encap_content_info
        .econtent
        .ok_or_else(|| CryptoError::MissingContent("SignedData carries no eContent".to_string()))?;
    let octets = OctetString::from_der(&econtent.to_der()?)?;
    Ok(octets.as_bytes().to_vec())
}
