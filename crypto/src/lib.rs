//! CMS and X.509 handling for KIM mail envelopes
//!
//! KIM mails travel as an RFC 5083 AuthEnvelopedData whose unauthenticated
//! attributes carry the gematik recipient-emails attribute. This crate parses
//! and inspects those structures; the cryptographic operations themselves run
//! on the token device.
//!
//! - [`envelope`]: `AuthEnvelopedData` and the [`CmsEnvelope`] accessor
//! - [`recipient_emails`]: building and reading the recipient-emails attribute
//! - [`certificate`]: issuer/serial normalization and recipient certificates
//! - [`signed`]: encapsulated content of a SignedData
//!
//! # Example
//!
//! ```rust,no_run
//! use crypto::CmsEnvelope;
//!
//! # fn run(der: &[u8]) -> crypto::CryptoResult<()> {
//! let envelope = CmsEnvelope::from_der(der)?;
//! for target in envelope.targets_for("praxis@arzt.kim.telematik")? {
//!     println!("encrypted for {target}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod certificate;
pub mod envelope;
pub mod error;
pub mod oids;
pub mod recipient_emails;
pub mod signed;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use certificate::*;
pub use envelope::*;
pub use error::*;
pub use recipient_emails::{RecipientEmail, RecipientEmailEntry};
pub use signed::extract_signed_content;
