//! KIM mail transformation pipelines
//!
//! Converts outgoing plain mails into signed and encrypted KOM-LE mails and
//! incoming KOM-LE mails back into verified plain mails. Cryptographic work
//! happens on the token device; this crate owns the MIME handling around it.
//!
//! # Key Features
//!
//! - **MIME Model**: byte-faithful header multimap and nested multipart bodies,
//!   parsed with `mail-parser` and rendered with `mail-builder`
//! - **Sending Check**: From must be the sending account; recipients without
//!   certificate or with address errors are removed
//! - **Sign-Encrypt**: card selection, signing, encryption for all recipient
//!   and sender certificates, composition of the KOM-LE envelope
//! - **Decrypt-Verify**: envelope validation, decryption card lookup by
//!   issuer/serial, signature verification, header integrity check, report
//!   attachment
//! - **Notifications**: RFC 3464 delivery status notifications and the
//!   decrypt failure notice with KIM result headers
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use config_engine::GatewayConfig;
//! use device_manager::TokenDevice;
//! use mail_pipeline::{MailTransaction, SignEncryptComposer};
//!
//! async fn send(device: Arc<dyn TokenDevice>, origin: &[u8]) -> Result<Vec<u8>, mail_pipeline::PipelineError> {
//!     let composer = SignEncryptComposer::new(device, Arc::new(GatewayConfig::default()));
//!     let mut tx = MailTransaction::new("praxis@kim.telematik");
//!     let outcome = composer.compose(&mut tx, origin, &[], &[]).await?;
//!     Ok(outcome.into_bytes())
//! }
//! ```

pub mod address;
pub mod constants;
pub mod decrypt_verify;
pub mod dsn;
pub mod error;
pub mod message;
pub mod report;
pub mod selector;
pub mod sending_check;
pub mod sign_encrypt;
pub mod transaction;
pub mod validator;

pub use address::Mailbox;
pub use decrypt_verify::{DecryptOutcome, DecryptVerifyExtractor};
pub use dsn::{render_decrypt_failure, render_dsn, DsnSettings};
pub use error::*;
pub use message::{Body, Headers, MailMessage};
pub use report::{PdfReportRenderer, ReportArtifact, ReportError, SignReportRenderer};
pub use selector::{select_decryption_card, select_signing_card, SelectError};
pub use sending_check::check_sending_mail;
pub use sign_encrypt::{SignEncryptComposer, SignEncryptOutcome};
pub use transaction::MailTransaction;
pub use validator::{validate, ValidationMode, ValidationOutcome};
