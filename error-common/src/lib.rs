//! Common error handling for the KIM gateway
//!
//! This crate holds the KIM error code catalogue, the per-concern error
//! contexts a mail transaction accumulates codes into, and the gateway error
//! taxonomy returned by the transformation stages.
//!
//! # Key Features
//!
//! - **Error Codes**: the fixed catalogue (4001-4017, 4112, 4115, 4206, 4253, 4264, X001-X024)
//!   with German operator texts as they appear in KIM headers and DSN bodies
//! - **Error Contexts**: one context per concern, idempotent accumulation,
//!   per-address lists for certificate, version and RCPT TO failures
//! - **Taxonomy**: `GatewayError` with kinds Format, Version, CardNotFound,
//!   DeviceCall, Integrity and AddressEligibility
//! - **Reporting**: structured `tracing` events per accumulated code
//!
//! # Example
//!
//! ```rust
//! use error_common::{codes, ErrorContextKind, ErrorContexts};
//!
//! let mut errors = ErrorContexts::new();
//! errors.accumulate(ErrorContextKind::SignEncrypt, codes::CODE_X009);
//! errors.accumulate(ErrorContextKind::SignEncrypt, codes::CODE_X009);
//! assert_eq!(errors.sign_encrypt.len(), 1);
//! ```

pub mod codes;
pub mod context;
pub mod reporting;
pub mod types;

pub use codes::ErrorCode;
pub use context::*;
pub use reporting::*;
pub use types::*;
