//! Token device model for the KIM gateway
//!
//! The token device (Konnektor) holds the institution cards (SMC-B) and
//! performs signing, encryption, decryption and signature verification.
//! Pipelines talk to it through the async [`TokenDevice`] trait; with the
//! `mock` feature a `MockTokenDevice` is generated for tests.

// Core modules
pub mod device;
pub mod error;
pub mod types;

// Re-exports
pub use device::*;
pub use error::*;
pub use types::*;
