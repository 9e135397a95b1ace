//! # matter-crypto
//!
//! Cryptographic glue for the Matter core: AEAD encryption of session
//! traffic and key derivation for per-session symmetric keys.
//!
//! Certificate signing/verification and the PASE/CASE handshake
//! transcripts are treated as external collaborators; this crate only
//! provides the primitives the core depends on for securing an
//! established session's traffic.

pub mod aead;
pub mod kdf;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AEAD encryption failed (should not normally occur; encryption
    /// only fails on catastrophically oversized input).
    #[error("AEAD encryption failed")]
    AeadEncryption,
    /// AEAD decryption or authentication failed: either the ciphertext
    /// was tampered with, or the wrong key/nonce/AAD was used.
    #[error("AEAD decryption/authentication failed")]
    AeadDecryption,
    /// Key derivation failed (e.g. requested output longer than the
    /// underlying hash's expansion limit).
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
