//! ChaCha20-Poly1305 AEAD encryption for secure-session application
//! payloads, with the packet header bytes bound in as associated data
//! so a tampered header fails authentication even though it isn't
//! itself encrypted.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};

use crate::{CryptoError, Result};

/// Nonce size for ChaCha20-Poly1305 (96 bits = 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Key size for ChaCha20-Poly1305 (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Authentication tag size (128 bits = 16 bytes), appended to the
/// ciphertext.
pub const TAG_SIZE: usize = 16;

/// Build the 12-byte nonce used for a given outbound/inbound message
/// counter, per Matter's per-message nonce convention: a fixed
/// direction/security-flags byte followed by the little-endian 32-bit
/// message counter and the 64-bit source node id (zeroed for unicast
/// session traffic the session layer already binds by session id).
pub fn build_nonce(security_flags: u8, message_counter: u32, source_node_id: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[0] = security_flags;
    nonce[1..5].copy_from_slice(&message_counter.to_le_bytes());
    nonce[5..13].copy_from_slice(&source_node_id.to_le_bytes()[..8]);
    nonce
}

/// Encrypt `plaintext` with `key`/`nonce`, authenticating `aad` (the
/// serialized packet header) alongside it.
pub fn encrypt(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = Nonce::from_slice(nonce);

    cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::AeadEncryption)
}

/// Decrypt `ciphertext` (with its appended tag) with `key`/`nonce`,
/// verifying it was authenticated against `aad`.
pub fn decrypt(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = Nonce::from_slice(nonce);

    cipher
        .decrypt(nonce, Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AeadDecryption)
}
