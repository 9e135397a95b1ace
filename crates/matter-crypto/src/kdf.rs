//! HKDF-SHA256 key derivation for per-session traffic keys, matching
//! the key-schedule shape used after PASE/CASE establishment (a shared
//! secret is expanded into distinct initiator/responder encrypt keys).

use hkdf::Hkdf;
use sha2::Sha256;

use crate::aead::KEY_SIZE;
use crate::{CryptoError, Result};

/// Derive a single `KEY_SIZE`-byte key from `shared_secret`, salted and
/// labeled so distinct purposes (e.g. "initiator encrypt" vs "responder
/// encrypt") never collide even when derived from the same secret.
pub fn derive_key(shared_secret: &[u8], salt: &[u8], info: &[u8]) -> Result<[u8; KEY_SIZE]> {
    let hk = Hkdf::<Sha256>::new(Some(salt), shared_secret);
    let mut out = [0u8; KEY_SIZE];
    hk.expand(info, &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(out)
}

/// The pair of symmetric keys used on a freshly-established secure
/// session: one for traffic this node encrypts, one for traffic it
/// decrypts.
pub struct SessionKeys {
    pub encrypt_key: [u8; KEY_SIZE],
    pub decrypt_key: [u8; KEY_SIZE],
}

/// Derive both directions' keys from a shared secret established by an
/// (external) PASE/CASE handshake. `we_are_initiator` picks which label
/// maps to encrypt vs decrypt so both ends agree on which physical key
/// secures which direction.
pub fn derive_session_keys(shared_secret: &[u8], salt: &[u8], we_are_initiator: bool) -> Result<SessionKeys> {
    let i2r = derive_key(shared_secret, salt, b"matter-core i2r")?;
    let r2i = derive_key(shared_secret, salt, b"matter-core r2i")?;

    Ok(if we_are_initiator {
        SessionKeys {
            encrypt_key: i2r,
            decrypt_key: r2i,
        }
    } else {
        SessionKeys {
            encrypt_key: r2i,
            decrypt_key: i2r,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_deterministic() {
        let secret = b"shared-secret";
        let a = derive_key(secret, b"salt", b"info").unwrap();
        let b = derive_key(secret, b"salt", b"info").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_info_yields_different_keys() {
        let secret = b"shared-secret";
        let a = derive_key(secret, b"salt", b"a").unwrap();
        let b = derive_key(secret, b"salt", b"b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn initiator_and_responder_keys_are_swapped() {
        let secret = b"shared-secret";
        let initiator = derive_session_keys(secret, b"salt", true).unwrap();
        let responder = derive_session_keys(secret, b"salt", false).unwrap();

        assert_eq!(initiator.encrypt_key, responder.decrypt_key);
        assert_eq!(initiator.decrypt_key, responder.encrypt_key);
    }
}
