//! Pluggable frame encryption.
//!
//! The dispatcher only needs to turn envelope bodies into plaintext frames and
//! back. Which algorithm does that is decided by whoever builds the
//! [`CipherFactory`] handed to the lobby handler.

use crate::connection::SessionKey;
use crate::error::ServerError;

/// A stateful, per-connection cipher.
///
/// Both directions take `&mut self` because chained modes carry state from one
/// frame to the next.
pub trait FrameCipher: Send {
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, ServerError>;
    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, ServerError>;
}

/// Builds a fresh cipher for a connection once its session key is known.
pub trait CipherFactory: Send + Sync {
    fn create(&self, key: &SessionKey) -> Box<dyn FrameCipher>;
}

/// Identity transform. Keeps the envelope path working without a real cipher.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextCipher;

impl FrameCipher for PlaintextCipher {
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, ServerError> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, ServerError> {
        Ok(ciphertext.to_vec())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextCipherFactory;

impl CipherFactory for PlaintextCipherFactory {
    fn create(&self, _key: &SessionKey) -> Box<dyn FrameCipher> {
        Box::new(PlaintextCipher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plaintext_cipher_is_identity() {
        let mut cipher = PlaintextCipherFactory.create(&SessionKey::from("abc"));
        let sealed = cipher.encrypt(b"frame").unwrap();
        assert_eq!(sealed, b"frame");
        assert_eq!(cipher.decrypt(&sealed).unwrap(), b"frame");
    }
}
