//! At-rest encryption for message bodies.
//!
//! Confidentiality here is against storage exposure only: the server holds
//! the key and decrypts for moderation visibility. The envelope text format
//! is `"<nonce_hex>:<ciphertext_hex>"` so a single column carries everything
//! needed to decrypt, and the codec stays stateless across calls.

use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use sha2::{Digest, Sha256};

/// Substituted when an envelope cannot be decrypted. History rendering must
/// never crash on a bad row; the failure is logged instead.
pub const UNREADABLE_SENTINEL: &str = "[unreadable]";

const NONCE_LEN: usize = 12;

/// Symmetric codec over a process-wide secret. The key is derived once at
/// construction (SHA-256 of the secret) and never rotated within a running
/// instance. Cloneable and safe to share across arbitrarily many tasks.
#[derive(Clone)]
pub struct EncryptionCodec {
    key: Key<Aes256Gcm>,
}

impl EncryptionCodec {
    pub fn new(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        Self {
            key: Key::<Aes256Gcm>::clone_from_slice(&digest),
        }
    }

    /// Encrypt a plaintext body into an envelope. Empty input passes through
    /// unchanged: attachment-only messages carry no envelope.
    pub fn encrypt(&self, plaintext: &str) -> String {
        if plaintext.is_empty() {
            return String::new();
        }

        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        match cipher.encrypt(&nonce, plaintext.as_bytes()) {
            Ok(ciphertext) => format!("{}:{}", hex::encode(nonce), hex::encode(ciphertext)),
            Err(_) => {
                // AES-GCM encryption over an in-memory buffer cannot
                // realistically fail; fall back to storing plaintext rather
                // than dropping the message.
                tracing::error!("message body encryption failed, storing plaintext");
                plaintext.to_string()
            }
        }
    }

    /// Decrypt an envelope, failing open: any cryptographic failure yields
    /// the `[unreadable]` sentinel instead of an error. Empty input is
    /// identity.
    pub fn decrypt(&self, envelope: &str) -> String {
        if envelope.is_empty() {
            return String::new();
        }

        let Some((nonce_hex, ciphertext_hex)) = envelope.split_once(':') else {
            tracing::warn!("stored message body lacks envelope marker");
            return UNREADABLE_SENTINEL.to_string();
        };

        let (Ok(nonce_bytes), Ok(ciphertext)) = (hex::decode(nonce_hex), hex::decode(ciphertext_hex))
        else {
            tracing::warn!("stored message envelope is not valid hex");
            return UNREADABLE_SENTINEL.to_string();
        };

        if nonce_bytes.len() != NONCE_LEN {
            tracing::warn!(len = nonce_bytes.len(), "stored message nonce has wrong length");
            return UNREADABLE_SENTINEL.to_string();
        }

        let cipher = Aes256Gcm::new(&self.key);
        let nonce = Nonce::from_slice(&nonce_bytes);
        match cipher.decrypt(nonce, ciphertext.as_ref()) {
            Ok(plaintext) => match String::from_utf8(plaintext) {
                Ok(text) => text,
                Err(_) => {
                    tracing::warn!("decrypted message body is not valid utf8");
                    UNREADABLE_SENTINEL.to_string()
                }
            },
            Err(_) => {
                tracing::warn!("message envelope failed authentication");
                UNREADABLE_SENTINEL.to_string()
            }
        }
    }
}
