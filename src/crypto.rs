//! Envelope encryption for tenant secrets at rest.
//!
//! A single 32-byte master key lives in the environment; each stored secret
//! is encrypted under a per-record key derived with HKDF-SHA256 from the
//! master key and the record's id, so a leaked ciphertext from one tenant
//! is useless against another.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hkdf::Hkdf;
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

const NONCE_LEN: usize = 12;

/// Hash a secret for storage/lookup (API keys, linking codes).
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"gatepass-secret-v1:");
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    /// Decode a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| AppError::Internal("MASTER_KEY is not valid base64".into()))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AppError::Internal("MASTER_KEY must decode to 32 bytes".into()))?;
        Ok(Self(key))
    }

    /// Generate a fresh random key (dev mode and tests).
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Self(key)
    }

    fn derive(&self, context: &str) -> Key<Aes256Gcm> {
        let hk = Hkdf::<Sha256>::new(Some(b"gatepass-envelope-v1"), &self.0);
        let mut okm = [0u8; 32];
        // Infallible for a 32-byte output with SHA-256.
        hk.expand(context.as_bytes(), &mut okm)
            .expect("HKDF expand with 32-byte output");
        Key::<Aes256Gcm>::from(okm)
    }

    /// Encrypt a secret bound to a record id. Output is nonce || ciphertext.
    pub fn encrypt(&self, context: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(&self.derive(context));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| AppError::Internal("encryption failed".into()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a nonce || ciphertext blob produced by [`encrypt`](Self::encrypt).
    pub fn decrypt(&self, context: &str, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() <= NONCE_LEN {
            return Err(AppError::Internal("ciphertext too short".into()));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(&self.derive(context));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::Internal("decryption failed".into()))
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(..)")
    }
}
