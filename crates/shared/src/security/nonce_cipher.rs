//! AES-CBC decryption of client-supplied nonces.
//!
//! The wire format is `base64(iv || ciphertext)` where `iv` is 16 bytes and the
//! ciphertext is AES-CBC with PKCS#7 padding under the pre-shared key. The key
//! size (16, 24 or 32 bytes) selects AES-128, AES-192 or AES-256.

use aes::{Aes128, Aes192, Aes256};
use base64::Engine as _;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use thiserror::Error;

const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum NonceCipherError {
    #[error("nonce key must be 16, 24 or 32 bytes, got {0}")]
    InvalidKeyLength(usize),
}

/// Every failure while opening a nonce collapses into this one error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("failed to decrypt nonce")]
pub struct DecryptionError;

#[derive(Clone)]
enum NonceKey {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

#[derive(Clone)]
pub struct NonceCipher {
    key: NonceKey,
}

impl std::fmt::Debug for NonceCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bits = match self.key {
            NonceKey::Aes128(_) => 128,
            NonceKey::Aes192(_) => 192,
            NonceKey::Aes256(_) => 256,
        };
        f.debug_struct("NonceCipher").field("key_bits", &bits).finish()
    }
}

impl NonceCipher {
    pub fn new(key: &[u8]) -> Result<Self, NonceCipherError> {
        let key = match key.len() {
            16 => NonceKey::Aes128(copy_key(key)),
            24 => NonceKey::Aes192(copy_key(key)),
            32 => NonceKey::Aes256(copy_key(key)),
            other => return Err(NonceCipherError::InvalidKeyLength(other)),
        };
        Ok(Self { key })
    }

    /// Decrypts an encoded nonce. The plaintext is returned for callers that
    /// want it, but admission only depends on decryption succeeding.
    pub fn decrypt(&self, encrypted_nonce: &str) -> Result<String, DecryptionError> {
        let raw = base64::engine::general_purpose::STANDARD
            .decode(encrypted_nonce)
            .map_err(|_| DecryptionError)?;

        if raw.len() < IV_LEN + BLOCK_LEN || (raw.len() - IV_LEN) % BLOCK_LEN != 0 {
            return Err(DecryptionError);
        }
        let (iv, ciphertext) = raw.split_at(IV_LEN);

        let plaintext = match &self.key {
            NonceKey::Aes128(key) => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
                .map_err(|_| DecryptionError)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            NonceKey::Aes192(key) => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
                .map_err(|_| DecryptionError)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            NonceKey::Aes256(key) => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
                .map_err(|_| DecryptionError)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
        }
        .map_err(|_| DecryptionError)?;

        Ok(String::from_utf8_lossy(&plaintext).into_owned())
    }

    /// Client-side counterpart of [`NonceCipher::decrypt`]: produces
    /// `base64(iv || ciphertext)` for the given plaintext and IV.
    pub fn encrypt(&self, plaintext: &str, iv: [u8; IV_LEN]) -> String {
        let ciphertext = match &self.key {
            NonceKey::Aes128(key) => cbc::Encryptor::<Aes128>::new(key.into(), &iv.into())
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes()),
            NonceKey::Aes192(key) => cbc::Encryptor::<Aes192>::new(key.into(), &iv.into())
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes()),
            NonceKey::Aes256(key) => cbc::Encryptor::<Aes256>::new(key.into(), &iv.into())
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes()),
        };

        let mut framed = Vec::with_capacity(IV_LEN + ciphertext.len());
        framed.extend_from_slice(&iv);
        framed.extend_from_slice(&ciphertext);
        base64::engine::general_purpose::STANDARD.encode(framed)
    }
}

fn copy_key<const N: usize>(key: &[u8]) -> [u8; N] {
    let mut out = [0_u8; N];
    out.copy_from_slice(key);
    out
}
