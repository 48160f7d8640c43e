//! Authenticated field encryption for vault secrets.
//!
//! AES-256-GCM via `ring`, one fresh random 96-bit nonce per call. The
//! transportable blob layout is `nonce(12) || tag(16) || ciphertext`,
//! base64-encoded only at the storage boundary; everything internal is
//! raw bytes. Decryption fails closed: a truncated blob, a flipped byte,
//! or the wrong key yields an error and never partial plaintext.
//!
//! # Security Notes
//!
//! - Nonces are drawn from the system CSPRNG inside
//!   [`VaultCipher::encrypt`]. There is no caller-supplied nonce path and
//!   no counter state, so nonce reuse under one key cannot be introduced
//!   at a call site.
//! - The key length is checked once, in [`VaultCipher::new`], before any
//!   `ring` call. A constructed cipher is proof the key had the right
//!   shape.
//! - Plaintext never appears in logs; trace events carry lengths only.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::aead::{
    self, Aad, BoundKey, NONCE_LEN, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey,
};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, SecurityError};

/// Length of the AES-256-GCM key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the AES-256-GCM nonce in bytes (96 bits).
pub const NONCE_LEN_BYTES: usize = NONCE_LEN;

/// Length of the GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Smallest well-formed blob: nonce plus tag around an empty ciphertext.
pub const MIN_BLOB_LEN: usize = NONCE_LEN_BYTES + TAG_LEN;

/// AES-256-GCM algorithm from `ring`.
static AEAD_ALG: &aead::Algorithm = &aead::AES_256_GCM;

// ---------------------------------------------------------------------------
// Nonce handling
// ---------------------------------------------------------------------------

/// A nonce sequence that yields exactly one nonce and then errors.
///
/// `ring` requires a [`NonceSequence`] for bound keys. Each key here is
/// built for a single seal or open call, so the sequence holds one nonce
/// and refuses to advance twice.
struct SingleNonce(Option<[u8; NONCE_LEN_BYTES]>);

impl SingleNonce {
    fn new(bytes: [u8; NONCE_LEN_BYTES]) -> Self {
        Self(Some(bytes))
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> std::result::Result<Nonce, ring::error::Unspecified> {
        self.0
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

// ---------------------------------------------------------------------------
// VaultCipher
// ---------------------------------------------------------------------------

/// Field-level authenticated encryption bound to one 256-bit key.
///
/// Blobs produced by [`encrypt`](Self::encrypt) are only consumable by
/// [`decrypt`](Self::decrypt) under the same key material.
pub struct VaultCipher {
    key: [u8; KEY_LEN],
    rng: SystemRandom,
}

impl VaultCipher {
    /// Build a cipher around `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::CryptoConfig`] unless `key` is exactly
    /// 32 bytes. The check runs before any cryptographic call.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(SecurityError::CryptoConfig {
                reason: format!("vault key must be {} bytes, got {}", KEY_LEN, key.len()),
            });
        }

        let mut k = [0u8; KEY_LEN];
        k.copy_from_slice(key);
        Ok(Self {
            key: k,
            rng: SystemRandom::new(),
        })
    }

    /// Encrypt `plaintext`, returning a raw `nonce || tag || ciphertext`
    /// blob.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::EncryptionFailed`] if the CSPRNG or `ring`
    /// reports a failure.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN_BYTES];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| SecurityError::EncryptionFailed {
                reason: "failed to generate random nonce".into(),
            })?;

        let unbound =
            UnboundKey::new(AEAD_ALG, &self.key).map_err(|_| SecurityError::EncryptionFailed {
                reason: "failed to create AES-256-GCM key".into(),
            })?;
        let mut sealing_key = SealingKey::new(unbound, SingleNonce::new(nonce_bytes));

        // ring encrypts in place and appends the 16-byte tag.
        let mut in_out = plaintext.to_vec();
        sealing_key
            .seal_in_place_append_tag(Aad::empty(), &mut in_out)
            .map_err(|_| SecurityError::EncryptionFailed {
                reason: "seal_in_place failed".into(),
            })?;

        // Re-frame ring's `ciphertext || tag` as `nonce || tag || ciphertext`.
        let ct_len = in_out.len() - TAG_LEN;
        let mut blob = Vec::with_capacity(NONCE_LEN_BYTES + in_out.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&in_out[ct_len..]);
        blob.extend_from_slice(&in_out[..ct_len]);

        tracing::trace!(
            plaintext_len = plaintext.len(),
            blob_len = blob.len(),
            "encrypted secret field"
        );

        Ok(blob)
    }

    /// Decrypt a `nonce || tag || ciphertext` blob produced by
    /// [`encrypt`](Self::encrypt).
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::DecryptionFailed`] if the blob is shorter
    /// than the 28-byte minimum framing or the authentication tag does not
    /// verify (tampered data or wrong key). No partial plaintext is
    /// returned.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < MIN_BLOB_LEN {
            return Err(SecurityError::DecryptionFailed {
                reason: format!(
                    "blob is {} bytes, shorter than the {} byte minimum framing",
                    blob.len(),
                    MIN_BLOB_LEN
                ),
            });
        }

        let mut nonce_bytes = [0u8; NONCE_LEN_BYTES];
        nonce_bytes.copy_from_slice(&blob[..NONCE_LEN_BYTES]);
        let tag = &blob[NONCE_LEN_BYTES..MIN_BLOB_LEN];
        let ciphertext = &blob[MIN_BLOB_LEN..];

        let unbound =
            UnboundKey::new(AEAD_ALG, &self.key).map_err(|_| SecurityError::DecryptionFailed {
                reason: "failed to create AES-256-GCM key".into(),
            })?;
        let mut opening_key = OpeningKey::new(unbound, SingleNonce::new(nonce_bytes));

        // ring expects `ciphertext || tag`, so the tag goes back to the end.
        let mut in_out = Vec::with_capacity(ciphertext.len() + TAG_LEN);
        in_out.extend_from_slice(ciphertext);
        in_out.extend_from_slice(tag);

        let plaintext = opening_key
            .open_in_place(Aad::empty(), &mut in_out)
            .map_err(|_| SecurityError::DecryptionFailed {
                reason: "authentication failed, wrong key or corrupted data".into(),
            })?;
        let result = plaintext.to_vec();

        tracing::trace!(
            blob_len = blob.len(),
            plaintext_len = result.len(),
            "decrypted secret field"
        );

        Ok(result)
    }

    /// Encrypt and base64-encode in one step, for the storage boundary.
    pub fn encrypt_to_base64(&self, plaintext: &[u8]) -> Result<String> {
        Ok(BASE64.encode(self.encrypt(plaintext)?))
    }

    /// Decode a base64 blob and decrypt it.
    ///
    /// # Errors
    ///
    /// Returns [`SecurityError::DecryptionFailed`] for bad base64 as well:
    /// a blob that does not decode was not produced by
    /// [`encrypt_to_base64`](Self::encrypt_to_base64).
    pub fn decrypt_from_base64(&self, blob: &str) -> Result<Vec<u8>> {
        let raw = BASE64
            .decode(blob)
            .map_err(|_| SecurityError::DecryptionFailed {
                reason: "blob is not valid base64".into(),
            })?;
        self.decrypt(&raw)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> [u8; KEY_LEN] {
        [byte; KEY_LEN]
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = VaultCipher::new(&key(0x42)).unwrap();
        let plaintext = b"hunter2, but longer";

        let blob = cipher.encrypt(plaintext).unwrap();
        assert_eq!(blob.len(), MIN_BLOB_LEN + plaintext.len());
        assert_eq!(cipher.decrypt(&blob).unwrap(), plaintext);
    }

    #[test]
    fn flipping_any_byte_fails_decryption() {
        let cipher = VaultCipher::new(&key(0x42)).unwrap();
        let blob = cipher.encrypt(b"secret data").unwrap();

        for i in 0..blob.len() {
            let mut tampered = blob.clone();
            tampered[i] ^= 0x01;
            assert!(
                matches!(
                    cipher.decrypt(&tampered),
                    Err(SecurityError::DecryptionFailed { .. })
                ),
                "flipped byte {i} should fail authentication"
            );
        }
    }

    #[test]
    fn wrong_key_fails_decryption() {
        let cipher1 = VaultCipher::new(&key(0x01)).unwrap();
        let cipher2 = VaultCipher::new(&key(0x02)).unwrap();

        let blob = cipher1.encrypt(b"secret data").unwrap();
        assert!(matches!(
            cipher2.decrypt(&blob),
            Err(SecurityError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn short_blob_rejected_before_crypto() {
        let cipher = VaultCipher::new(&key(0x42)).unwrap();

        for len in [0, 1, NONCE_LEN_BYTES, MIN_BLOB_LEN - 1] {
            let blob = vec![0u8; len];
            assert!(matches!(
                cipher.decrypt(&blob),
                Err(SecurityError::DecryptionFailed { .. })
            ));
        }
    }

    #[test]
    fn invalid_key_length_rejected() {
        for len in [0, 16, 31, 33, 64] {
            let bad_key = vec![0u8; len];
            assert!(matches!(
                VaultCipher::new(&bad_key),
                Err(SecurityError::CryptoConfig { .. })
            ));
        }
    }

    #[test]
    fn nonce_is_fresh_per_call() {
        let cipher = VaultCipher::new(&key(0x42)).unwrap();

        let first = cipher.encrypt(b"same plaintext").unwrap();
        let second = cipher.encrypt(b"same plaintext").unwrap();
        assert_ne!(first, second);
        assert_ne!(first[..NONCE_LEN_BYTES], second[..NONCE_LEN_BYTES]);
    }

    #[test]
    fn base64_boundary_roundtrip() {
        let cipher = VaultCipher::new(&key(0x42)).unwrap();

        let blob = cipher.encrypt_to_base64(b"boundary secret").unwrap();
        assert_eq!(
            cipher.decrypt_from_base64(&blob).unwrap(),
            b"boundary secret"
        );
    }

    #[test]
    fn non_base64_blob_rejected() {
        let cipher = VaultCipher::new(&key(0x42)).unwrap();
        assert!(matches!(
            cipher.decrypt_from_base64("this is not base64!!!"),
            Err(SecurityError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let cipher = VaultCipher::new(&key(0x42)).unwrap();

        let blob = cipher.encrypt(b"").unwrap();
        assert_eq!(blob.len(), MIN_BLOB_LEN);
        assert_eq!(cipher.decrypt(&blob).unwrap(), b"");
    }

    #[test]
    fn large_plaintext_roundtrip() {
        let cipher = VaultCipher::new(&key(0x42)).unwrap();
        let plaintext = vec![0xAB_u8; 1_000_000]; // 1 MB

        let blob = cipher.encrypt(&plaintext).unwrap();
        assert_eq!(cipher.decrypt(&blob).unwrap(), plaintext);
    }
}
