//! Archive decryption.
//!
//! Encrypted archives are a single blob: `salt | nonce | ciphertext+tag`.
//! The key is derived from the password with PBKDF2-HMAC-SHA256.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use std::str::FromStr;
use strum::EnumString;

use super::error::{CryptoError, MountError};

const KEY_SIZE: usize = 32; // 256 bits for AES-256
const NONCE_SIZE: usize = 12; // 96 bits for GCM
const SALT_SIZE: usize = 16;
const HEADER_SIZE: usize = SALT_SIZE + NONCE_SIZE;

/// Default PBKDF2 iteration count.
pub const DEFAULT_ROUNDS: u32 = 100_000;

/// Turns an encrypted archive blob back into archive bytes.
pub trait Decryptor: Send + Sync {
    fn decrypt(
        &self,
        algorithm: &str,
        password: &str,
        data: &[u8],
    ) -> Result<Vec<u8>, MountError>;
}

/// Supported cipher algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Cipher {
    #[strum(serialize = "aes-256-gcm", serialize = "aes256gcm")]
    Aes256Gcm,
}

impl Cipher {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Canonical algorithm name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Cipher::Aes256Gcm => "aes-256-gcm",
        }
    }
}

impl std::fmt::Display for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Password-based decryptor for the algorithms in [`Cipher`].
#[derive(Debug, Clone, Copy)]
pub struct PasswordCipher {
    rounds: u32,
}

impl Default for PasswordCipher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordCipher {
    pub fn new() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
        }
    }

    /// Use a non-default PBKDF2 iteration count. Sealing and opening must agree.
    pub fn with_rounds(rounds: u32) -> Self {
        Self { rounds }
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, self.rounds, &mut key);
        key
    }

    /// Encrypt archive bytes into a blob that [`Decryptor::decrypt`] accepts.
    pub fn seal(
        &self,
        cipher: Cipher,
        password: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        match cipher {
            Cipher::Aes256Gcm => {
                let mut header = [0u8; HEADER_SIZE];
                OsRng.fill_bytes(&mut header);
                let (salt, nonce) = header.split_at(SALT_SIZE);

                let key_bytes = self.derive_key(password, salt);
                let aead = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
                let ciphertext = aead
                    .encrypt(Nonce::from_slice(nonce), plaintext)
                    .map_err(|_| CryptoError::Seal)?;

                let mut out = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
                out.extend_from_slice(&header);
                out.extend_from_slice(&ciphertext);
                Ok(out)
            }
        }
    }

    /// Decrypt a blob with a known cipher.
    pub fn open(
        &self,
        cipher: Cipher,
        password: &str,
        data: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        match cipher {
            Cipher::Aes256Gcm => {
                if data.len() < HEADER_SIZE {
                    return Err(CryptoError::Truncated(data.len()));
                }
                let (salt, rest) = data.split_at(SALT_SIZE);
                let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

                let key_bytes = self.derive_key(password, salt);
                let aead = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
                aead.decrypt(Nonce::from_slice(nonce), ciphertext)
                    .map_err(|_| CryptoError::Authentication)
            }
        }
    }
}

impl Decryptor for PasswordCipher {
    fn decrypt(
        &self,
        algorithm: &str,
        password: &str,
        data: &[u8],
    ) -> Result<Vec<u8>, MountError> {
        let cipher = Cipher::from_str(algorithm)
            .ok_or_else(|| MountError::UnknownAlgorithm(algorithm.to_string()))?;
        Ok(self.open(cipher, password, data)?)
    }
}
