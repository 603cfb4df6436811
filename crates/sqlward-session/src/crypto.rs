//! Password encryption compatible with MySQL's `AES_ENCRYPT`.
//!
//! `AES_ENCRYPT(plain, key)` folds the key into 16 bytes by XOR, encrypts
//! with AES-128-ECB and PKCS#7 padding. Encrypted passwords travel in
//! session markers as `AES:` followed by the base64 ciphertext, so a value
//! produced by `TO_BASE64(AES_ENCRYPT(...))` on a MySQL server decrypts here.

use crate::error::CryptoError;
use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Prefix marking an encrypted password.
pub const PREFIX: &str = "AES:";

const BLOCK: usize = 16;

fn fold_key(key: &str) -> [u8; BLOCK] {
    let mut folded = [0u8; BLOCK];
    for (i, byte) in key.bytes().enumerate() {
        folded[i % BLOCK] ^= byte;
    }
    folded
}

fn cipher(key: &str) -> Aes128 {
    Aes128::new(&GenericArray::from(fold_key(key)))
}

/// Encrypt `plain` and return `AES:<base64>`.
pub fn encrypt_password(plain: &str, key: &str) -> String {
    let cipher = cipher(key);

    let mut data = plain.as_bytes().to_vec();
    let pad = BLOCK - data.len() % BLOCK;
    data.extend(std::iter::repeat_n(pad as u8, pad));

    for chunk in data.chunks_exact_mut(BLOCK) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }

    format!("{PREFIX}{}", STANDARD.encode(&data))
}

/// Decrypt an `AES:<base64>` value.
pub fn decrypt_password(value: &str, key: &str) -> Result<String, CryptoError> {
    let encoded = value.strip_prefix(PREFIX).ok_or(CryptoError::MissingPrefix)?;
    let mut data = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CryptoError::Base64(e.to_string()))?;
    if data.is_empty() || data.len() % BLOCK != 0 {
        return Err(CryptoError::BlockLength(data.len()));
    }

    let cipher = cipher(key);
    for chunk in data.chunks_exact_mut(BLOCK) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }

    let pad = usize::from(data[data.len() - 1]);
    if pad == 0 || pad > BLOCK || !data[data.len() - pad..].iter().all(|&b| usize::from(b) == pad) {
        return Err(CryptoError::Padding);
    }
    data.truncate(data.len() - pad);

    String::from_utf8(data).map_err(|_| CryptoError::Utf8)
}
