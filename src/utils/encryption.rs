//! Passphrase-Protected Containers
//!
//! Keylist files may be wrapped in an authenticated envelope:
//! - AES-256-GCM for authenticated encryption
//! - Argon2id for key derivation from the passphrase
//! - Random salt and nonce per container
//!
//! Plaintext files pass through unchanged.

#![allow(deprecated)] // GenericArray::from_slice deprecated in generic-array 1.x

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::error::{SignError, SignResult};

/// Encrypted container structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EncryptedContainer {
    /// Version for future compatibility
    pub version: u8,
    /// Salt used for key derivation (32 bytes, base64)
    pub salt: String,
    /// Nonce used for encryption (12 bytes, base64)
    pub nonce: String,
    /// Encrypted data (ciphertext + auth tag, base64)
    pub ciphertext: String,
    /// Key derivation parameters
    pub kdf_params: KdfParams,
}

/// Key derivation parameters
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Time cost (iterations)
    pub time_cost: u32,
    /// Parallelism
    pub parallelism: u32,
}

/// Encrypt data with a passphrase
pub fn encrypt_with_params(
    plaintext: &[u8],
    passphrase: &SecretString,
    kdf_params: KdfParams,
) -> SignResult<EncryptedContainer> {
    let mut salt = [0u8; 32];
    OsRng.fill_bytes(&mut salt);

    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_key(passphrase, &salt, &kdf_params)?;

    let cipher = Aes256Gcm::new_from_slice(key.as_ref())
        .map_err(|e| SignError::crypto_error(format!("Failed to create cipher: {}", e)))?;

    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| SignError::crypto_error(format!("Encryption failed: {}", e)))?;

    Ok(EncryptedContainer {
        version: 1,
        salt: base64_encode(&salt),
        nonce: base64_encode(&nonce_bytes),
        ciphertext: base64_encode(&ciphertext),
        kdf_params,
    })
}

/// Decrypt a container with a passphrase
pub fn decrypt(container: &EncryptedContainer, passphrase: &SecretString) -> SignResult<Zeroizing<Vec<u8>>> {
    if container.version != 1 {
        return Err(SignError::invalid_input(format!(
            "Unsupported container version: {}",
            container.version
        )));
    }

    let salt = base64_decode(&container.salt)?;
    let nonce_bytes = base64_decode(&container.nonce)?;
    let ciphertext = base64_decode(&container.ciphertext)?;

    if salt.len() != 32 {
        return Err(SignError::invalid_input("Invalid salt length"));
    }

    if nonce_bytes.len() != 12 {
        return Err(SignError::invalid_input("Invalid nonce length"));
    }

    let key = derive_key(passphrase, &salt, &container.kdf_params)?;

    let cipher = Aes256Gcm::new_from_slice(key.as_ref())
        .map_err(|e| SignError::crypto_error(format!("Failed to create cipher: {}", e)))?;

    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext = cipher.decrypt(nonce, ciphertext.as_ref()).map_err(|_| {
        SignError::decryption_failed("Decryption failed - incorrect passphrase or corrupted data")
    })?;

    Ok(Zeroizing::new(plaintext))
}

/// Parse `data` as a container if it is one
pub fn parse_container(data: &[u8]) -> Option<EncryptedContainer> {
    serde_json::from_slice(data).ok()
}

/// Return the text of a file that may or may not be encrypted. The
/// passphrase callback is only invoked for encrypted data.
pub fn decrypt_maybe<F>(data: &[u8], desc: &str, passphrase: F) -> SignResult<Zeroizing<String>>
where
    F: FnOnce() -> SignResult<SecretString>,
{
    let plaintext = match parse_container(data) {
        Some(container) => {
            crate::log_info!("coldsign::encryption", format!("{} is encrypted", desc));
            let passphrase = passphrase()?;
            decrypt(&container, &passphrase)?
        }
        None => Zeroizing::new(data.to_vec()),
    };

    let text = std::str::from_utf8(&plaintext)
        .map_err(|_| SignError::parse_error(format!("{} is not valid UTF-8", desc)))?;
    Ok(Zeroizing::new(text.to_string()))
}

/// Derive encryption key from passphrase using Argon2id
fn derive_key(passphrase: &SecretString, salt: &[u8], params: &KdfParams) -> SignResult<Zeroizing<[u8; 32]>> {
    use argon2::{Algorithm, Argon2, Params, Version};

    let argon2_params = Params::new(params.memory_cost, params.time_cost, params.parallelism, Some(32))
        .map_err(|e| SignError::crypto_error(format!("Invalid KDF params: {}", e)))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, key.as_mut())
        .map_err(|e| SignError::crypto_error(format!("Key derivation failed: {}", e)))?;

    Ok(key)
}

fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn base64_decode(s: &str) -> SignResult<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| SignError::parse_error(format!("Invalid base64: {}", e)))
}
