//! Password-to-key derivation for encrypted PEM blocks.
//!
//! Encrypted `RSA PRIVATE KEY` blocks written by OpenSSL (and by Go's
//! `x509.EncryptPEMBlock`) derive the cipher key with `EVP_BytesToKey`:
//! MD5, a single iteration, and the first eight bytes of the IV as salt.

use crate::error::{PkiError, Result};
use md5::{Digest, Md5};

/// The number of IV bytes used as salt.
pub const SALT_LENGTH: usize = 8;

/// Derive a `key_len` byte cipher key from a password and salt.
///
/// # Example
///
/// ```
/// use minipki::crypto::password::derive_key;
///
/// let key = derive_key("secure-password", &[7u8; 8], 32).unwrap();
/// assert_eq!(key.len(), 32);
/// ```
pub fn derive_key(password: &str, salt: &[u8], key_len: usize) -> Result<Vec<u8>> {
    if salt.len() < SALT_LENGTH {
        return Err(PkiError::DecryptionError(format!(
            "Salt must be at least {} bytes, got {}",
            SALT_LENGTH,
            salt.len()
        )));
    }
    let salt = &salt[..SALT_LENGTH];

    let mut output = Vec::with_capacity(key_len + 16);
    let mut previous: Vec<u8> = Vec::new();
    while output.len() < key_len {
        let mut hasher = Md5::new();
        hasher.update(&previous);
        hasher.update(password.as_bytes());
        hasher.update(salt);
        previous = hasher.finalize().to_vec();
        output.extend_from_slice(&previous);
    }
    output.truncate(key_len);

    Ok(output)
}
