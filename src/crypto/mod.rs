//! Cryptographic operations module.
//!
//! This module provides the primitives underneath the PKI:
//!
//! - RSA key generation, signing and verification
//! - Password-based encryption of PEM private key blocks
//! - `EVP_BytesToKey` password derivation
//!
//! # Example
//!
//! ```rust,no_run
//! use minipki::crypto::encryption::{decrypt_pem_block, encrypt_pem_block, KeyCipher};
//! use minipki::crypto::rsa::KeyPair;
//!
//! # fn example() -> minipki::error::Result<()> {
//! let keypair = KeyPair::generate()?;
//! let der = keypair.to_pkcs1_der()?;
//!
//! let block = encrypt_pem_block("RSA PRIVATE KEY", &der, "secure-password", KeyCipher::Aes256Cbc)?;
//! let decrypted = decrypt_pem_block(&block, "secure-password")?;
//! assert_eq!(der, decrypted);
//! # Ok(())
//! # }
//! ```

pub mod encryption;
pub mod password;
pub mod rsa;
