//! RSA key operations.
//!
//! Every certificate in the PKI is backed by its own RSA key pair. Keys are
//! persisted as PKCS#1 (`RSA PRIVATE KEY`) and signatures use PKCS#1 v1.5
//! with SHA-256.

use crate::error::{PkiError, Result};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;

/// Modulus size of every generated key.
pub const RSA_KEY_BITS: usize = 4096;

/// The public half of a [`KeyPair`].
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    /// Parse a DER `SubjectPublicKeyInfo`.
    pub fn from_spki_der(der: &[u8]) -> Result<Self> {
        RsaPublicKey::from_public_key_der(der)
            .map(PublicKey)
            .map_err(|e| PkiError::ParseError(format!("Invalid RSA public key: {}", e)))
    }

    /// Encode as a DER `SubjectPublicKeyInfo`.
    pub fn to_spki_der(&self) -> Result<Vec<u8>> {
        self.0
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| PkiError::CertificateError(format!("Failed to encode public key: {}", e)))
    }

    /// SHA-1 of the PKCS#1 `RSAPublicKey`, the RFC 5280 key identifier.
    pub fn key_identifier(&self) -> Result<Vec<u8>> {
        let der = self.0.to_pkcs1_der().map_err(|e| {
            PkiError::CertificateError(format!("Failed to encode public key: {}", e))
        })?;
        Ok(Sha1::digest(der.as_bytes()).to_vec())
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.0.size() * 8
    }

    /// Verify a PKCS#1 v1.5 / SHA-256 signature over `message`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        let signature = Signature::try_from(signature)
            .map_err(|e| PkiError::SigningError(format!("Malformed signature: {}", e)))?;

        VerifyingKey::<Sha256>::new(self.0.clone())
            .verify(message, &signature)
            .map_err(|e| PkiError::SigningError(format!("Signature verification failed: {}", e)))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey").field("bits", &self.bits()).finish()
    }
}

/// An RSA private key together with its public key.
#[derive(Clone)]
pub struct KeyPair {
    secret: RsaPrivateKey,
    public: PublicKey,
}

impl KeyPair {
    /// Create a keypair from an RSA private key.
    pub fn from_secret(secret: RsaPrivateKey) -> Self {
        let public = PublicKey(secret.to_public_key());
        Self { secret, public }
    }

    /// Generate a fresh [`RSA_KEY_BITS`] key pair.
    ///
    /// Failure means the entropy source or the prime search gave up; callers
    /// treat it as fatal.
    pub fn generate() -> Result<Self> {
        Self::generate_with_bits(RSA_KEY_BITS)
    }

    pub(crate) fn generate_with_bits(bits: usize) -> Result<Self> {
        tracing::debug!(bits, "generating RSA key");
        let secret = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| PkiError::KeyGenerationError(format!("RSA-{}: {}", bits, e)))?;
        Ok(Self::from_secret(secret))
    }

    /// Parse a PKCS#1 DER private key and check its consistency.
    pub fn from_pkcs1_der(der: &[u8]) -> Result<Self> {
        let secret = RsaPrivateKey::from_pkcs1_der(der)
            .map_err(|e| PkiError::ParseError(format!("Invalid PKCS#1 private key: {}", e)))?;
        secret
            .validate()
            .map_err(|e| PkiError::ParseError(format!("Inconsistent RSA private key: {}", e)))?;
        Ok(Self::from_secret(secret))
    }

    /// Encode the private key as PKCS#1 DER.
    pub fn to_pkcs1_der(&self) -> Result<Vec<u8>> {
        self.secret
            .to_pkcs1_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| PkiError::CertificateError(format!("Failed to encode private key: {}", e)))
    }

    /// The public half.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Sign a message with PKCS#1 v1.5 / SHA-256.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        SigningKey::<Sha256>::new(self.secret.clone())
            .try_sign(message)
            .map(|signature| signature.to_vec())
            .map_err(|e| PkiError::SigningError(format!("RSA signing failed: {}", e)))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
