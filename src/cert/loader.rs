//! Certificate and key loading from PEM files.

use crate::cert::ca::CertifiedKey;
use crate::cert::certificate::IssuedCertificate;
use crate::cert::codec::{
    decode_certificate, decode_private_key, encode_certificate, encode_private_key,
    SerializedCertBundle,
};
use crate::crypto::rsa::KeyPair;
use crate::error::{PkiError, Result};
use std::path::Path;

/// A certificate and private key read back from disk.
#[derive(Debug, Clone)]
pub struct LoadedCertificate {
    pub certificate: IssuedCertificate,
    pub key: KeyPair,
    /// Canonical PEM of both; the key is always unencrypted here.
    pub bundle: SerializedCertBundle,
}

impl LoadedCertificate {
    /// The certificate and key as signing material.
    pub fn certified_key(&self) -> CertifiedKey {
        CertifiedKey {
            certificate: self.certificate.clone(),
            key: self.key.clone(),
        }
    }
}

/// Load a certificate and its private key.
///
/// An empty `password` means the key file is not encrypted.
///
/// # Arguments
///
/// * `key_path` - PEM file holding one `RSA PRIVATE KEY` block
/// * `password` - Password for an encrypted key, or `""`
/// * `cert_path` - PEM file holding one `CERTIFICATE` block
///
/// # Example
///
/// ```rust,no_run
/// use minipki::cert::loader::load;
///
/// # fn example() -> minipki::error::Result<()> {
/// let ca = load("ssl/ca.key".as_ref(), "", "ssl/ca.pem".as_ref())?;
/// assert!(ca.certificate.is_ca());
/// # Ok(())
/// # }
/// ```
pub fn load(key_path: &Path, password: &str, cert_path: &Path) -> Result<LoadedCertificate> {
    let certificate = load_certificate_file(cert_path)?;

    let key_pem = read_file(key_path)?;
    let key = decode_private_key(&key_pem, Some(password))?;

    tracing::debug!(
        cert = %cert_path.display(),
        key = %key_path.display(),
        subject = %certificate.subject(),
        "loaded certificate and key"
    );

    let bundle = SerializedCertBundle {
        cert: encode_certificate(&certificate),
        key: encode_private_key(&key)?,
    };

    Ok(LoadedCertificate {
        certificate,
        key,
        bundle,
    })
}

/// Load a single certificate without its key.
pub fn load_certificate_file(cert_path: &Path) -> Result<IssuedCertificate> {
    let pem = read_file(cert_path)?;
    decode_certificate(&pem)
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| PkiError::io(path, e))
}
