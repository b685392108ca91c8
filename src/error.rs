//! Error types for the minipki library.
//!
//! Every fallible operation in the crate returns [`PkiError`]. The variants
//! follow the issuance pipeline: key generation, signing, parsing and
//! decryption of stored material, trust pool assembly and file access.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The main error type for minipki operations.
#[derive(Error, Debug)]
pub enum PkiError {
    /// Key creation failed (entropy source or algorithm failure)
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// The CA could not sign: mismatched key/certificate or primitive failure
    #[error("Signing error: {0}")]
    SigningError(String),

    /// Malformed PEM armor or invalid DER certificate/key encoding
    #[error("Parse error: {0}")]
    ParseError(String),

    /// A private key block carries an unexpected PEM label
    #[error("Wrong key type: expected {expected}, found {found}")]
    WrongKeyType { expected: String, found: String },

    /// Wrong password or corrupt encrypted key payload
    #[error("Decryption error: {0}")]
    DecryptionError(String),

    /// A private key could not be encrypted
    #[error("Encryption error: {0}")]
    EncryptionError(String),

    /// A CA certificate could not be added to a trust pool
    #[error("Trust pool error: {0}")]
    TrustPoolError(String),

    /// Certificate content violates the descriptor invariants
    #[error("Certificate error: {0}")]
    CertificateError(String),

    /// rustls refused to build a configuration from the loaded material
    #[error("TLS configuration error: {0}")]
    TlsConfigError(String),

    /// File read/write failure
    #[error("I/O error on {}: {}", .path.display(), .source)]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PkiError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        PkiError::IoError {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

/// A specialized Result type for minipki operations.
pub type Result<T> = std::result::Result<T, PkiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PkiError::SigningError("test error".to_string());
        assert_eq!(err.to_string(), "Signing error: test error");
    }

    #[test]
    fn test_wrong_key_type_display() {
        let err = PkiError::WrongKeyType {
            expected: "RSA PRIVATE KEY".to_string(),
            found: "CERTIFICATE".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Wrong key type: expected RSA PRIVATE KEY, found CERTIFICATE"
        );
    }

    #[test]
    fn test_io_error_carries_path() {
        let err = PkiError::io(
            "/tmp/missing.pem",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.pem"));
        assert!(msg.contains("no such file"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PkiError>();
    }
}
