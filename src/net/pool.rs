//! Trusted CA certificate pools.

use crate::error::{PkiError, Result};
use rustls::pki_types::CertificateDer;
use rustls::RootCertStore;
use std::path::Path;

/// CA certificates trusted to sign peer certificates.
#[derive(Debug, Clone)]
pub struct TrustPool {
    roots: RootCertStore,
}

impl TrustPool {
    /// An empty pool.
    pub fn new() -> Self {
        Self {
            roots: RootCertStore::empty(),
        }
    }

    /// Build a pool from PEM files, each holding one or more CA certificates.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut pool = Self::new();
        for path in paths {
            let path = path.as_ref();
            let pem = std::fs::read(path).map_err(|e| PkiError::io(path, e))?;
            let added = pool.append_pem(&pem).map_err(|e| match e {
                PkiError::TrustPoolError(msg) => {
                    PkiError::TrustPoolError(format!("{}: {}", path.display(), msg))
                }
                other => other,
            })?;
            tracing::debug!(path = %path.display(), added, "added CA certificates to trust pool");
        }
        Ok(pool)
    }

    /// Add every usable `CERTIFICATE` block in `pem`, returning how many were
    /// added.
    ///
    /// Fails if the PEM is malformed or contributes no usable certificate.
    pub fn append_pem(&mut self, pem: &[u8]) -> Result<usize> {
        let certs = rustls_pemfile::certs(&mut &pem[..])
            .collect::<std::result::Result<Vec<CertificateDer<'static>>, _>>()
            .map_err(|e| PkiError::TrustPoolError(format!("Failed to read PEM: {}", e)))?;

        if certs.is_empty() {
            return Err(PkiError::TrustPoolError(
                "No certificates found in PEM".to_string(),
            ));
        }

        let (added, ignored) = self.roots.add_parsable_certificates(certs);
        if ignored > 0 {
            tracing::debug!(ignored, "skipped unparsable CA certificates");
        }
        if added == 0 {
            return Err(PkiError::TrustPoolError(
                "No usable CA certificates found in PEM".to_string(),
            ));
        }

        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn into_root_store(self) -> RootCertStore {
        self.roots
    }
}

impl Default for TrustPool {
    fn default() -> Self {
        Self::new()
    }
}
