//! TLS configuration for mTLS connections.
//!
//! This module assembles Rustls server and client configurations from PEM
//! material on disk. The `ring` crypto provider is passed to every builder
//! explicitly; no process-wide default is installed.

use crate::cert::certificate::IssuedCertificate;
use crate::crypto::rsa::KeyPair;
use crate::error::{PkiError, Result};
use crate::net::pool::TrustPool;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, ServerConfig};
use std::path::Path;
use std::sync::Arc;

/// Whether a server asks connecting clients for certificates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthMode {
    /// No client certificate is requested.
    None,
    /// Clients must present a certificate chaining to the trust pool.
    RequireAndVerify,
}

/// Server-side TLS configuration.
#[derive(Debug, Clone)]
pub struct ServerTrustConfig {
    pub config: Arc<ServerConfig>,
    pub client_auth: ClientAuthMode,
    /// Number of CA certificates trusted for client authentication.
    pub trusted_cas: usize,
}

/// Client-side TLS configuration.
#[derive(Debug, Clone)]
pub struct ClientTrustConfig {
    pub config: Arc<ClientConfig>,
    /// Number of CA certificates trusted for server authentication.
    pub trusted_cas: usize,
}

/// A certificate chain and its private key, as Rustls consumes them.
#[derive(Debug)]
pub struct TlsKeyPair {
    pub chain: Vec<CertificateDer<'static>>,
    pub key: PrivateKeyDer<'static>,
}

/// Load a certificate chain and private key from PEM files.
///
/// Every `CERTIFICATE` block of `cert_path` forms the chain, leaf first. The
/// first private key of `key_path` is used, in PKCS#1, PKCS#8 or SEC1 form.
pub fn load_key_pair(cert_path: &Path, key_path: &Path) -> Result<TlsKeyPair> {
    let cert_pem = std::fs::read(cert_path).map_err(|e| PkiError::io(cert_path, e))?;
    let chain = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            PkiError::ParseError(format!("Failed to read {}: {}", cert_path.display(), e))
        })?;
    if chain.is_empty() {
        return Err(PkiError::ParseError(format!(
            "No certificates found in {}",
            cert_path.display()
        )));
    }

    let key_pem = std::fs::read(key_path).map_err(|e| PkiError::io(key_path, e))?;
    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .map_err(|e| {
            PkiError::ParseError(format!("Failed to read {}: {}", key_path.display(), e))
        })?
        .ok_or_else(|| {
            PkiError::ParseError(format!("No private key found in {}", key_path.display()))
        })?;

    Ok(TlsKeyPair { chain, key })
}

/// Build a server configuration.
///
/// With an empty `ca_cert_paths` no client certificate is requested;
/// otherwise every client must present a certificate signed by one of the
/// listed CAs.
///
/// # Example
///
/// ```rust,no_run
/// use minipki::net::config::{build_server_config, ClientAuthMode};
/// use std::path::Path;
///
/// # fn example() -> minipki::error::Result<()> {
/// let server = build_server_config(
///     &[Path::new("ssl/ca.pem")],
///     Path::new("ssl/srv.pem"),
///     Path::new("ssl/srv.key"),
/// )?;
/// assert_eq!(server.client_auth, ClientAuthMode::RequireAndVerify);
/// # Ok(())
/// # }
/// ```
pub fn build_server_config<P: AsRef<Path>>(
    ca_cert_paths: &[P],
    cert_path: &Path,
    key_path: &Path,
) -> Result<ServerTrustConfig> {
    let pair = load_key_pair(cert_path, key_path)?;
    ensure_key_matches(&pair)?;

    let provider = provider();
    let builder = ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| PkiError::TlsConfigError(format!("Unsupported protocol versions: {}", e)))?;

    let (builder, client_auth, trusted_cas) = if ca_cert_paths.is_empty() {
        (builder.with_no_client_auth(), ClientAuthMode::None, 0)
    } else {
        let pool = TrustPool::from_files(ca_cert_paths)?;
        let trusted_cas = pool.len();
        let verifier =
            WebPkiClientVerifier::builder_with_provider(Arc::new(pool.into_root_store()), provider)
                .build()
                .map_err(|e| {
                    PkiError::TlsConfigError(format!("Failed to build client verifier: {}", e))
                })?;
        (
            builder.with_client_cert_verifier(verifier),
            ClientAuthMode::RequireAndVerify,
            trusted_cas,
        )
    };

    let config = builder
        .with_single_cert(pair.chain, pair.key)
        .map_err(|e| PkiError::TlsConfigError(format!("Failed to build server config: {}", e)))?;

    tracing::debug!(?client_auth, trusted_cas, "built server TLS config");

    Ok(ServerTrustConfig {
        config: Arc::new(config),
        client_auth,
        trusted_cas,
    })
}

/// Build a client configuration presenting `cert_path`/`key_path` and
/// trusting exactly the CA certificates in `ca_cert_path`.
pub fn build_client_config(
    cert_path: &Path,
    key_path: &Path,
    ca_cert_path: &Path,
) -> Result<ClientTrustConfig> {
    let pair = load_key_pair(cert_path, key_path)?;
    ensure_key_matches(&pair)?;

    let pool = TrustPool::from_files(&[ca_cert_path])?;
    let trusted_cas = pool.len();

    let config = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| PkiError::TlsConfigError(format!("Unsupported protocol versions: {}", e)))?
        .with_root_certificates(pool.into_root_store())
        .with_client_auth_cert(pair.chain, pair.key)
        .map_err(|e| PkiError::TlsConfigError(format!("Failed to build client config: {}", e)))?;

    tracing::debug!(trusted_cas, "built client TLS config");

    Ok(ClientTrustConfig {
        config: Arc::new(config),
        trusted_cas,
    })
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Reject an RSA key that does not belong to the leaf certificate. Other key
/// formats are left to Rustls.
fn ensure_key_matches(pair: &TlsKeyPair) -> Result<()> {
    let PrivateKeyDer::Pkcs1(pkcs1) = &pair.key else {
        return Ok(());
    };

    let key = KeyPair::from_pkcs1_der(pkcs1.secret_pkcs1_der())?;
    let leaf = pair
        .chain
        .first()
        .ok_or_else(|| PkiError::TlsConfigError("Empty certificate chain".to_string()))?;
    let leaf = IssuedCertificate::from_der(leaf.as_ref())
        .map_err(|e| PkiError::TlsConfigError(format!("Unusable leaf certificate: {}", e)))?;

    if leaf.public_key() != key.public_key() {
        return Err(PkiError::TlsConfigError(
            "Private key does not match the certificate".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::ca::{create_ca_with_key, sign, CertifiedKey};
    use crate::cert::codec::encode_certificate;
    use crate::cert::descriptor::{
        validity_window, CertificateDescriptor, ExtKeyUsage, KeyUsage, SerialNumber, Subject,
    };
    use crate::storage::files::write_bundle;
    use std::path::PathBuf;
    use std::sync::OnceLock;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn small_key() -> KeyPair {
        KeyPair::generate_with_bits(2048).unwrap()
    }

    fn test_ca() -> &'static CertifiedKey {
        static CA: OnceLock<CertifiedKey> = OnceLock::new();
        CA.get_or_init(|| {
            create_ca_with_key(&Subject::common_name("Config CA"), SystemTime::now(), HOUR, small_key())
                .unwrap()
        })
    }

    fn leaf(cn: &str) -> CertifiedKey {
        let (not_before, not_after) = validity_window(SystemTime::now(), HOUR).unwrap();
        let descriptor = CertificateDescriptor {
            serial_number: SerialNumber::random(),
            subject: Subject::common_name(cn),
            not_before,
            not_after,
            dns_names: vec![cn.to_string()],
            ip_addresses: vec![],
            key_usage: KeyUsage::DIGITAL_SIGNATURE,
            ext_key_usage: vec![ExtKeyUsage::ClientAuth, ExtKeyUsage::ServerAuth],
            is_ca: false,
            basic_constraints_valid: false,
            subject_key_id: None,
        };
        let key = small_key();
        let certificate = sign(test_ca(), &descriptor, key.public_key()).unwrap();
        CertifiedKey { certificate, key }
    }

    struct Fixture {
        _dir: TempDir,
        ca_path: PathBuf,
        cert_path: PathBuf,
        key_path: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let ca_path = dir.path().join("ca.pem");
        std::fs::write(&ca_path, encode_certificate(&test_ca().certificate)).unwrap();
        let written =
            write_bundle(dir.path(), "srv.pem", "srv.key", &leaf("svc.local").to_bundle().unwrap())
                .unwrap();
        Fixture {
            _dir: dir,
            ca_path,
            cert_path: written.cert_path,
            key_path: written.key_path,
        }
    }

    #[test]
    fn test_load_key_pair() {
        let f = fixture();
        let pair = load_key_pair(&f.cert_path, &f.key_path).unwrap();
        assert_eq!(pair.chain.len(), 1);
        assert!(matches!(pair.key, PrivateKeyDer::Pkcs1(_)));
    }

    #[test]
    fn test_load_key_pair_missing_key() {
        let f = fixture();
        // The certificate file holds no private key.
        let result = load_key_pair(&f.cert_path, &f.cert_path);
        assert!(matches!(result, Err(PkiError::ParseError(_))));
    }

    #[test]
    fn test_load_key_pair_empty_chain() {
        let f = fixture();
        let result = load_key_pair(&f.key_path, &f.key_path);
        assert!(matches!(result, Err(PkiError::ParseError(_))));
    }

    #[test]
    fn test_server_config_without_client_auth() {
        let f = fixture();
        let no_cas: [&Path; 0] = [];
        let server = build_server_config(&no_cas, &f.cert_path, &f.key_path).unwrap();
        assert_eq!(server.client_auth, ClientAuthMode::None);
        assert_eq!(server.trusted_cas, 0);
    }

    #[test]
    fn test_server_config_with_client_auth() {
        let f = fixture();
        let server = build_server_config(&[&f.ca_path], &f.cert_path, &f.key_path).unwrap();
        assert_eq!(server.client_auth, ClientAuthMode::RequireAndVerify);
        assert_eq!(server.trusted_cas, 1);
    }

    #[test]
    fn test_server_config_unusable_ca_file() {
        let f = fixture();
        let result = build_server_config(&[&f.key_path], &f.cert_path, &f.key_path);
        assert!(matches!(result, Err(PkiError::TrustPoolError(_))));
    }

    #[test]
    fn test_server_config_mismatched_key() {
        let f = fixture();
        let other = leaf("other.local");
        let other_dir = TempDir::new().unwrap();
        let written =
            write_bundle(other_dir.path(), "o.pem", "o.key", &other.to_bundle().unwrap()).unwrap();

        let result = build_server_config(&[&f.ca_path], &f.cert_path, &written.key_path);
        assert!(matches!(result, Err(PkiError::TlsConfigError(_))));
    }

    #[test]
    fn test_client_config() {
        let f = fixture();
        let client = build_client_config(&f.cert_path, &f.key_path, &f.ca_path).unwrap();
        assert_eq!(client.trusted_cas, 1);
    }

    #[test]
    fn test_client_config_unusable_ca_file() {
        let f = fixture();
        let result = build_client_config(&f.cert_path, &f.key_path, &f.key_path);
        assert!(matches!(result, Err(PkiError::TrustPoolError(_))));
    }

    #[test]
    fn test_client_config_missing_ca() {
        let f = fixture();
        let missing = f.ca_path.with_file_name("missing.pem");
        match build_client_config(&f.cert_path, &f.key_path, &missing) {
            Err(PkiError::IoError { path, .. }) => assert_eq!(path, missing),
            _ => panic!("Expected IoError"),
        }
    }
}
