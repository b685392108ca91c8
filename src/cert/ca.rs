//! Root CA operations.
//!
//! The CA is an ordinary [`CertifiedKey`] whose certificate carries the CA
//! flag. Nothing is cached; every call receives the CA material it needs.

use crate::cert::certificate::IssuedCertificate;
use crate::cert::codec::{encode_certificate, encode_private_key, SerializedCertBundle};
use crate::cert::descriptor::{
    validity_window, CertificateDescriptor, ExtKeyUsage, KeyUsage, SerialNumber, Subject,
};
use crate::cert::x509_signing::{encode_name, sign_descriptor};
use crate::crypto::rsa::{KeyPair, PublicKey};
use crate::error::{PkiError, Result};
use std::time::{Duration, SystemTime};

/// A certificate together with the key pair it certifies.
#[derive(Debug, Clone)]
pub struct CertifiedKey {
    pub certificate: IssuedCertificate,
    pub key: KeyPair,
}

impl CertifiedKey {
    /// PEM-encode the certificate and the (unencrypted) private key.
    pub fn to_bundle(&self) -> Result<SerializedCertBundle> {
        Ok(SerializedCertBundle {
            cert: encode_certificate(&self.certificate),
            key: encode_private_key(&self.key)?,
        })
    }
}

/// Create a self-signed root CA with a fresh 4096-bit key.
///
/// # Arguments
///
/// * `subject` - Distinguished name of the CA, used as issuer too
/// * `not_before` - Start of validity (truncated to the second)
/// * `duration` - Validity length
///
/// # Example
///
/// ```rust,no_run
/// use minipki::cert::ca::create_ca;
/// use minipki::cert::descriptor::Subject;
/// use std::time::{Duration, SystemTime};
///
/// # fn example() -> minipki::error::Result<()> {
/// let ca = create_ca(&Subject::common_name("root"), SystemTime::now(), Duration::from_secs(86400))?;
/// assert!(ca.certificate.is_self_signed());
/// # Ok(())
/// # }
/// ```
pub fn create_ca(subject: &Subject, not_before: SystemTime, duration: Duration) -> Result<CertifiedKey> {
    let key = KeyPair::generate()?;
    create_ca_with_key(subject, not_before, duration, key)
}

pub(crate) fn create_ca_with_key(
    subject: &Subject,
    not_before: SystemTime,
    duration: Duration,
    key: KeyPair,
) -> Result<CertifiedKey> {
    let (not_before, not_after) = validity_window(not_before, duration)?;

    let descriptor = CertificateDescriptor {
        serial_number: SerialNumber::random(),
        subject: subject.clone(),
        not_before,
        not_after,
        dns_names: Vec::new(),
        ip_addresses: Vec::new(),
        key_usage: KeyUsage::DIGITAL_SIGNATURE | KeyUsage::CERT_SIGN,
        ext_key_usage: vec![ExtKeyUsage::ClientAuth, ExtKeyUsage::ServerAuth],
        is_ca: true,
        basic_constraints_valid: true,
        subject_key_id: Some(key.public_key().key_identifier()?),
    };

    let certificate = sign_descriptor(
        &descriptor,
        &encode_name(subject)?,
        key.public_key(),
        None,
        &key,
    )?;
    tracing::info!(
        subject = %subject,
        serial = %descriptor.serial_number,
        "created root CA"
    );

    Ok(CertifiedKey { certificate, key })
}

/// Sign `descriptor` with the CA, certifying `subject_public_key`.
///
/// The issuer is the CA's subject and, when the CA has a subject key
/// identifier, the result carries it as its authority key identifier.
///
/// # Errors
///
/// * [`PkiError::SigningError`] if the CA certificate cannot issue, or the CA
///   key does not belong to the CA certificate
/// * [`PkiError::CertificateError`] if the descriptor is invalid or claims to
///   be a CA
pub fn sign(
    ca: &CertifiedKey,
    descriptor: &CertificateDescriptor,
    subject_public_key: &PublicKey,
) -> Result<IssuedCertificate> {
    if !ca.certificate.descriptor().can_sign_certificates() {
        return Err(PkiError::SigningError(format!(
            "{} is not a certificate authority",
            ca.certificate.subject()
        )));
    }
    if ca.key.public_key() != ca.certificate.public_key() {
        return Err(PkiError::SigningError(
            "CA private key does not match the CA certificate".to_string(),
        ));
    }
    if descriptor.is_ca {
        return Err(PkiError::CertificateError(
            "Only leaf certificates can be issued by the root CA".to_string(),
        ));
    }

    let certificate = sign_descriptor(
        descriptor,
        ca.certificate.subject_name(),
        subject_public_key,
        ca.certificate.descriptor().subject_key_id.as_deref(),
        &ca.key,
    )?;

    tracing::info!(
        subject = %descriptor.subject,
        issuer = %ca.certificate.subject(),
        serial = %descriptor.serial_number,
        "issued certificate"
    );

    Ok(certificate)
}
