//! Certificate request builder.
//!
//! A [`CertificateRequest`] pairs an unsigned leaf descriptor with the fresh
//! key pair it will certify. Nothing here signs; hand the request to
//! [`crate::cert::ca::sign`].

use crate::cert::descriptor::{
    validity_window, CertificateDescriptor, DnAttribute, ExtKeyUsage, KeyUsage, SerialNumber,
    Subject,
};
use crate::crypto::rsa::KeyPair;
use crate::error::{PkiError, Result};
use std::net::IpAddr;
use std::time::{Duration, SystemTime};

/// Subject key identifier stamped on every request.
///
/// Leaf certificates are never used as issuers, so the identifier only has to
/// be present, not unique.
pub const PLACEHOLDER_SUBJECT_KEY_ID: [u8; 6] = [1, 2, 3, 4, 5, 6];

/// An unsigned certificate and its key pair.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub descriptor: CertificateDescriptor,
    pub key: KeyPair,
}

/// Build a leaf certificate request.
///
/// Generates a 4096-bit key. The descriptor asks for digital signatures,
/// both client and server authentication, and the given SANs, valid for
/// `duration` from `not_before` (truncated to the second).
///
/// # Arguments
///
/// * `subject` - Distinguished name of the leaf
/// * `dns_names` - DNS subject alternative names, in order
/// * `ip_addresses` - IP subject alternative names, in order
/// * `not_before` - Start of validity
/// * `duration` - Validity length, a positive whole number of seconds
///
/// # Example
///
/// ```rust,no_run
/// use minipki::cert::builder::build;
/// use minipki::cert::descriptor::Subject;
/// use std::time::{Duration, SystemTime};
///
/// # fn example() -> minipki::error::Result<()> {
/// let request = build(
///     &Subject::common_name("svc.local"),
///     &["svc.local".to_string()],
///     &["127.0.0.1".parse().unwrap()],
///     SystemTime::now(),
///     Duration::from_secs(24 * 3600),
/// )?;
/// assert!(!request.descriptor.is_ca);
/// # Ok(())
/// # }
/// ```
pub fn build(
    subject: &Subject,
    dns_names: &[String],
    ip_addresses: &[IpAddr],
    not_before: SystemTime,
    duration: Duration,
) -> Result<CertificateRequest> {
    let descriptor = leaf_descriptor(subject, dns_names, ip_addresses, not_before, duration)?;
    let key = KeyPair::generate()?;

    tracing::debug!(
        subject = %descriptor.subject,
        serial = %descriptor.serial_number,
        "built certificate request"
    );

    Ok(CertificateRequest { descriptor, key })
}

fn leaf_descriptor(
    subject: &Subject,
    dns_names: &[String],
    ip_addresses: &[IpAddr],
    not_before: SystemTime,
    duration: Duration,
) -> Result<CertificateDescriptor> {
    let (not_before, not_after) = validity_window(not_before, duration)?;

    let descriptor = CertificateDescriptor {
        serial_number: SerialNumber::random(),
        subject: subject.clone(),
        not_before,
        not_after,
        dns_names: dns_names.to_vec(),
        ip_addresses: ip_addresses.to_vec(),
        key_usage: KeyUsage::DIGITAL_SIGNATURE,
        ext_key_usage: vec![ExtKeyUsage::ClientAuth, ExtKeyUsage::ServerAuth],
        is_ca: false,
        basic_constraints_valid: false,
        subject_key_id: Some(PLACEHOLDER_SUBJECT_KEY_ID.to_vec()),
    };
    descriptor.validate()?;

    Ok(descriptor)
}

/// Parse a subject string (e.g., "CN=example.com,O=Example Org") into a [`Subject`].
///
/// # Example
///
/// ```
/// use minipki::cert::builder::parse_subject;
///
/// let subject = parse_subject("CN=example.com,O=Example Org").unwrap();
/// assert_eq!(subject.cn(), Some("example.com"));
/// ```
pub fn parse_subject(subject: &str) -> Result<Subject> {
    let mut dn = Subject::new();

    for part in subject.split(',') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            let key = key.trim();
            let value = value.trim();

            let attribute = DnAttribute::from_short_name(key)
                .ok_or_else(|| PkiError::ParseError(format!("Unknown DN type: {}", key)))?;

            dn.push(attribute, value);
        } else {
            return Err(PkiError::ParseError(format!(
                "Invalid subject format: {}",
                part
            )));
        }
    }

    if dn.is_empty() {
        return Err(PkiError::ParseError("Subject cannot be empty".to_string()));
    }

    Ok(dn)
}
