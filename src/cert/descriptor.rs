//! Logical certificate content.
//!
//! A [`CertificateDescriptor`] is what gets signed: subject, validity window,
//! SANs, usages and the CA flag. CA and leaf certificates share this one type
//! and differ only in their flags.

use crate::error::{PkiError, Result};
use const_oid::ObjectIdentifier;
use rand::RngCore;
use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const OID_CN: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const OID_C: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
const OID_L: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
const OID_ST: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
const OID_O: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
const OID_OU: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");

const OID_KP_SERVER_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.1");
const OID_KP_CLIENT_AUTH: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.2");

/// Length of generated serial numbers, the RFC 5280 maximum.
const SERIAL_LENGTH: usize = 20;

/// Distinguished name attributes understood by the toolkit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnAttribute {
    CommonName,
    Country,
    Organization,
    OrganizationalUnit,
    StateOrProvince,
    Locality,
}

impl DnAttribute {
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DnAttribute::CommonName => OID_CN,
            DnAttribute::Country => OID_C,
            DnAttribute::Organization => OID_O,
            DnAttribute::OrganizationalUnit => OID_OU,
            DnAttribute::StateOrProvince => OID_ST,
            DnAttribute::Locality => OID_L,
        }
    }

    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [
            DnAttribute::CommonName,
            DnAttribute::Country,
            DnAttribute::Organization,
            DnAttribute::OrganizationalUnit,
            DnAttribute::StateOrProvince,
            DnAttribute::Locality,
        ]
        .into_iter()
        .find(|attr| attr.oid() == *oid)
    }

    /// The short name used in `CN=...,O=...` strings.
    pub fn short_name(&self) -> &'static str {
        match self {
            DnAttribute::CommonName => "CN",
            DnAttribute::Country => "C",
            DnAttribute::Organization => "O",
            DnAttribute::OrganizationalUnit => "OU",
            DnAttribute::StateOrProvince => "ST",
            DnAttribute::Locality => "L",
        }
    }

    pub fn from_short_name(name: &str) -> Option<Self> {
        match name.to_uppercase().as_str() {
            "CN" => Some(DnAttribute::CommonName),
            "C" => Some(DnAttribute::Country),
            "O" => Some(DnAttribute::Organization),
            "OU" => Some(DnAttribute::OrganizationalUnit),
            "ST" => Some(DnAttribute::StateOrProvince),
            "L" => Some(DnAttribute::Locality),
            _ => None,
        }
    }
}

/// An ordered distinguished name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    attributes: Vec<(DnAttribute, String)>,
}

impl Subject {
    pub fn new() -> Self {
        Self::default()
    }

    /// A subject consisting of a single Common Name.
    pub fn common_name(cn: impl Into<String>) -> Self {
        let mut subject = Self::new();
        subject.push(DnAttribute::CommonName, cn);
        subject
    }

    pub fn push(&mut self, attribute: DnAttribute, value: impl Into<String>) {
        self.attributes.push((attribute, value.into()));
    }

    /// First value of `attribute`, if present.
    pub fn get(&self, attribute: DnAttribute) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| *attr == attribute)
            .map(|(_, value)| value.as_str())
    }

    /// The Common Name, if present.
    pub fn cn(&self) -> Option<&str> {
        self.get(DnAttribute::CommonName)
    }

    pub fn iter(&self) -> impl Iterator<Item = (DnAttribute, &str)> {
        self.attributes
            .iter()
            .map(|(attr, value)| (*attr, value.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (attr, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", attr.short_name(), value)?;
        }
        Ok(())
    }
}

/// A positive certificate serial number, big-endian.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SerialNumber(Vec<u8>);

impl SerialNumber {
    /// A random 20 byte serial whose first byte is in `0x01..=0x7f`, so the
    /// DER encoding is positive and never needs a padding byte.
    pub fn random() -> Self {
        let mut bytes = [0u8; SERIAL_LENGTH];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes[0] = (bytes[0] & 0x7F).max(1);
        SerialNumber(bytes.to_vec())
    }

    /// Wrap big-endian bytes as decoded from a certificate.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || bytes.len() > SERIAL_LENGTH + 1 {
            return Err(PkiError::ParseError(format!(
                "Invalid serial number length: {}",
                bytes.len()
            )));
        }
        Ok(SerialNumber(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerialNumber({})", self)
    }
}

bitflags::bitflags! {
    /// RFC 5280 key usage bits; bit `n` is the `n`th named bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyUsage: u16 {
        const DIGITAL_SIGNATURE = 1 << 0;
        const CONTENT_COMMITMENT = 1 << 1;
        const KEY_ENCIPHERMENT = 1 << 2;
        const DATA_ENCIPHERMENT = 1 << 3;
        const KEY_AGREEMENT = 1 << 4;
        const CERT_SIGN = 1 << 5;
        const CRL_SIGN = 1 << 6;
        const ENCIPHER_ONLY = 1 << 7;
        const DECIPHER_ONLY = 1 << 8;
    }
}

/// Extended key usage purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtKeyUsage {
    ClientAuth,
    ServerAuth,
    /// Any purpose found in a foreign certificate.
    Other(ObjectIdentifier),
}

impl ExtKeyUsage {
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            ExtKeyUsage::ClientAuth => OID_KP_CLIENT_AUTH,
            ExtKeyUsage::ServerAuth => OID_KP_SERVER_AUTH,
            ExtKeyUsage::Other(oid) => *oid,
        }
    }

    pub fn from_oid(oid: ObjectIdentifier) -> Self {
        if oid == OID_KP_CLIENT_AUTH {
            ExtKeyUsage::ClientAuth
        } else if oid == OID_KP_SERVER_AUTH {
            ExtKeyUsage::ServerAuth
        } else {
            ExtKeyUsage::Other(oid)
        }
    }
}

/// The content of a certificate, signed or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateDescriptor {
    pub serial_number: SerialNumber,
    pub subject: Subject,
    pub not_before: SystemTime,
    pub not_after: SystemTime,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub key_usage: KeyUsage,
    pub ext_key_usage: Vec<ExtKeyUsage>,
    pub is_ca: bool,
    pub basic_constraints_valid: bool,
    pub subject_key_id: Option<Vec<u8>>,
}

impl CertificateDescriptor {
    /// Check the invariants every descriptor must hold before signing.
    pub fn validate(&self) -> Result<()> {
        if self.subject.is_empty() {
            return Err(PkiError::CertificateError(
                "Subject cannot be empty".to_string(),
            ));
        }
        if self.not_after <= self.not_before {
            return Err(PkiError::CertificateError(
                "not_after must be later than not_before".to_string(),
            ));
        }
        if self.is_ca {
            if !self.basic_constraints_valid {
                return Err(PkiError::CertificateError(
                    "CA certificates require valid basic constraints".to_string(),
                ));
            }
            if !self.permits_cert_signing() {
                return Err(PkiError::CertificateError(
                    "CA certificates require the certificate-signing key usage".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Validity length, `not_after - not_before`.
    pub fn validity(&self) -> Duration {
        self.not_after
            .duration_since(self.not_before)
            .unwrap_or_default()
    }

    /// Whether this descriptor can act as an issuer.
    ///
    /// A certificate without a key usage extension is unrestricted, so a CA
    /// that omits it (the `openssl req -x509` default) can still issue.
    pub fn can_sign_certificates(&self) -> bool {
        self.is_ca && self.basic_constraints_valid && self.permits_cert_signing()
    }

    fn permits_cert_signing(&self) -> bool {
        self.key_usage.is_empty() || self.key_usage.contains(KeyUsage::CERT_SIGN)
    }
}

/// Compute a `(not_before, not_after)` window.
///
/// Certificates carry whole seconds, so `not_before` is truncated and
/// `duration` must be a positive whole number of seconds; this keeps
/// `not_after == not_before + duration` exact after encoding.
pub fn validity_window(not_before: SystemTime, duration: Duration) -> Result<(SystemTime, SystemTime)> {
    if duration.is_zero() {
        return Err(PkiError::CertificateError(
            "Validity duration must be positive".to_string(),
        ));
    }
    if duration.subsec_nanos() != 0 {
        return Err(PkiError::CertificateError(
            "Validity duration must be a whole number of seconds".to_string(),
        ));
    }

    let since_epoch = not_before.duration_since(UNIX_EPOCH).map_err(|_| {
        PkiError::CertificateError("not_before predates the Unix epoch".to_string())
    })?;
    let not_before = UNIX_EPOCH + Duration::from_secs(since_epoch.as_secs());
    let not_after = not_before.checked_add(duration).ok_or_else(|| {
        PkiError::CertificateError("Validity window overflows".to_string())
    })?;

    Ok((not_before, not_after))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_descriptor() -> CertificateDescriptor {
        let (not_before, not_after) =
            validity_window(SystemTime::now(), Duration::from_secs(3600)).unwrap();
        CertificateDescriptor {
            serial_number: SerialNumber::random(),
            subject: Subject::common_name("leaf"),
            not_before,
            not_after,
            dns_names: vec![],
            ip_addresses: vec![],
            key_usage: KeyUsage::DIGITAL_SIGNATURE,
            ext_key_usage: vec![ExtKeyUsage::ClientAuth, ExtKeyUsage::ServerAuth],
            is_ca: false,
            basic_constraints_valid: false,
            subject_key_id: None,
        }
    }

    #[test]
    fn test_subject_display() {
        let mut subject = Subject::common_name("example.com");
        subject.push(DnAttribute::Organization, "Example Org");
        assert_eq!(subject.to_string(), "CN=example.com,O=Example Org");
        assert_eq!(subject.cn(), Some("example.com"));
        assert_eq!(subject.get(DnAttribute::Country), None);
    }

    #[test]
    fn test_dn_attribute_lookup() {
        for attr in [
            DnAttribute::CommonName,
            DnAttribute::Country,
            DnAttribute::Organization,
            DnAttribute::OrganizationalUnit,
            DnAttribute::StateOrProvince,
            DnAttribute::Locality,
        ] {
            assert_eq!(DnAttribute::from_oid(&attr.oid()), Some(attr));
            assert_eq!(DnAttribute::from_short_name(attr.short_name()), Some(attr));
        }
        assert_eq!(DnAttribute::from_short_name("cn"), Some(DnAttribute::CommonName));
        assert_eq!(DnAttribute::from_short_name("XX"), None);
    }

    #[test]
    fn test_serial_number_random() {
        let serial1 = SerialNumber::random();
        let serial2 = SerialNumber::random();

        assert_eq!(serial1.as_bytes().len(), SERIAL_LENGTH);
        assert!(serial1.as_bytes()[0] >= 0x01 && serial1.as_bytes()[0] <= 0x7F);
        assert_ne!(serial1, serial2);
    }

    #[test]
    fn test_serial_number_display() {
        let serial = SerialNumber::from_bytes(&[0x07, 0xe5]).unwrap();
        assert_eq!(serial.to_string(), "07:e5");
        assert!(SerialNumber::from_bytes(&[]).is_err());
    }

    #[test]
    fn test_ext_key_usage_oids() {
        assert_eq!(
            ExtKeyUsage::from_oid(ExtKeyUsage::ClientAuth.oid()),
            ExtKeyUsage::ClientAuth
        );
        assert_eq!(
            ExtKeyUsage::from_oid(ExtKeyUsage::ServerAuth.oid()),
            ExtKeyUsage::ServerAuth
        );
        let code_signing = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.3");
        assert_eq!(
            ExtKeyUsage::from_oid(code_signing),
            ExtKeyUsage::Other(code_signing)
        );
    }

    #[test]
    fn test_validity_window_exact() {
        let start = UNIX_EPOCH + Duration::from_millis(1_700_000_000_750);
        let (not_before, not_after) = validity_window(start, Duration::from_secs(86400)).unwrap();

        assert_eq!(not_before, UNIX_EPOCH + Duration::from_secs(1_700_000_000));
        assert_eq!(not_after, not_before + Duration::from_secs(86400));
        assert!(not_after > not_before);
    }

    #[test]
    fn test_validity_window_rejects_zero_and_fractional() {
        let now = SystemTime::now();
        assert!(matches!(
            validity_window(now, Duration::ZERO),
            Err(PkiError::CertificateError(_))
        ));
        assert!(matches!(
            validity_window(now, Duration::from_millis(1500)),
            Err(PkiError::CertificateError(_))
        ));
    }

    #[test]
    fn test_validate_leaf() {
        let descriptor = sample_descriptor();
        assert!(descriptor.validate().is_ok());
        assert!(!descriptor.can_sign_certificates());
        assert_eq!(descriptor.validity(), Duration::from_secs(3600));
    }

    #[test]
    fn test_validate_empty_subject() {
        let mut descriptor = sample_descriptor();
        descriptor.subject = Subject::new();
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_validate_inverted_window() {
        let mut descriptor = sample_descriptor();
        descriptor.not_after = descriptor.not_before;
        assert!(descriptor.validate().is_err());
    }

    #[test]
    fn test_validate_ca_requires_cert_sign() {
        let mut descriptor = sample_descriptor();
        descriptor.is_ca = true;
        descriptor.basic_constraints_valid = true;
        assert!(descriptor.validate().is_err());

        descriptor.key_usage |= KeyUsage::CERT_SIGN;
        assert!(descriptor.validate().is_ok());
        assert!(descriptor.can_sign_certificates());
    }

    #[test]
    fn test_ca_without_key_usage_can_sign() {
        let mut descriptor = sample_descriptor();
        descriptor.is_ca = true;
        descriptor.basic_constraints_valid = true;
        descriptor.key_usage = KeyUsage::empty();

        assert!(descriptor.validate().is_ok());
        assert!(descriptor.can_sign_certificates());

        descriptor.basic_constraints_valid = false;
        assert!(!descriptor.can_sign_certificates());
    }

    #[test]
    fn test_validate_ca_requires_basic_constraints() {
        let mut descriptor = sample_descriptor();
        descriptor.is_ca = true;
        descriptor.key_usage |= KeyUsage::CERT_SIGN;
        assert!(descriptor.validate().is_err());
    }
}
