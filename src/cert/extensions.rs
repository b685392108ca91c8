//! X.509 v3 extension encoding and decoding.
//!
//! Only the extensions the PKI emits are understood: key usage, extended key
//! usage, basic constraints, subject/authority key identifiers and subject
//! alternative names. Anything else in a foreign certificate is skipped.

use crate::cert::descriptor::{CertificateDescriptor, ExtKeyUsage, KeyUsage};
use crate::error::{PkiError, Result};
use const_oid::ObjectIdentifier;
use der::asn1::{BitString, Ia5String, OctetString};
use der::{Decode, Encode};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, SubjectAltName,
    SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;

const OID_SUBJECT_KEY_ID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.14");
const OID_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.15");
const OID_SUBJECT_ALT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.17");
const OID_BASIC_CONSTRAINTS: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.19");
const OID_AUTHORITY_KEY_ID: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.35");
const OID_EXT_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37");

/// Highest named bit of the key usage BIT STRING.
const KEY_USAGE_BITS: usize = 9;

/// Extension content recovered from a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecodedExtensions {
    pub key_usage: KeyUsage,
    pub ext_key_usage: Vec<ExtKeyUsage>,
    pub is_ca: bool,
    pub basic_constraints_valid: bool,
    pub subject_key_id: Option<Vec<u8>>,
    pub authority_key_id: Option<Vec<u8>>,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
}

/// Build the extension list for `descriptor`.
pub(crate) fn encode_extensions(
    descriptor: &CertificateDescriptor,
    authority_key_id: Option<&[u8]>,
) -> Result<Vec<Extension>> {
    let mut extensions = Vec::new();

    if !descriptor.key_usage.is_empty() {
        extensions.push(extension(
            OID_KEY_USAGE,
            true,
            &encode_key_usage(descriptor.key_usage)?,
        )?);
    }

    if !descriptor.ext_key_usage.is_empty() {
        let usages = ExtendedKeyUsage(descriptor.ext_key_usage.iter().map(|u| u.oid()).collect());
        extensions.push(extension(OID_EXT_KEY_USAGE, false, &usages)?);
    }

    if descriptor.basic_constraints_valid {
        let constraints = BasicConstraints {
            ca: descriptor.is_ca,
            path_len_constraint: None,
        };
        extensions.push(extension(OID_BASIC_CONSTRAINTS, true, &constraints)?);
    }

    if let Some(ski) = &descriptor.subject_key_id {
        let ski = SubjectKeyIdentifier(octet_string(ski)?);
        extensions.push(extension(OID_SUBJECT_KEY_ID, false, &ski)?);
    }

    if let Some(aki) = authority_key_id {
        let aki = AuthorityKeyIdentifier {
            key_identifier: Some(octet_string(aki)?),
            authority_cert_issuer: None,
            authority_cert_serial_number: None,
        };
        extensions.push(extension(OID_AUTHORITY_KEY_ID, false, &aki)?);
    }

    if !descriptor.dns_names.is_empty() || !descriptor.ip_addresses.is_empty() {
        let mut names = Vec::new();
        for dns in &descriptor.dns_names {
            let name = Ia5String::new(dns).map_err(|e| {
                PkiError::CertificateError(format!("Invalid DNS name {}: {}", dns, e))
            })?;
            names.push(GeneralName::DnsName(name));
        }
        for ip in &descriptor.ip_addresses {
            let octets = match ip {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => v6.octets().to_vec(),
            };
            names.push(GeneralName::IpAddress(octet_string(&octets)?));
        }
        extensions.push(extension(OID_SUBJECT_ALT_NAME, false, &SubjectAltName(names))?);
    }

    Ok(extensions)
}

/// Recover the understood extensions from a parsed certificate.
pub(crate) fn decode_extensions(extensions: Option<&Vec<Extension>>) -> Result<DecodedExtensions> {
    let mut decoded = DecodedExtensions {
        key_usage: KeyUsage::empty(),
        ext_key_usage: Vec::new(),
        is_ca: false,
        basic_constraints_valid: false,
        subject_key_id: None,
        authority_key_id: None,
        dns_names: Vec::new(),
        ip_addresses: Vec::new(),
    };

    for ext in extensions.into_iter().flatten() {
        let value = ext.extn_value.as_bytes();
        match ext.extn_id {
            id if id == OID_KEY_USAGE => {
                let bits = BitString::from_der(value).map_err(|e| parse_error("key usage", e))?;
                decoded.key_usage = decode_key_usage(&bits);
            }
            id if id == OID_EXT_KEY_USAGE => {
                let usages =
                    ExtendedKeyUsage::from_der(value).map_err(|e| parse_error("extended key usage", e))?;
                decoded.ext_key_usage = usages.0.into_iter().map(ExtKeyUsage::from_oid).collect();
            }
            id if id == OID_BASIC_CONSTRAINTS => {
                let constraints = BasicConstraints::from_der(value)
                    .map_err(|e| parse_error("basic constraints", e))?;
                decoded.basic_constraints_valid = true;
                decoded.is_ca = constraints.ca;
            }
            id if id == OID_SUBJECT_KEY_ID => {
                let ski = SubjectKeyIdentifier::from_der(value)
                    .map_err(|e| parse_error("subject key identifier", e))?;
                decoded.subject_key_id = Some(ski.0.as_bytes().to_vec());
            }
            id if id == OID_AUTHORITY_KEY_ID => {
                let aki = AuthorityKeyIdentifier::from_der(value)
                    .map_err(|e| parse_error("authority key identifier", e))?;
                decoded.authority_key_id = aki.key_identifier.map(|id| id.as_bytes().to_vec());
            }
            id if id == OID_SUBJECT_ALT_NAME => {
                let san = SubjectAltName::from_der(value)
                    .map_err(|e| parse_error("subject alternative name", e))?;
                for name in san.0 {
                    match name {
                        GeneralName::DnsName(dns) => decoded.dns_names.push(dns.to_string()),
                        GeneralName::IpAddress(octets) => {
                            decoded.ip_addresses.push(decode_ip(octets.as_bytes())?)
                        }
                        _ => {}
                    }
                }
            }
            other => {
                tracing::trace!(oid = %other, "skipping unrecognised extension");
            }
        }
    }

    Ok(decoded)
}

fn extension<T: Encode>(oid: ObjectIdentifier, critical: bool, value: &T) -> Result<Extension> {
    let der = value.to_der().map_err(|e| {
        PkiError::CertificateError(format!("Failed to encode extension {}: {}", oid, e))
    })?;
    Ok(Extension {
        extn_id: oid,
        critical,
        extn_value: octet_string(&der)?,
    })
}

fn octet_string(bytes: &[u8]) -> Result<OctetString> {
    OctetString::new(bytes)
        .map_err(|e| PkiError::CertificateError(format!("Failed to create octet string: {}", e)))
}

fn parse_error(what: &str, e: der::Error) -> PkiError {
    PkiError::ParseError(format!("Invalid {} extension: {}", what, e))
}

/// Named bit `n` lives in byte `n / 8` under mask `0x80 >> (n % 8)`. DER
/// drops trailing zero bits, so the string ends at the highest set bit.
fn encode_key_usage(usage: KeyUsage) -> Result<BitString> {
    let highest = (0..KEY_USAGE_BITS)
        .rev()
        .find(|bit| usage.bits() & (1 << bit) != 0)
        .ok_or_else(|| PkiError::CertificateError("Key usage cannot be empty".to_string()))?;

    let mut bytes = vec![0u8; highest / 8 + 1];
    for bit in 0..=highest {
        if usage.bits() & (1 << bit) != 0 {
            bytes[bit / 8] |= 0x80 >> (bit % 8);
        }
    }
    let unused_bits = (7 - highest % 8) as u8;

    BitString::new(unused_bits, bytes)
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode key usage: {}", e)))
}

fn decode_key_usage(bits: &BitString) -> KeyUsage {
    let bytes = bits.raw_bytes();
    let len = (bytes.len() * 8).saturating_sub(bits.unused_bits() as usize);

    let mut value = 0u16;
    for bit in 0..len.min(KEY_USAGE_BITS) {
        if bytes[bit / 8] & (0x80 >> (bit % 8)) != 0 {
            value |= 1 << bit;
        }
    }
    KeyUsage::from_bits_truncate(value)
}

fn decode_ip(octets: &[u8]) -> Result<IpAddr> {
    if let Ok(v4) = <[u8; 4]>::try_from(octets) {
        return Ok(IpAddr::V4(Ipv4Addr::from(v4)));
    }
    if let Ok(v6) = <[u8; 16]>::try_from(octets) {
        return Ok(IpAddr::V6(Ipv6Addr::from(v6)));
    }
    Err(PkiError::ParseError(format!(
        "Invalid IP address length in SAN: {}",
        octets.len()
    )))
}
