//! X.509 certificate assembly and signing using x509-cert.
//!
//! Turns a [`CertificateDescriptor`] into a `TbsCertificate`, signs it with
//! sha256WithRSAEncryption and wraps the result as an
//! [`IssuedCertificate`]. The reverse direction (certificate back to
//! descriptor) lives here too so both sides agree on names and times.

use crate::cert::certificate::IssuedCertificate;
use crate::cert::descriptor::{CertificateDescriptor, DnAttribute, Subject};
use crate::cert::extensions::encode_extensions;
use crate::crypto::rsa::{KeyPair, PublicKey};
use crate::error::{PkiError, Result};
use const_oid::ObjectIdentifier;
use der::asn1::{Any, BitString, GeneralizedTime, PrintableStringRef, SetOfVec, UtcTime};
use der::{DateTime, Decode, Encode, Tag, Tagged};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use std::time::{SystemTime, UNIX_EPOCH};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::certificate::{Certificate, Version};
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber as X509SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::TbsCertificate;

/// sha256WithRSAEncryption
pub(crate) const OID_SHA256_WITH_RSA: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

/// Assemble and sign a certificate.
///
/// # Arguments
///
/// * `descriptor` - Content of the new certificate
/// * `issuer` - Distinguished name of the signer, as encoded in its certificate
/// * `subject_key` - Public key being certified
/// * `authority_key_id` - Issuer's subject key identifier, if any
/// * `signer` - Private key producing the signature
pub(crate) fn sign_descriptor(
    descriptor: &CertificateDescriptor,
    issuer: &Name,
    subject_key: &PublicKey,
    authority_key_id: Option<&[u8]>,
    signer: &KeyPair,
) -> Result<IssuedCertificate> {
    descriptor.validate()?;

    let extensions = encode_extensions(descriptor, authority_key_id)?;
    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: X509SerialNumber::new(descriptor.serial_number.as_bytes()).map_err(
            |e| PkiError::CertificateError(format!("Failed to create serial number: {}", e)),
        )?,
        signature: sha256_with_rsa(),
        issuer: issuer.clone(),
        validity: Validity {
            not_before: encode_time(descriptor.not_before)?,
            not_after: encode_time(descriptor.not_after)?,
        },
        subject: encode_name(&descriptor.subject)?,
        subject_public_key_info: encode_public_key(subject_key)?,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions),
    };

    let signature = sign_tbs(&tbs, signer)?;
    let cert = Certificate {
        tbs_certificate: tbs,
        signature_algorithm: sha256_with_rsa(),
        signature,
    };

    IssuedCertificate::from_certificate(cert)
}

/// The signature algorithm identifier. RSA PKCS#1 v1.5 identifiers carry an
/// explicit NULL parameter.
pub(crate) fn sha256_with_rsa() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: OID_SHA256_WITH_RSA,
        parameters: Some(Any::null()),
    }
}

fn sign_tbs(tbs: &TbsCertificate, signer: &KeyPair) -> Result<BitString> {
    let tbs_der = tbs
        .to_der()
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode TBS: {}", e)))?;

    let signature = signer.sign(&tbs_der)?;

    BitString::from_bytes(&signature).map_err(|e| {
        PkiError::SigningError(format!("Failed to create signature bitstring: {}", e))
    })
}

fn encode_public_key(public_key: &PublicKey) -> Result<SubjectPublicKeyInfoOwned> {
    SubjectPublicKeyInfoOwned::from_der(&public_key.to_spki_der()?)
        .map_err(|e| PkiError::CertificateError(format!("Failed to encode public key: {}", e)))
}

/// One attribute per RDN, in subject order. Country must be a
/// PrintableString; everything else is UTF8String.
pub(crate) fn encode_name(subject: &Subject) -> Result<Name> {
    let mut rdns = Vec::new();

    for (attribute, value) in subject.iter() {
        let value = match attribute {
            DnAttribute::Country => {
                PrintableStringRef::new(value).map_err(|e| {
                    PkiError::CertificateError(format!("Invalid country {}: {}", value, e))
                })?;
                Any::new(Tag::PrintableString, value.as_bytes())
            }
            _ => Any::new(Tag::Utf8String, value.as_bytes()),
        }
        .map_err(|e| PkiError::CertificateError(format!("Invalid {} value: {}", attribute.short_name(), e)))?;

        let atv = AttributeTypeAndValue {
            oid: attribute.oid(),
            value,
        };

        let mut attr_set = SetOfVec::new();
        attr_set
            .insert_ordered(atv)
            .map_err(|e| PkiError::CertificateError(format!("Failed to add attribute: {}", e)))?;
        rdns.push(RelativeDistinguishedName::from(attr_set));
    }

    Ok(RdnSequence(rdns))
}

/// Recover a [`Subject`], keeping attributes in certificate order and
/// skipping attribute types the toolkit does not model.
pub(crate) fn decode_name(name: &Name) -> Result<Subject> {
    let mut subject = Subject::new();

    for rdn in name.0.iter() {
        for atv in rdn.0.iter() {
            let Some(attribute) = DnAttribute::from_oid(&atv.oid) else {
                tracing::trace!(oid = %atv.oid, "skipping unrecognised name attribute");
                continue;
            };

            match atv.value.tag() {
                Tag::Utf8String | Tag::PrintableString | Tag::Ia5String => {}
                other => {
                    return Err(PkiError::ParseError(format!(
                        "Unsupported string type {} for {}",
                        other,
                        attribute.short_name()
                    )))
                }
            }

            let value = std::str::from_utf8(atv.value.value()).map_err(|e| {
                PkiError::ParseError(format!("Invalid {} value: {}", attribute.short_name(), e))
            })?;
            subject.push(attribute, value);
        }
    }

    Ok(subject)
}

/// UTCTime before 2050, GeneralizedTime from 2050 on (RFC 5280 4.1.2.5).
pub(crate) fn encode_time(time: SystemTime) -> Result<Time> {
    let since_epoch = time.duration_since(UNIX_EPOCH).map_err(|_| {
        PkiError::CertificateError("Certificate time predates the Unix epoch".to_string())
    })?;
    let date_time = DateTime::from_unix_duration(since_epoch)
        .map_err(|e| PkiError::CertificateError(format!("Time not representable: {}", e)))?;

    if date_time.year() < 2050 {
        UtcTime::from_date_time(date_time)
            .map(Time::UtcTime)
            .map_err(|e| PkiError::CertificateError(format!("Time not representable: {}", e)))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

pub(crate) fn decode_time(time: &Time) -> SystemTime {
    let since_epoch = match time {
        Time::UtcTime(t) => t.to_unix_duration(),
        Time::GeneralTime(t) => t.to_unix_duration(),
    };
    UNIX_EPOCH + since_epoch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::descriptor::{validity_window, ExtKeyUsage, KeyUsage, SerialNumber};
    use std::time::Duration;

    fn keypair() -> KeyPair {
        KeyPair::generate_with_bits(2048).unwrap()
    }

    fn leaf_descriptor(cn: &str) -> CertificateDescriptor {
        let (not_before, not_after) =
            validity_window(SystemTime::now(), Duration::from_secs(3600)).unwrap();
        CertificateDescriptor {
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
        }
    }

    #[test]
    fn test_name_roundtrip_preserves_order() {
        let mut subject = Subject::common_name("svc.local");
        subject.push(DnAttribute::Organization, "Example Org");
        subject.push(DnAttribute::Country, "US");
        subject.push(DnAttribute::Locality, "Zürich");

        let name = encode_name(&subject).unwrap();
        assert_eq!(name.0.len(), 4);
        assert_eq!(decode_name(&name).unwrap(), subject);
    }

    #[test]
    fn test_invalid_country_rejected() {
        let mut subject = Subject::common_name("svc.local");
        subject.push(DnAttribute::Country, "Ü*");
        assert!(matches!(
            encode_name(&subject),
            Err(PkiError::CertificateError(_))
        ));
    }

    #[test]
    fn test_time_encoding_switches_at_2050() {
        let before = UNIX_EPOCH + Duration::from_secs(2_000_000_000);
        let after = UNIX_EPOCH + Duration::from_secs(2_600_000_000);

        assert!(matches!(encode_time(before).unwrap(), Time::UtcTime(_)));
        assert!(matches!(encode_time(after).unwrap(), Time::GeneralTime(_)));
        assert_eq!(decode_time(&encode_time(before).unwrap()), before);
        assert_eq!(decode_time(&encode_time(after).unwrap()), after);
    }

    #[test]
    fn test_signature_algorithm_has_null_parameters() {
        let algorithm = sha256_with_rsa();
        assert_eq!(algorithm.oid, OID_SHA256_WITH_RSA);
        assert_eq!(algorithm.parameters, Some(Any::null()));
    }

    #[test]
    fn test_sign_descriptor_verifies_with_signer() {
        let signer = keypair();
        let subject_key = keypair();
        let descriptor = leaf_descriptor("leaf");
        let issuer = Subject::common_name("issuer");

        let cert = sign_descriptor(
            &descriptor,
            &encode_name(&issuer).unwrap(),
            subject_key.public_key(),
            None,
            &signer,
        )
        .unwrap();

        assert_eq!(cert.descriptor(), &descriptor);
        assert_eq!(cert.issuer(), &issuer);
        assert_eq!(cert.public_key(), subject_key.public_key());
        assert!(cert.verify_signed_by(signer.public_key()).is_ok());
        assert!(cert.verify_signed_by(subject_key.public_key()).is_err());
    }

    #[test]
    fn test_sign_descriptor_validates_first() {
        let signer = keypair();
        let mut descriptor = leaf_descriptor("leaf");
        descriptor.not_after = descriptor.not_before;

        let result = sign_descriptor(
            &descriptor,
            &encode_name(&Subject::common_name("issuer")).unwrap(),
            signer.public_key(),
            None,
            &signer,
        );
        assert!(matches!(result, Err(PkiError::CertificateError(_))));
    }
}
