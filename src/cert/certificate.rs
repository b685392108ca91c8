//! Signed certificates.

use crate::cert::descriptor::{CertificateDescriptor, SerialNumber, Subject};
use crate::cert::extensions::decode_extensions;
use crate::cert::x509_signing::{decode_name, decode_time, OID_SHA256_WITH_RSA};
use crate::crypto::rsa::PublicKey;
use crate::error::{PkiError, Result};
use der::{Decode, Encode};
use x509_cert::certificate::Certificate;
use x509_cert::name::Name;

/// A signed X.509 certificate together with its decoded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCertificate {
    certificate: Certificate,
    der: Vec<u8>,
    descriptor: CertificateDescriptor,
    issuer: Subject,
    public_key: PublicKey,
    authority_key_id: Option<Vec<u8>>,
}

impl IssuedCertificate {
    /// Parse a DER certificate.
    ///
    /// Fails with `ParseError` if the bytes are not a single well-formed
    /// certificate with an RSA subject key.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let certificate = Certificate::from_der(der)
            .map_err(|e| PkiError::ParseError(format!("Failed to decode certificate: {}", e)))?;
        Self::from_parts(certificate, der.to_vec())
    }

    pub(crate) fn from_certificate(certificate: Certificate) -> Result<Self> {
        let der = certificate.to_der().map_err(|e| {
            PkiError::CertificateError(format!("Failed to encode certificate: {}", e))
        })?;
        Self::from_parts(certificate, der)
    }

    fn from_parts(certificate: Certificate, der: Vec<u8>) -> Result<Self> {
        let tbs = &certificate.tbs_certificate;

        let spki_der = tbs.subject_public_key_info.to_der().map_err(|e| {
            PkiError::ParseError(format!("Failed to encode subject public key: {}", e))
        })?;
        let public_key = PublicKey::from_spki_der(&spki_der)?;
        let extensions = decode_extensions(tbs.extensions.as_ref())?;

        let descriptor = CertificateDescriptor {
            serial_number: SerialNumber::from_bytes(tbs.serial_number.as_bytes())?,
            subject: decode_name(&tbs.subject)?,
            not_before: decode_time(&tbs.validity.not_before),
            not_after: decode_time(&tbs.validity.not_after),
            dns_names: extensions.dns_names,
            ip_addresses: extensions.ip_addresses,
            key_usage: extensions.key_usage,
            ext_key_usage: extensions.ext_key_usage,
            is_ca: extensions.is_ca,
            basic_constraints_valid: extensions.basic_constraints_valid,
            subject_key_id: extensions.subject_key_id,
        };
        let issuer = decode_name(&tbs.issuer)?;

        Ok(Self {
            certificate,
            der,
            descriptor,
            issuer,
            public_key,
            authority_key_id: extensions.authority_key_id,
        })
    }

    /// The DER encoding.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn descriptor(&self) -> &CertificateDescriptor {
        &self.descriptor
    }

    pub fn subject(&self) -> &Subject {
        &self.descriptor.subject
    }

    pub fn issuer(&self) -> &Subject {
        &self.issuer
    }

    /// The certified public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// The subject exactly as encoded, used as the issuer of certificates
    /// this one signs.
    pub(crate) fn subject_name(&self) -> &Name {
        &self.certificate.tbs_certificate.subject
    }

    pub fn authority_key_id(&self) -> Option<&[u8]> {
        self.authority_key_id.as_deref()
    }

    pub fn is_ca(&self) -> bool {
        self.descriptor.is_ca
    }

    /// Verify that `issuer_key` produced this certificate's signature.
    pub fn verify_signed_by(&self, issuer_key: &PublicKey) -> Result<()> {
        if self.certificate.signature_algorithm.oid != OID_SHA256_WITH_RSA {
            return Err(PkiError::SigningError(format!(
                "Unsupported signature algorithm: {}",
                self.certificate.signature_algorithm.oid
            )));
        }

        let tbs_der = self.certificate.tbs_certificate.to_der().map_err(|e| {
            PkiError::CertificateError(format!("Failed to encode TBS: {}", e))
        })?;
        let signature = self.certificate.signature.as_bytes().ok_or_else(|| {
            PkiError::SigningError("Signature has unused bits".to_string())
        })?;

        issuer_key.verify(&tbs_der, signature)
    }

    /// Issuer equals subject and the certificate verifies with its own key.
    pub fn is_self_signed(&self) -> bool {
        self.issuer == self.descriptor.subject && self.verify_signed_by(&self.public_key).is_ok()
    }
}
