//! High-level issuance operations.
//!
//! These functions take and return PEM bundles, composing the builder, the
//! CA, the codec and bundle storage.

use crate::cert::builder::build;
use crate::cert::ca;
use crate::cert::codec::{encode_certificate, encode_private_key, SerializedCertBundle};
use crate::cert::descriptor::Subject;
use crate::cert::loader::{load, LoadedCertificate};
use crate::error::{PkiError, Result};
use crate::storage::files::{write_bundle, WrittenBundle};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Create a root CA with Common Name `subject_cn`.
///
/// # Example
///
/// ```rust,no_run
/// use minipki::cert::issue::create_ca;
/// use std::time::{Duration, SystemTime};
///
/// # fn example() -> minipki::error::Result<()> {
/// let bundle = create_ca("root", SystemTime::now(), Duration::from_secs(10 * 365 * 86400))?;
/// assert!(String::from_utf8_lossy(&bundle.cert).contains("BEGIN CERTIFICATE"));
/// # Ok(())
/// # }
/// ```
pub fn create_ca(
    subject_cn: &str,
    not_before: SystemTime,
    duration: Duration,
) -> Result<SerializedCertBundle> {
    let subject = common_name(subject_cn)?;
    ca::create_ca(&subject, not_before, duration)?.to_bundle()
}

/// Issue a leaf certificate for `subject_cn`, signed by `loaded_ca`.
///
/// # Arguments
///
/// * `loaded_ca` - CA certificate and key, as returned by [`load`]
/// * `subject_cn` - Common Name of the leaf
/// * `sans_dns` - DNS subject alternative names
/// * `sans_ip` - IP subject alternative names
/// * `not_before` - Start of validity
/// * `duration` - Validity length
pub fn sign(
    loaded_ca: &LoadedCertificate,
    subject_cn: &str,
    sans_dns: &[String],
    sans_ip: &[IpAddr],
    not_before: SystemTime,
    duration: Duration,
) -> Result<SerializedCertBundle> {
    let subject = common_name(subject_cn)?;
    let request = build(&subject, sans_dns, sans_ip, not_before, duration)?;
    let certificate = ca::sign(
        &loaded_ca.certified_key(),
        &request.descriptor,
        request.key.public_key(),
    )?;

    Ok(SerializedCertBundle {
        cert: encode_certificate(&certificate),
        key: encode_private_key(&request.key)?,
    })
}

/// Everything needed to issue a leaf from CA files on disk.
#[derive(Debug, Clone)]
pub struct IssueFromFiles {
    pub ca_key_path: PathBuf,
    pub ca_cert_path: PathBuf,
    /// Empty when the CA key is not encrypted.
    pub ca_key_password: String,
    pub subject_cn: String,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub not_before: SystemTime,
    pub duration: Duration,
    pub dest: PathBuf,
    pub cert_file_name: String,
    pub key_file_name: String,
}

/// Load the CA, issue a leaf and write it into `request.dest`.
pub fn issue_from_ca_files(request: &IssueFromFiles) -> Result<WrittenBundle> {
    let loaded_ca = load(
        &request.ca_key_path,
        &request.ca_key_password,
        &request.ca_cert_path,
    )?;

    let bundle = sign(
        &loaded_ca,
        &request.subject_cn,
        &request.dns_names,
        &request.ip_addresses,
        request.not_before,
        request.duration,
    )?;

    write_bundle(
        &request.dest,
        &request.cert_file_name,
        &request.key_file_name,
        &bundle,
    )
}

fn common_name(cn: &str) -> Result<Subject> {
    if cn.trim().is_empty() {
        return Err(PkiError::CertificateError(
            "Common name cannot be empty".to_string(),
        ));
    }
    Ok(Subject::common_name(cn))
}
