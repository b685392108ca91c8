//! Writing certificate bundles to disk.
//!
//! The destination directory is created with mode `0700` and both files are
//! written with mode `0600` on unix. Existing files are overwritten; the last
//! writer wins.

use crate::cert::codec::SerializedCertBundle;
use crate::error::{PkiError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};

/// Permissions of a created bundle directory.
pub const DIR_MODE: u32 = 0o700;
/// Permissions of written certificate and key files.
pub const FILE_MODE: u32 = 0o600;

/// Where a bundle was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenBundle {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Write `bundle` as `dest/cert_file_name` and `dest/key_file_name`.
///
/// # Example
///
/// ```rust,no_run
/// use minipki::cert::codec::SerializedCertBundle;
/// use minipki::storage::files::write_bundle;
///
/// # fn example(bundle: SerializedCertBundle) -> minipki::error::Result<()> {
/// let written = write_bundle("ssl".as_ref(), "ca.pem", "ca.key", &bundle)?;
/// println!("wrote {}", written.cert_path.display());
/// # Ok(())
/// # }
/// ```
pub fn write_bundle(
    dest: &Path,
    cert_file_name: &str,
    key_file_name: &str,
    bundle: &SerializedCertBundle,
) -> Result<WrittenBundle> {
    create_private_dir(dest)?;

    let cert_path = dest.join(cert_file_name);
    let key_path = dest.join(key_file_name);
    write_private_file(&cert_path, &bundle.cert)?;
    write_private_file(&key_path, &bundle.key)?;

    tracing::debug!(
        cert = %cert_path.display(),
        key = %key_path.display(),
        "wrote certificate bundle"
    );

    Ok(WrittenBundle {
        cert_path,
        key_path,
    })
}

fn create_private_dir(dest: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(DIR_MODE);

    builder.create(dest).map_err(|e| PkiError::io(dest, e))
}

fn write_private_file(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(FILE_MODE);

    let mut file = options.open(path).map_err(|e| PkiError::io(path, e))?;
    file.write_all(contents).map_err(|e| PkiError::io(path, e))?;

    // `mode` only applies to newly created files.
    #[cfg(unix)]
    file.set_permissions(fs::Permissions::from_mode(FILE_MODE))
        .map_err(|e| PkiError::io(path, e))?;

    Ok(())
}
