//! minipki: a minimal private PKI for mutual TLS
//!
//! This library runs a single-level certificate authority. It enables users to:
//!
//! - Create a self-signed RSA root CA
//! - Build certificate requests and sign them with the CA
//! - Persist and reload certificates and keys as PEM, including legacy
//!   password-encrypted `RSA PRIVATE KEY` blocks
//! - Assemble Rustls server and client configurations for mTLS
//!
//! # Architecture
//!
//! Every operation is a synchronous function over explicit inputs; the CA is
//! passed in on each call and nothing is cached. All operations return
//! [`Result`] with the single crate error [`PkiError`].
//!
//! # Example
//!
//! ```rust,no_run
//! use minipki::cert::builder::build;
//! use minipki::cert::ca::{create_ca, sign};
//! use minipki::cert::descriptor::Subject;
//! use minipki::error::Result;
//! use std::time::{Duration, SystemTime};
//!
//! fn example() -> Result<()> {
//!     let day = Duration::from_secs(86400);
//!     let ca = create_ca(&Subject::common_name("root"), SystemTime::now(), day)?;
//!
//!     let request = build(
//!         &Subject::common_name("svc.local"),
//!         &["svc.local".to_string()],
//!         &[],
//!         SystemTime::now(),
//!         day,
//!     )?;
//!     let leaf = sign(&ca, &request.descriptor, request.key.public_key())?;
//!     leaf.verify_signed_by(ca.certificate.public_key())?;
//!     Ok(())
//! }
//! ```

pub mod cert;
pub mod crypto;
pub mod error;
pub mod net;
pub mod storage;

// Re-export commonly used types
pub use error::{PkiError, Result};
