//! Certificate generation module.
//!
//! This module provides X.509 certificate issuance for a single-level private
//! PKI: a self-signed root CA signing leaf certificates.

pub mod builder;
pub mod ca;
pub mod certificate;
pub mod codec;
pub mod descriptor;
mod extensions;
pub mod issue;
pub mod loader;
mod x509_signing;
