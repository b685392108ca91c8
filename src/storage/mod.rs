//! Bundle storage module.
//!
//! This module writes issued certificate/key bundles to local directories
//! with owner-only permissions.

pub mod files;
