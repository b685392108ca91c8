//! TLS trust configuration module.
//!
//! This module turns PEM material on disk into Rustls configurations for
//! mutual TLS. It never opens a socket.

pub mod config;
pub mod pool;
