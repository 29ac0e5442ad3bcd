//! tlsopts - TLS/DTLS option materialization
//!
//! This crate validates the TLS settings of network listeners and connectors,
//! persists inline certificates to a content-addressed store and compiles the
//! option lists consumed by the handshake engine.

pub mod tls;
