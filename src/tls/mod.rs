//! TLS option materialization for listeners and connectors
//!
//! This module turns loosely typed `ssl` configuration sections into option
//! lists ready for a TLS/DTLS handshake engine, and writes inline PEM
//! material to a content-addressed store so every node of a cluster derives
//! the same file path for the same content.
//!
//! # Architecture
//!
//! Data flows one way:
//!
//! 1. `TlsOptions` normalizes the raw configuration (`config`)
//! 2. Versions are resolved against a `CryptoRuntime` (`version`, `runtime`)
//! 3. Cipher suites are selected for those versions (`cipher`)
//! 4. Certificates and keys are validated and stored (`materialize`, `store`)
//! 5. `OptionCompiler` assembles and filters the final list (`compile`)
//!
//! # Examples
//!
//! ## Materialize, then compile a listener
//!
//! ```no_run
//! use tlsopts::tls::{
//!     ensure_ssl_files, CertStore, MaterializeOptions, OpensslRuntime, OptionCompiler,
//!     Protocol, Role, SslFileKey, TlsOptions,
//! };
//! use serde_json::json;
//!
//! let raw = json!({
//!     "enable": true,
//!     "versions": "tlsv1.3,tlsv1.2",
//!     "certfile": "-----BEGIN CERTIFICATE-----\n...",
//!     "keyfile": "/etc/certs/key.pem",
//!     "verify": "verify_peer",
//! });
//! let options = TlsOptions::from_value(raw).unwrap();
//!
//! let store = CertStore::new("/var/lib/broker/certs");
//! let settings = MaterializeOptions::default().require([SslFileKey::CertFile, SslFileKey::KeyFile]);
//! let options = ensure_ssl_files(&store, "listeners", &options, &settings).unwrap();
//!
//! let compiled = OptionCompiler::new(&OpensslRuntime)
//!     .compile(Role::Server, Protocol::Tls, &options)
//!     .unwrap();
//! for option in compiled.iter() {
//!     println!("{} = {:?}", option.name, option.value);
//! }
//! ```

pub mod cipher;
pub mod compile;
pub mod config;
pub mod env;
pub mod error;
pub mod materialize;
pub mod options;
pub mod pem;
pub mod runtime;
pub mod secret;
pub mod store;
pub mod version;

pub use cipher::{all_ciphers, default_ciphers, integral_ciphers, selected_ciphers, DesiredCiphers};
pub use compile::{
    compile, AuthExtension, CompileSettings, NoAuthExtension, OptionCompiler, PartialChainExtension, Protocol, Role,
};
pub use config::{OcspOptions, PartialChain, ServerNameIndication, SslFileKey, TlsOptions, VerifyMode};
pub use error::TlsError;
pub use materialize::{drop_invalid_certs, ensure_ssl_files, is_valid_pem_file, MaterializeOptions};
pub use options::{CompiledOptions, Hook, HostnameCheck, OptionValue, SslOption};
pub use self::pem::{PemKind, PemOrPath};
pub use runtime::{CryptoRuntime, OpensslRuntime, StaticRuntime};
pub use secret::{Secret, SecretString};
pub use store::{is_managed_ssl_file, CertStore, StoredFile};
pub use version::{available_versions, dedup, resolve_versions, DesiredVersions, ProtocolKind, TlsVersion};

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;
