//! Cipher suite selection
//!
//! Builds the candidate suite universe for a set of versions, applies the
//! curated default preference list, and makes sure TLS 1.3 connections have a
//! TLS 1.3 suite to negotiate.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::runtime::{CryptoRuntime, OpensslRuntime};
use super::version::{available_versions, dedup, ProtocolKind, TlsVersion};

/// Default preference list for TLS 1.2 and below (order matters)
pub const SELECTED_CIPHERS: &[&str] = &[
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "ECDHE-RSA-AES256-GCM-SHA384",
    "ECDHE-ECDSA-AES256-SHA384",
    "ECDHE-RSA-AES256-SHA384",
    "ECDH-ECDSA-AES256-GCM-SHA384",
    "ECDH-RSA-AES256-GCM-SHA384",
    "ECDH-ECDSA-AES256-SHA384",
    "ECDH-RSA-AES256-SHA384",
    "DHE-DSS-AES256-GCM-SHA384",
    "DHE-DSS-AES256-SHA256",
    "AES256-GCM-SHA384",
    "AES256-SHA256",
    "ECDHE-ECDSA-AES128-GCM-SHA256",
    "ECDHE-RSA-AES128-GCM-SHA256",
    "ECDHE-ECDSA-AES128-SHA256",
    "ECDHE-RSA-AES128-SHA256",
    "ECDH-ECDSA-AES128-GCM-SHA256",
    "ECDH-RSA-AES128-GCM-SHA256",
    "ECDH-ECDSA-AES128-SHA256",
    "ECDH-RSA-AES128-SHA256",
    "DHE-DSS-AES128-GCM-SHA256",
    "DHE-DSS-AES128-SHA256",
    "AES128-GCM-SHA256",
    "AES128-SHA256",
    "ECDHE-ECDSA-AES256-SHA",
    "ECDHE-RSA-AES256-SHA",
    "DHE-DSS-AES256-SHA",
    "ECDH-ECDSA-AES256-SHA",
    "ECDH-RSA-AES256-SHA",
    "ECDHE-ECDSA-AES128-SHA",
    "ECDHE-RSA-AES128-SHA",
    "DHE-DSS-AES128-SHA",
    "ECDH-ECDSA-AES128-SHA",
    "ECDH-RSA-AES128-SHA",
    // psk
    "RSA-PSK-AES256-GCM-SHA384",
    "RSA-PSK-AES256-CBC-SHA384",
    "RSA-PSK-AES128-GCM-SHA256",
    "RSA-PSK-AES128-CBC-SHA256",
    "RSA-PSK-AES256-CBC-SHA",
    "RSA-PSK-AES128-CBC-SHA",
];

/// PSK suites the backend supports but the per-version query does not list
pub const PSK_CIPHERS: &[&str] = &[
    "PSK-AES256-GCM-SHA384",
    "PSK-AES128-GCM-SHA256",
    "PSK-AES256-CBC-SHA384",
    "PSK-AES256-CBC-SHA",
    "PSK-AES128-CBC-SHA256",
    "PSK-AES128-CBC-SHA",
];

/// User-configured cipher suites, before tokenising
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DesiredCiphers {
    /// Separated by commas and/or spaces
    Text(String),
    List(Vec<String>),
}

impl DesiredCiphers {
    pub fn tokens(&self) -> Vec<String> {
        match self {
            DesiredCiphers::Text(text) => text
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            DesiredCiphers::List(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

impl From<&str> for DesiredCiphers {
    fn from(text: &str) -> Self {
        DesiredCiphers::Text(text.to_string())
    }
}

impl From<Vec<String>> for DesiredCiphers {
    fn from(list: Vec<String>) -> Self {
        DesiredCiphers::List(list)
    }
}

/// Every suite usable with the given versions.
///
/// A TLS 1.3-only set yields the TLS 1.3 suites alone, since TLS 1.3 cannot
/// negotiate legacy suites.
pub fn all_ciphers<R: CryptoRuntime + ?Sized>(runtime: &R, versions: &[TlsVersion]) -> Vec<String> {
    if versions == [TlsVersion::Tls13] {
        return runtime.exclusive_cipher_suites(TlsVersion::Tls13);
    }

    let mut all: Vec<String> = versions
        .iter()
        .flat_map(|v| runtime.cipher_suites(*v))
        .collect();
    all.extend(PSK_CIPHERS.iter().map(|c| c.to_string()));
    dedup(all)
}

/// All suites of the process-wide OpenSSL runtime, computed once.
pub fn all_ciphers_cached() -> Vec<String> {
    OpensslRuntime.known_ciphers().into_owned()
}

/// Whether `cipher` is supported by any available version.
pub fn is_known_cipher<R: CryptoRuntime + ?Sized>(runtime: &R, cipher: &str) -> bool {
    runtime.known_ciphers().iter().any(|c| c == cipher)
}

/// Pre-selected suites for every available version.
pub fn default_ciphers<R: CryptoRuntime + ?Sized>(runtime: &R) -> Vec<String> {
    selected_ciphers(runtime, &available_versions(runtime, ProtocolKind::All))
}

/// Pre-selected suites for the given versions, in preference order.
pub fn selected_ciphers<R: CryptoRuntime + ?Sized>(runtime: &R, versions: &[TlsVersion]) -> Vec<String> {
    let all = all_ciphers(runtime, versions);
    let preferred = versions.iter().flat_map(|v| preferred_ciphers(runtime, *v));
    dedup(preferred.filter(|c| all.contains(c)))
}

fn preferred_ciphers<R: CryptoRuntime + ?Sized>(runtime: &R, version: TlsVersion) -> Vec<String> {
    let mut preferred = Vec::new();
    if version.is_tls13()
        && runtime
            .supported_versions(ProtocolKind::Tls)
            .contains(&TlsVersion::Tls13)
    {
        preferred = runtime.exclusive_cipher_suites(TlsVersion::Tls13);
    }
    preferred.extend(SELECTED_CIPHERS.iter().map(|c| c.to_string()));
    preferred
}

/// Ensure version and cipher suite integrity.
///
/// Nothing configured means the pre-selected suites. When TLS 1.3 is enabled
/// but none of the configured suites is a TLS 1.3 suite, the TLS 1.3 defaults
/// are put in front: listing only legacy suites is a common mistake.
pub fn integral_ciphers<R: CryptoRuntime + ?Sized>(
    runtime: &R,
    versions: &[TlsVersion],
    configured: Option<&DesiredCiphers>,
) -> Vec<String> {
    let configured = configured.map(DesiredCiphers::tokens).unwrap_or_default();
    if configured.is_empty() {
        return selected_ciphers(runtime, versions);
    }

    for cipher in &configured {
        if !is_known_cipher(runtime, cipher) {
            warn!(cipher = %cipher, "configured cipher suite is not supported by the TLS runtime");
        }
    }

    if !versions.contains(&TlsVersion::Tls13) {
        return dedup(configured);
    }

    let tls13 = selected_ciphers(runtime, &[TlsVersion::Tls13]);
    if configured.iter().any(|c| tls13.contains(c)) {
        dedup(configured)
    } else {
        dedup(tls13.into_iter().chain(configured))
    }
}
