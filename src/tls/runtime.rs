//! Crypto runtime queries
//!
//! The resolvers never hard-code what the TLS library supports. They ask a
//! [`CryptoRuntime`] instead: [`OpensslRuntime`] probes the linked OpenSSL,
//! [`StaticRuntime`] answers from fixed tables.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

use openssl::ssl::{SslContextBuilder, SslMethod};
use tracing::debug;

use super::cipher;
use super::version::{available_versions, ProtocolKind, TlsVersion};

/// What the TLS library can do
///
/// Cipher suites are named in OpenSSL form (`ECDHE-RSA-AES128-GCM-SHA256`,
/// `TLS_AES_128_GCM_SHA256`).
pub trait CryptoRuntime: Send + Sync {
    /// Supported versions of one family, in preference order.
    ///
    /// `ProtocolKind::All` is handled by [`available_versions`]; runtimes only
    /// answer for `Tls` and `Dtls`.
    fn supported_versions(&self, kind: ProtocolKind) -> Vec<TlsVersion>;

    /// Every suite usable with `version`, legacy suites included.
    fn cipher_suites(&self, version: TlsVersion) -> Vec<String>;

    /// Suites specific to `version` (for TLS 1.3: the TLS 1.3 suites only).
    fn exclusive_cipher_suites(&self, version: TlsVersion) -> Vec<String>;

    /// All suites across all available versions.
    ///
    /// Runtimes may memoize this; the computation is pure.
    fn known_ciphers(&self) -> Cow<'_, [String]> {
        Cow::Owned(cipher::all_ciphers(self, &available_versions(self, ProtocolKind::All)))
    }
}

/// TLS 1.3 suites
const TLS13_SUITES: &[&str] = &[
    "TLS_AES_256_GCM_SHA384",
    "TLS_AES_128_GCM_SHA256",
    "TLS_CHACHA20_POLY1305_SHA256",
    "TLS_AES_128_CCM_SHA256",
    "TLS_AES_128_CCM_8_SHA256",
];

/// Suites that need TLS 1.2 (AEAD or SHA-2 MAC)
const TLS12_SUITES: &[&str] = &[
    "ECDHE-ECDSA-AES256-GCM-SHA384",
    "ECDHE-RSA-AES256-GCM-SHA384",
    "ECDHE-ECDSA-CHACHA20-POLY1305",
    "ECDHE-RSA-CHACHA20-POLY1305",
    "ECDHE-ECDSA-AES256-SHA384",
    "ECDHE-RSA-AES256-SHA384",
    "ECDH-ECDSA-AES256-GCM-SHA384",
    "ECDH-RSA-AES256-GCM-SHA384",
    "ECDH-ECDSA-AES256-SHA384",
    "ECDH-RSA-AES256-SHA384",
    "DHE-RSA-AES256-GCM-SHA384",
    "DHE-DSS-AES256-GCM-SHA384",
    "DHE-RSA-AES256-SHA256",
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
    "DHE-RSA-AES128-GCM-SHA256",
    "DHE-DSS-AES128-GCM-SHA256",
    "DHE-RSA-AES128-SHA256",
    "DHE-DSS-AES128-SHA256",
    "AES128-GCM-SHA256",
    "AES128-SHA256",
    "RSA-PSK-AES256-GCM-SHA384",
    "RSA-PSK-AES256-CBC-SHA384",
    "RSA-PSK-AES128-GCM-SHA256",
    "RSA-PSK-AES128-CBC-SHA256",
];

/// CBC/SHA-1 suites, usable from TLS 1.0 on
const LEGACY_SUITES: &[&str] = &[
    "ECDHE-ECDSA-AES256-SHA",
    "ECDHE-RSA-AES256-SHA",
    "DHE-RSA-AES256-SHA",
    "DHE-DSS-AES256-SHA",
    "ECDH-ECDSA-AES256-SHA",
    "ECDH-RSA-AES256-SHA",
    "AES256-SHA",
    "ECDHE-ECDSA-AES128-SHA",
    "ECDHE-RSA-AES128-SHA",
    "DHE-RSA-AES128-SHA",
    "DHE-DSS-AES128-SHA",
    "ECDH-ECDSA-AES128-SHA",
    "ECDH-RSA-AES128-SHA",
    "AES128-SHA",
    "RSA-PSK-AES256-CBC-SHA",
    "RSA-PSK-AES128-CBC-SHA",
];

/// Runtime backed by the linked OpenSSL
///
/// The library is probed once per process: every candidate version and suite
/// is tried against a throwaway context, and only the accepted ones are
/// reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpensslRuntime;

struct Probe {
    tls: Vec<TlsVersion>,
    dtls: Vec<TlsVersion>,
    tls13: Vec<String>,
    tls12: Vec<String>,
    legacy: Vec<String>,
}

static PROBE: OnceLock<Probe> = OnceLock::new();
static ALL_CIPHERS: OnceLock<Vec<String>> = OnceLock::new();

impl Probe {
    fn run() -> Self {
        let tls: Vec<TlsVersion> = [
            TlsVersion::Tls13,
            TlsVersion::Tls12,
            TlsVersion::Tls11,
            TlsVersion::Tls10,
        ]
        .into_iter()
        .filter(|v| probe_version(*v))
        .collect();

        let dtls: Vec<TlsVersion> = [TlsVersion::Dtls12, TlsVersion::Dtls10]
            .into_iter()
            .filter(|v| probe_version(*v))
            .collect();

        let tls13 = if tls.contains(&TlsVersion::Tls13) {
            probe_suites(TLS13_SUITES, |b, s| b.set_ciphersuites(s))
        } else {
            Vec::new()
        };
        let tls12 = probe_suites(TLS12_SUITES, |b, s| b.set_cipher_list(s));
        let legacy = probe_suites(LEGACY_SUITES, |b, s| b.set_cipher_list(s));

        debug!(
            openssl = openssl::version::version(),
            tls = ?tls,
            dtls = ?dtls,
            tls13_suites = tls13.len(),
            tls12_suites = tls12.len(),
            legacy_suites = legacy.len(),
            "probed TLS runtime"
        );

        Probe { tls, dtls, tls13, tls12, legacy }
    }
}

fn probe_version(version: TlsVersion) -> bool {
    let Some(ssl_version) = version.to_openssl_version() else {
        return false;
    };
    let method = match version.kind() {
        ProtocolKind::Dtls => SslMethod::dtls(),
        _ => SslMethod::tls(),
    };
    SslContextBuilder::new(method)
        .and_then(|mut builder| {
            builder.set_min_proto_version(Some(ssl_version))?;
            builder.set_max_proto_version(Some(ssl_version))
        })
        .is_ok()
}

fn probe_suites<F>(candidates: &[&str], apply: F) -> Vec<String>
where
    F: Fn(&mut SslContextBuilder, &str) -> Result<(), openssl::error::ErrorStack>,
{
    candidates
        .iter()
        .filter(|suite| {
            SslContextBuilder::new(SslMethod::tls())
                .and_then(|mut builder| apply(&mut builder, **suite))
                .is_ok()
        })
        .map(|suite| suite.to_string())
        .collect()
}

impl OpensslRuntime {
    fn probe(&self) -> &'static Probe {
        PROBE.get_or_init(Probe::run)
    }
}

impl CryptoRuntime for OpensslRuntime {
    fn supported_versions(&self, kind: ProtocolKind) -> Vec<TlsVersion> {
        let probe = self.probe();
        match kind {
            ProtocolKind::Tls => probe.tls.clone(),
            ProtocolKind::Dtls => probe.dtls.clone(),
            ProtocolKind::All => available_versions(self, ProtocolKind::All),
        }
    }

    fn cipher_suites(&self, version: TlsVersion) -> Vec<String> {
        let probe = self.probe();
        match version {
            TlsVersion::Tls13 => [&probe.tls13[..], &probe.tls12[..], &probe.legacy[..]].concat(),
            TlsVersion::Tls12 | TlsVersion::Dtls12 => [&probe.tls12[..], &probe.legacy[..]].concat(),
            TlsVersion::Tls11 | TlsVersion::Tls10 | TlsVersion::Dtls10 => probe.legacy.clone(),
        }
    }

    fn exclusive_cipher_suites(&self, version: TlsVersion) -> Vec<String> {
        let probe = self.probe();
        match version {
            TlsVersion::Tls13 => probe.tls13.clone(),
            TlsVersion::Tls12 | TlsVersion::Dtls12 => probe.tls12.clone(),
            TlsVersion::Tls11 | TlsVersion::Tls10 | TlsVersion::Dtls10 => probe.legacy.clone(),
        }
    }

    fn known_ciphers(&self) -> Cow<'_, [String]> {
        let all = ALL_CIPHERS.get_or_init(|| {
            cipher::all_ciphers(self, &available_versions(self, ProtocolKind::All))
        });
        Cow::Borrowed(all.as_slice())
    }
}

/// Runtime answering from fixed tables
///
/// Useful wherever results must not depend on how the local OpenSSL was
/// built.
#[derive(Debug, Default)]
pub struct StaticRuntime {
    tls: Vec<TlsVersion>,
    dtls: Vec<TlsVersion>,
    suites: HashMap<TlsVersion, Vec<String>>,
    exclusive: HashMap<TlsVersion, Vec<String>>,
    known: OnceLock<Vec<String>>,
}

impl StaticRuntime {
    /// Empty runtime: no versions, no suites
    pub fn new() -> Self {
        Self::default()
    }

    /// TLS 1.3 + 1.2, DTLS 1.2, with a small set of AEAD suites
    pub fn modern() -> Self {
        let tls13 = [
            "TLS_AES_256_GCM_SHA384",
            "TLS_AES_128_GCM_SHA256",
            "TLS_CHACHA20_POLY1305_SHA256",
        ];
        let tls12 = [
            "ECDHE-ECDSA-AES256-GCM-SHA384",
            "ECDHE-RSA-AES256-GCM-SHA384",
            "ECDHE-ECDSA-AES128-GCM-SHA256",
            "ECDHE-RSA-AES128-GCM-SHA256",
            "AES256-GCM-SHA384",
            "AES128-GCM-SHA256",
            "AES128-SHA256",
            "ECDHE-RSA-AES128-SHA",
        ];
        let tls13_all: Vec<&str> = tls13.iter().chain(tls12.iter()).copied().collect();

        StaticRuntime::new()
            .with_tls_versions([TlsVersion::Tls13, TlsVersion::Tls12])
            .with_dtls_versions([TlsVersion::Dtls12])
            .with_suites(TlsVersion::Tls13, &tls13_all, &tls13)
            .with_suites(TlsVersion::Tls12, &tls12, &tls12)
            .with_suites(TlsVersion::Dtls12, &tls12, &tls12)
    }

    pub fn with_tls_versions<I: IntoIterator<Item = TlsVersion>>(mut self, versions: I) -> Self {
        self.tls = versions.into_iter().collect();
        self.known = OnceLock::new();
        self
    }

    pub fn with_dtls_versions<I: IntoIterator<Item = TlsVersion>>(mut self, versions: I) -> Self {
        self.dtls = versions.into_iter().collect();
        self.known = OnceLock::new();
        self
    }

    /// Set the suites of one version: everything usable, and the exclusive subset.
    pub fn with_suites(mut self, version: TlsVersion, all: &[&str], exclusive: &[&str]) -> Self {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        self.suites.insert(version, owned(all));
        self.exclusive.insert(version, owned(exclusive));
        self.known = OnceLock::new();
        self
    }
}

impl CryptoRuntime for StaticRuntime {
    fn supported_versions(&self, kind: ProtocolKind) -> Vec<TlsVersion> {
        match kind {
            ProtocolKind::Tls => self.tls.clone(),
            ProtocolKind::Dtls => self.dtls.clone(),
            ProtocolKind::All => self.tls.iter().chain(self.dtls.iter()).copied().collect(),
        }
    }

    fn cipher_suites(&self, version: TlsVersion) -> Vec<String> {
        self.suites.get(&version).cloned().unwrap_or_default()
    }

    fn exclusive_cipher_suites(&self, version: TlsVersion) -> Vec<String> {
        self.exclusive.get(&version).cloned().unwrap_or_default()
    }

    fn known_ciphers(&self) -> Cow<'_, [String]> {
        let all = self.known.get_or_init(|| {
            cipher::all_ciphers(self, &available_versions(self, ProtocolKind::All))
        });
        Cow::Borrowed(all.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_runtime_tables() {
        let rt = StaticRuntime::modern();
        assert_eq!(rt.supported_versions(ProtocolKind::Tls), vec![TlsVersion::Tls13, TlsVersion::Tls12]);
        assert_eq!(rt.exclusive_cipher_suites(TlsVersion::Tls13).len(), 3);
        assert!(rt.cipher_suites(TlsVersion::Tls13).contains(&"AES128-SHA256".to_string()));
        assert!(rt.cipher_suites(TlsVersion::Tls11).is_empty());
    }

    #[test]
    fn test_static_runtime_known_ciphers_include_psk() {
        let rt = StaticRuntime::modern();
        let known = rt.known_ciphers();
        assert!(known.contains(&"TLS_AES_128_GCM_SHA256".to_string()));
        assert!(known.contains(&"PSK-AES128-CBC-SHA".to_string()));
    }

    #[test]
    fn test_openssl_runtime_supports_tls12() {
        let rt = OpensslRuntime;
        let versions = rt.supported_versions(ProtocolKind::Tls);
        assert!(versions.contains(&TlsVersion::Tls12));
        assert!(!rt.cipher_suites(TlsVersion::Tls12).is_empty());
    }

    #[test]
    fn test_dtls_versions_are_probed_individually() {
        let expected: Vec<TlsVersion> = [TlsVersion::Dtls12, TlsVersion::Dtls10]
            .into_iter()
            .filter(|v| probe_version(*v))
            .collect();
        let dtls = OpensslRuntime.supported_versions(ProtocolKind::Dtls);
        assert_eq!(dtls, expected);
        assert!(dtls.iter().all(|v| v.kind() == ProtocolKind::Dtls));
    }

    #[test]
    fn test_probe_rejects_dtls_version_on_tls_method() {
        let dtls12 = TlsVersion::Dtls12.to_openssl_version().unwrap();
        let accepted = SslContextBuilder::new(SslMethod::tls())
            .and_then(|mut builder| builder.set_min_proto_version(Some(dtls12)))
            .is_ok();
        assert!(!accepted);
    }

    #[test]
    fn test_openssl_runtime_memoizes_known_ciphers() {
        let rt = OpensslRuntime;
        let first = rt.known_ciphers();
        let second = rt.known_ciphers();
        assert_eq!(first.as_ptr(), second.as_ptr());
    }
}
