//! Protocol version resolution
//!
//! Desired versions come from user configuration either as a comma separated
//! string (`"tlsv1.3,tlsv1.2"`) or as a list of tokens. They are parsed through
//! a fixed alias table, deduplicated and intersected with whatever the linked
//! TLS library actually supports.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::TlsError;
use super::runtime::CryptoRuntime;
use super::Result;

/// TLS/DTLS protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TlsVersion {
    /// TLS 1.0
    #[serde(rename = "tlsv1")]
    Tls10,
    /// TLS 1.1
    #[serde(rename = "tlsv1.1")]
    Tls11,
    /// TLS 1.2
    #[serde(rename = "tlsv1.2")]
    Tls12,
    /// TLS 1.3
    #[serde(rename = "tlsv1.3")]
    Tls13,
    /// DTLS 1.0
    #[serde(rename = "dtlsv1")]
    Dtls10,
    /// DTLS 1.2
    #[serde(rename = "dtlsv1.2")]
    Dtls12,
}

impl TlsVersion {
    /// Every version tag, TLS first
    pub const ALL: [TlsVersion; 6] = [
        TlsVersion::Tls10,
        TlsVersion::Tls11,
        TlsVersion::Tls12,
        TlsVersion::Tls13,
        TlsVersion::Dtls10,
        TlsVersion::Dtls12,
    ];

    /// Parse a single version token (case-insensitive).
    ///
    /// Accepts the canonical tags (`tlsv1.2`, `dtlsv1.2`) as well as the short
    /// forms `1.3`, `v1.2`, `1`. Returns `None` for anything else.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().to_ascii_lowercase();
        match token.as_str() {
            "dtlsv1.2" => return Some(TlsVersion::Dtls12),
            "dtlsv1" => return Some(TlsVersion::Dtls10),
            _ => {}
        }

        let number = token
            .strip_prefix("tlsv")
            .or_else(|| token.strip_prefix('v'))
            .unwrap_or(&token);

        match number {
            "1.3" => Some(TlsVersion::Tls13),
            "1.2" => Some(TlsVersion::Tls12),
            "1.1" => Some(TlsVersion::Tls11),
            "1" | "1.0" => Some(TlsVersion::Tls10),
            _ => None,
        }
    }

    /// Canonical tag, as understood by the handshake engine
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "tlsv1",
            TlsVersion::Tls11 => "tlsv1.1",
            TlsVersion::Tls12 => "tlsv1.2",
            TlsVersion::Tls13 => "tlsv1.3",
            TlsVersion::Dtls10 => "dtlsv1",
            TlsVersion::Dtls12 => "dtlsv1.2",
        }
    }

    /// Protocol family of this version
    pub fn kind(&self) -> ProtocolKind {
        match self {
            TlsVersion::Dtls10 | TlsVersion::Dtls12 => ProtocolKind::Dtls,
            _ => ProtocolKind::Tls,
        }
    }

    pub fn is_tls13(&self) -> bool {
        *self == TlsVersion::Tls13
    }

    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(&self) -> Option<openssl::ssl::SslVersion> {
        use openssl::ssl::SslVersion;
        match self {
            TlsVersion::Tls10 => Some(SslVersion::TLS1),
            TlsVersion::Tls11 => Some(SslVersion::TLS1_1),
            TlsVersion::Tls12 => Some(SslVersion::TLS1_2),
            TlsVersion::Tls13 => Some(SslVersion::TLS1_3),
            TlsVersion::Dtls10 => Some(SslVersion::DTLS1),
            TlsVersion::Dtls12 => Some(SslVersion::DTLS1_2),
        }
    }
}

impl fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TlsVersion {
    type Err = TlsError;

    fn from_str(s: &str) -> Result<Self> {
        TlsVersion::parse(s).ok_or_else(|| TlsError::InvalidConfig {
            cause: format!("unknown TLS version: {s}"),
        })
    }
}

/// Protocol family selector for version queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    Tls,
    Dtls,
    /// TLS followed by DTLS
    All,
}

/// User-desired versions, before parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DesiredVersions {
    /// Comma separated list, e.g. `"tlsv1.3, tlsv1.2"`
    Text(String),
    /// One token per element
    List(Vec<String>),
}

impl DesiredVersions {
    /// Raw tokens, trimmed, blanks removed
    pub fn tokens(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            DesiredVersions::Text(text) => text.split(',').collect(),
            DesiredVersions::List(items) => items.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Parse tokens into versions, discarding unknown ones with a warning.
    pub fn parse(&self) -> Vec<TlsVersion> {
        self.tokens()
            .into_iter()
            .filter_map(|token| {
                let parsed = TlsVersion::parse(&token);
                if parsed.is_none() {
                    warn!(version = %token, "unknown TLS version discarded");
                }
                parsed
            })
            .collect()
    }
}

impl From<&str> for DesiredVersions {
    fn from(text: &str) -> Self {
        DesiredVersions::Text(text.to_string())
    }
}

impl From<&[TlsVersion]> for DesiredVersions {
    fn from(versions: &[TlsVersion]) -> Self {
        DesiredVersions::List(versions.iter().map(|v| v.as_str().to_string()).collect())
    }
}

impl<const N: usize> From<[TlsVersion; N]> for DesiredVersions {
    fn from(versions: [TlsVersion; N]) -> Self {
        DesiredVersions::from(&versions[..])
    }
}

/// Deduplicate without re-ordering; the first occurrence wins.
pub fn dedup<T, I>(items: I) -> Vec<T>
where
    T: PartialEq,
    I: IntoIterator<Item = T>,
{
    let mut out: Vec<T> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Versions the runtime supports for the given family.
pub fn available_versions<R: CryptoRuntime + ?Sized>(runtime: &R, kind: ProtocolKind) -> Vec<TlsVersion> {
    match kind {
        ProtocolKind::Tls | ProtocolKind::Dtls => runtime.supported_versions(kind),
        ProtocolKind::All => {
            let mut all = runtime.supported_versions(ProtocolKind::Tls);
            all.extend(runtime.supported_versions(ProtocolKind::Dtls));
            all
        }
    }
}

/// Validate the desired versions against what is available.
///
/// With nothing desired (or nothing recognisable) every available version is
/// returned in runtime order. Otherwise the result keeps the desired order.
/// Fails only when none of the desired versions is available.
pub fn resolve_versions<R: CryptoRuntime + ?Sized>(
    runtime: &R,
    kind: ProtocolKind,
    desired: Option<&DesiredVersions>,
) -> Result<Vec<TlsVersion>> {
    let available = available_versions(runtime, kind);
    let desired = dedup(desired.map(DesiredVersions::parse).unwrap_or_default());
    if desired.is_empty() {
        return Ok(available);
    }

    let resolved: Vec<TlsVersion> = desired
        .iter()
        .copied()
        .filter(|v| available.contains(v))
        .collect();

    if resolved.is_empty() {
        return Err(TlsError::NoAvailableTlsVersion { desired, available });
    }
    Ok(resolved)
}
