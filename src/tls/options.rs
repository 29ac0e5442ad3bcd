//! Compiled option list
//!
//! The output of the compiler: an ordered list of `(name, value)` pairs in the
//! vocabulary of the handshake engine, plus the version compatibility table
//! used to filter it.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use super::config::{ServerNameIndication, VerifyMode};
use super::version::TlsVersion;

/// Hostname check flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostnameCheck {
    /// RFC 6125 matching, wildcard allowed in the left-most label
    Https,
}

impl HostnameCheck {
    /// Match a reference host name against a certificate name.
    pub fn matches(&self, reference: &str, presented: &str) -> bool {
        let reference = reference.trim_end_matches('.').to_ascii_lowercase();
        let presented = presented.trim_end_matches('.').to_ascii_lowercase();
        if reference.is_empty() || presented.is_empty() {
            return false;
        }

        match presented.strip_prefix("*.") {
            Some(suffix) => match reference.split_once('.') {
                Some((label, rest)) => !label.is_empty() && rest == suffix && suffix.contains('.'),
                None => false,
            },
            None => reference == presented,
        }
    }
}

/// CRL checking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrlCheck {
    /// Check the peer certificate only
    Peer,
}

/// Callback wired into the handshake engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "hook", content = "arg", rename_all = "snake_case")]
pub enum Hook {
    /// Built-in PSK identity lookup
    DefaultPskLookup,
    /// A lookup function registered under this name
    Named(String),
    HostnameMatch(HostnameCheck),
    /// Trust anchor selection for partial chains
    PartialChain(String),
    /// Require this extended key usage on peer certificates
    VerifyPeerExtKeyUsage(String),
}

/// Option value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
    Versions(Vec<TlsVersion>),
    Verify(VerifyMode),
    Sni(ServerNameIndication),
    Duration(#[serde(serialize_with = "as_millis")] Duration),
    CrlCheck(CrlCheck),
    /// Internal CRL cache with HTTP fetch timeout
    CrlCache {
        #[serde(serialize_with = "as_millis")]
        http_timeout: Duration,
    },
    Hook(Hook),
    /// Pass-through value
    Json(serde_json::Value),
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Str(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Str(s)
    }
}

/// One compiled option
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SslOption {
    pub name: String,
    pub value: OptionValue,
}

impl SslOption {
    pub fn new(name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        SslOption {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for SslOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Ordered option list
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CompiledOptions(Vec<SslOption>);

impl CompiledOptions {
    pub fn new(options: Vec<SslOption>) -> Self {
        CompiledOptions(options)
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.0.iter().find(|o| o.name == name).map(|o| &o.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|o| o.name.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SslOption> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<SslOption> {
        self.0
    }
}

impl IntoIterator for CompiledOptions {
    type Item = SslOption;
    type IntoIter = std::vec::IntoIter<SslOption>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

const TLS13_ONLY: &[TlsVersion] = &[TlsVersion::Tls13];

const PRE_TLS13: &[TlsVersion] = &[
    TlsVersion::Tls10,
    TlsVersion::Tls11,
    TlsVersion::Tls12,
    TlsVersion::Dtls10,
    TlsVersion::Dtls12,
];

/// Versions an option applies to; `None` means any version.
pub fn compatible_versions(name: &str) -> Option<&'static [TlsVersion]> {
    match name {
        "early_data" | "certificate_authorities" | "cookie" | "key_update_at" | "anti_replay"
        | "session_tickets" | "supported_groups" | "use_ticket" => Some(TLS13_ONLY),
        "reuse_sessions" | "reuse_session" | "secure_renegotiate" | "client_renegotiation"
        | "user_lookup_fun" | "psk_identity" | "next_protocols_advertised" | "beast_mitigation"
        | "padding_check" => Some(PRE_TLS13),
        _ => None,
    }
}

/// Drop options that none of `versions` can use.
pub fn filter_by_versions(options: Vec<SslOption>, versions: &[TlsVersion]) -> Vec<SslOption> {
    options
        .into_iter()
        .filter(|option| match compatible_versions(&option.name) {
            Some(compatible) if !compatible.iter().any(|v| versions.contains(v)) => {
                warn!(
                    option = %option.name,
                    versions = ?versions,
                    "option is incompatible with the configured TLS versions, dropped"
                );
                false
            }
            _ => true,
        })
        .collect()
}
