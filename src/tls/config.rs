//! TLS configuration
//!
//! `TlsOptions` is the typed form of one listener's or connector's `ssl`
//! section. Loosely shaped input (booleans given as `"true"`, versions given
//! as a comma separated string, durations given as `"15s"`) is normalized
//! here, once, when the configuration is deserialized.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use super::cipher::DesiredCiphers;
use super::pem::PemKind;
use super::secret::SecretString;
use super::version::DesiredVersions;
use super::Result;

/// Peer verification mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyMode {
    #[default]
    VerifyNone,
    VerifyPeer,
}

/// Server Name Indication setting (client side)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServerNameIndication {
    /// Send this host name
    Name(String),
    /// Do not send SNI at all
    Disable,
}

impl From<String> for ServerNameIndication {
    fn from(value: String) -> Self {
        if value == "disable" {
            ServerNameIndication::Disable
        } else {
            ServerNameIndication::Name(value)
        }
    }
}

impl From<ServerNameIndication> for String {
    fn from(sni: ServerNameIndication) -> Self {
        match sni {
            ServerNameIndication::Name(name) => name,
            ServerNameIndication::Disable => "disable".to_string(),
        }
    }
}

/// Accept partial certificate chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BoolOrString")]
pub enum PartialChain {
    /// Any certificate from the CA file may act as trust anchor
    Enabled,
    Disabled,
    /// The CA file holds two certificates used for cross-signing
    TwoCacertsFromCacertfile,
    /// The CA file holds the one intermediate to trust
    CacertFromCacertfile,
}

impl PartialChain {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartialChain::Enabled => "true",
            PartialChain::Disabled => "false",
            PartialChain::TwoCacertsFromCacertfile => "two_cacerts_from_cacertfile",
            PartialChain::CacertFromCacertfile => "cacert_from_cacertfile",
        }
    }
}

impl TryFrom<BoolOrString> for PartialChain {
    type Error = String;

    fn try_from(value: BoolOrString) -> std::result::Result<Self, Self::Error> {
        match value {
            BoolOrString::Bool(true) => Ok(PartialChain::Enabled),
            BoolOrString::Bool(false) => Ok(PartialChain::Disabled),
            BoolOrString::Str(s) => match s.as_str() {
                "true" => Ok(PartialChain::Enabled),
                "false" => Ok(PartialChain::Disabled),
                "two_cacerts_from_cacertfile" => Ok(PartialChain::TwoCacertsFromCacertfile),
                "cacert_from_cacertfile" => Ok(PartialChain::CacertFromCacertfile),
                other => Err(format!("invalid partial_chain value: {other}")),
            },
        }
    }
}

/// OCSP stapling settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct OcspOptions {
    #[serde(deserialize_with = "de::opt_bool")]
    pub enable_ocsp_stapling: Option<bool>,
    pub responder_url: Option<String>,
    /// Issuer certificate, inline PEM or path
    pub issuer_pem: Option<String>,
}

/// TLS options of one listener or connector
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TlsOptions {
    #[serde(deserialize_with = "de::opt_bool")]
    pub enable: Option<bool>,
    pub versions: Option<DesiredVersions>,
    pub ciphers: Option<DesiredCiphers>,

    /// Private key, inline PEM or path
    pub keyfile: Option<String>,
    /// Certificate (chain), inline PEM or path
    pub certfile: Option<String>,
    /// Trusted CA bundle, inline PEM or path; may be blank
    pub cacertfile: Option<String>,
    /// Password of an encrypted `keyfile`
    pub password: Option<SecretString>,

    pub verify: Option<VerifyMode>,
    pub server_name_indication: Option<ServerNameIndication>,
    pub depth: Option<u32>,
    #[serde(deserialize_with = "de::opt_duration")]
    pub handshake_timeout: Option<Duration>,
    pub dhfile: Option<String>,
    #[serde(deserialize_with = "de::opt_bool")]
    pub enable_crl_check: Option<bool>,
    #[serde(deserialize_with = "de::opt_bool")]
    pub reuse_sessions: Option<bool>,
    #[serde(deserialize_with = "de::opt_bool")]
    pub secure_renegotiate: Option<bool>,
    #[serde(deserialize_with = "de::opt_bool")]
    pub client_renegotiation: Option<bool>,
    #[serde(deserialize_with = "de::opt_bool")]
    pub honor_cipher_order: Option<bool>,
    #[serde(deserialize_with = "de::opt_bool")]
    pub fail_if_no_peer_cert: Option<bool>,
    #[serde(deserialize_with = "de::opt_duration")]
    pub hibernate_after: Option<Duration>,
    pub log_level: Option<String>,
    /// Custom PSK identity lookup, by name
    pub user_lookup_fun: Option<String>,
    pub partial_chain: Option<PartialChain>,
    /// Required extended key usage of peer certificates (e.g. `clientAuth`)
    pub verify_peer_ext_key_usage: Option<String>,
    pub ocsp: Option<OcspOptions>,

    /// Service provider certificate (single sign-on backends)
    pub sp_public_key: Option<String>,
    /// Service provider private key (single sign-on backends)
    pub sp_private_key: Option<String>,

    /// Unrecognized options, passed through to the handshake engine
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TlsOptions {
    /// Normalize a raw configuration map.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// New enabled configuration
    pub fn enabled() -> Self {
        TlsOptions {
            enable: Some(true),
            ..Default::default()
        }
    }

    /// New disabled configuration
    pub fn disabled() -> Self {
        TlsOptions {
            enable: Some(false),
            ..Default::default()
        }
    }

    /// Explicitly disabled (`enable = false`)
    pub fn is_disabled(&self) -> bool {
        self.enable == Some(false)
    }

    pub fn versions(mut self, versions: impl Into<DesiredVersions>) -> Self {
        self.versions = Some(versions.into());
        self
    }

    pub fn ciphers(mut self, ciphers: impl Into<DesiredCiphers>) -> Self {
        self.ciphers = Some(ciphers.into());
        self
    }

    pub fn certfile(mut self, pem_or_path: impl Into<String>) -> Self {
        self.certfile = Some(pem_or_path.into());
        self
    }

    pub fn keyfile(mut self, pem_or_path: impl Into<String>) -> Self {
        self.keyfile = Some(pem_or_path.into());
        self
    }

    pub fn cacertfile(mut self, pem_or_path: impl Into<String>) -> Self {
        self.cacertfile = Some(pem_or_path.into());
        self
    }

    pub fn password(mut self, password: impl Into<SecretString>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn verify(mut self, mode: VerifyMode) -> Self {
        self.verify = Some(mode);
        self
    }

    pub fn server_name_indication(mut self, sni: ServerNameIndication) -> Self {
        self.server_name_indication = Some(sni);
        self
    }

    pub fn enable_crl_check(mut self, enable: bool) -> Self {
        self.enable_crl_check = Some(enable);
        self
    }

    /// Add a pass-through option
    pub fn extra(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }
}

/// Certificate and key fields that may hold inline PEM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SslFileKey {
    KeyFile,
    CertFile,
    CaCertFile,
    OcspIssuerPem,
    SpPublicKey,
    SpPrivateKey,
}

impl SslFileKey {
    /// Processing order
    pub const ALL: [SslFileKey; 6] = [
        SslFileKey::KeyFile,
        SslFileKey::CertFile,
        SslFileKey::CaCertFile,
        SslFileKey::OcspIssuerPem,
        SslFileKey::SpPublicKey,
        SslFileKey::SpPrivateKey,
    ];

    /// Access path inside the `ssl` section
    pub fn path(self) -> &'static [&'static str] {
        match self {
            SslFileKey::KeyFile => &["keyfile"],
            SslFileKey::CertFile => &["certfile"],
            SslFileKey::CaCertFile => &["cacertfile"],
            SslFileKey::OcspIssuerPem => &["ocsp", "issuer_pem"],
            SslFileKey::SpPublicKey => &["sp_public_key"],
            SslFileKey::SpPrivateKey => &["sp_private_key"],
        }
    }

    /// Dotted path, for messages
    pub fn name(self) -> String {
        self.path().join(".")
    }

    pub fn pem_kind(self) -> PemKind {
        match self {
            SslFileKey::CertFile | SslFileKey::SpPublicKey => PemKind::Certificate,
            SslFileKey::KeyFile | SslFileKey::SpPrivateKey => PemKind::PrivateKey,
            SslFileKey::CaCertFile | SslFileKey::OcspIssuerPem => PemKind::Other,
        }
    }

    /// Whether an empty value is acceptable
    pub fn allows_blank(self) -> bool {
        self == SslFileKey::CaCertFile
    }

    pub fn get(self, options: &TlsOptions) -> Option<&str> {
        let value = match self {
            SslFileKey::KeyFile => &options.keyfile,
            SslFileKey::CertFile => &options.certfile,
            SslFileKey::CaCertFile => &options.cacertfile,
            SslFileKey::OcspIssuerPem => &options.ocsp.as_ref()?.issuer_pem,
            SslFileKey::SpPublicKey => &options.sp_public_key,
            SslFileKey::SpPrivateKey => &options.sp_private_key,
        };
        value.as_deref()
    }

    /// The field itself; `None` when its parent section is absent.
    pub fn slot_mut(self, options: &mut TlsOptions) -> Option<&mut Option<String>> {
        match self {
            SslFileKey::KeyFile => Some(&mut options.keyfile),
            SslFileKey::CertFile => Some(&mut options.certfile),
            SslFileKey::CaCertFile => Some(&mut options.cacertfile),
            SslFileKey::OcspIssuerPem => options.ocsp.as_mut().map(|ocsp| &mut ocsp.issuer_pem),
            SslFileKey::SpPublicKey => Some(&mut options.sp_public_key),
            SslFileKey::SpPrivateKey => Some(&mut options.sp_private_key),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoolOrString {
    Bool(bool),
    Str(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MillisOrString {
    Millis(u64),
    Str(String),
}

/// Parse a duration with unit suffix (e.g. "500ms", "15s", "5m", "1h")
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num, unit) = if let Some(num) = s.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = s.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = s.strip_suffix('m') {
        (num, "m")
    } else if let Some(num) = s.strip_suffix('h') {
        (num, "h")
    } else {
        (s, "ms")
    };

    let value: u64 = num
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {num}"))?;

    let factor: u64 = match unit {
        "ms" => 1,
        "s" => 1000,
        "m" => 60 * 1000,
        _ => 60 * 60 * 1000,
    };
    let millis = value
        .checked_mul(factor)
        .ok_or_else(|| format!("Duration too large: {s}"))?;

    Ok(Duration::from_millis(millis))
}

mod de {
    use super::*;
    use serde::de::Error;

    pub fn opt_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<BoolOrString>::deserialize(deserializer)? {
            None => Ok(None),
            Some(BoolOrString::Bool(b)) => Ok(Some(b)),
            Some(BoolOrString::Str(s)) => match s.as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                other => Err(D::Error::custom(format!("expected a boolean, got {other:?}"))),
            },
        }
    }

    pub fn opt_duration<'de, D>(deserializer: D) -> std::result::Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<MillisOrString>::deserialize(deserializer)? {
            None => Ok(None),
            Some(MillisOrString::Millis(ms)) => Ok(Some(Duration::from_millis(ms))),
            Some(MillisOrString::Str(s)) => parse_duration(&s).map(Some).map_err(D::Error::custom),
        }
    }
}
