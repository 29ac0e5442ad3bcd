//! PEM classification and validation
//!
//! A configured certificate or key field holds either PEM text or a file
//! path. Anything that decodes as PEM is inline content, everything else is
//! a path.

use bytes::Bytes;
use openssl::pkey::PKey;
use openssl::x509::X509;
use pem::Pem;

/// What a field is expected to contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemKind {
    /// Leading `CERTIFICATE` entry
    Certificate,
    /// Exactly one private key, possibly encrypted
    PrivateKey,
    /// Any PEM (CA bundles, issuer certificates)
    Other,
}

/// A configured value, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PemOrPath {
    Inline(Bytes),
    FilePath(String),
}

impl PemOrPath {
    pub fn classify(value: &str) -> Self {
        if is_pem(value.as_bytes()) {
            PemOrPath::Inline(Bytes::copy_from_slice(value.as_bytes()))
        } else {
            PemOrPath::FilePath(value.to_string())
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, PemOrPath::Inline(_))
    }
}

/// PEM validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("not PEM")]
    NotPem,
    #[error("certificate could not be decoded")]
    CertificateParse,
    #[error("private key could not be decoded")]
    KeyParse,
    #[error("private key is encrypted and no password was given")]
    EncryptedKeyMissingPassword,
    #[error("bad password or invalid private key")]
    BadPasswordOrInvalidKey,
}

/// Decode every PEM entry; `None` when there is none.
pub fn decode(content: &[u8]) -> Option<Vec<Pem>> {
    match pem::parse_many(content) {
        Ok(entries) if !entries.is_empty() => Some(entries),
        _ => None,
    }
}

pub fn is_pem(content: &[u8]) -> bool {
    decode(content).is_some()
}

/// Printable text: no control characters besides the common escapes
/// (`\n`, `\r`, `\t`, vertical tab, backspace, form feed, escape).
pub fn is_printable(value: &str) -> bool {
    value.chars().all(|c| {
        !c.is_control() || matches!(c, '\n' | '\r' | '\t' | '\u{0b}' | '\u{08}' | '\u{0c}' | '\u{1b}')
    })
}

fn is_encrypted(entry: &Pem) -> bool {
    entry.tag() == "ENCRYPTED PRIVATE KEY"
        || entry
            .headers()
            .get("Proc-Type")
            .map_or(false, |v| v.contains("ENCRYPTED"))
}

/// Check `content` against what `kind` expects.
pub fn validate(kind: PemKind, content: &[u8], password: Option<&str>) -> Result<(), DecodeError> {
    let entries = decode(content).ok_or(DecodeError::NotPem)?;
    match kind {
        PemKind::Certificate => validate_certificate(&entries),
        PemKind::PrivateKey => validate_private_key(&entries, content, password),
        PemKind::Other => Ok(()),
    }
}

fn validate_certificate(entries: &[Pem]) -> Result<(), DecodeError> {
    match entries.first() {
        Some(first) if first.tag() == "CERTIFICATE" && !is_encrypted(first) => X509::from_der(first.contents())
            .map(|_| ())
            .map_err(|_| DecodeError::CertificateParse),
        _ => Err(DecodeError::CertificateParse),
    }
}

fn validate_private_key(entries: &[Pem], content: &[u8], password: Option<&str>) -> Result<(), DecodeError> {
    let [entry] = entries else {
        return Err(DecodeError::KeyParse);
    };

    if !is_encrypted(entry) {
        return PKey::private_key_from_der(entry.contents())
            .map(|_| ())
            .map_err(|_| DecodeError::KeyParse);
    }

    let password = password.ok_or(DecodeError::EncryptedKeyMissingPassword)?;
    PKey::private_key_from_pem_passphrase(content, password.as_bytes())
        .map(|_| ())
        .map_err(|_| DecodeError::BadPasswordOrInvalidKey)
}
