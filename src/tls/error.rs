//! TLS option errors
//!
//! Errors serialize to a structured map tagged by `reason`, so the config API
//! can point at the offending field:
//!
//! ```text
//! {"reason": "failed_to_parse_certfile", "which_option": "certfile"}
//! ```

use serde::Serialize;

use super::version::TlsVersion;

/// TLS errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TlsError {
    #[error("no available TLS version (desired: {desired:?}, available: {available:?})")]
    NoAvailableTlsVersion {
        desired: Vec<TlsVersion>,
        available: Vec<TlsVersion>,
    },

    #[error("{which_option}: PEM file path or string is required")]
    PemFilePathOrStringIsRequired { which_option: String },

    #[error("{which_option}: invalid file path or PEM string")]
    InvalidFilePathOrPemString { which_option: String },

    #[error("{which_option}: failed to parse certificate")]
    FailedToParseCertfile {
        which_option: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },

    #[error("{which_option}: failed to parse private key")]
    FailedToParseKeyfile {
        which_option: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },

    #[error("{which_option}: private key is encrypted but no password is configured")]
    EncryptedKeyfileMissingPassword {
        which_option: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },

    #[error("{which_option}: bad password or invalid private key")]
    BadPasswordOrInvalidKeyfile {
        which_option: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_path: Option<String>,
    },

    #[error("{which_option}: file content is not PEM: {file_path}")]
    InvalidPem { which_option: String, file_path: String },

    #[error("required SSL file options not found: {missing_options:?}")]
    SslFileOptionNotFound { missing_options: Vec<String> },

    #[error("{which_option}: failed to write {file_path}: {cause}")]
    FailedToWriteFile {
        which_option: String,
        file_path: String,
        cause: String,
    },

    #[error("{which_option}: failed to create directory for {file_path}: {cause}")]
    FailedToCreateDirFor {
        which_option: String,
        file_path: String,
        cause: String,
    },

    #[error("certificate file not found: {file_path}")]
    CertFileNotFound {
        #[serde(skip_serializing_if = "Option::is_none")]
        which_option: Option<String>,
        file_path: String,
    },

    #[error("{which_option}: failed to read {file_path}: {cause}")]
    FailedToReadFile {
        which_option: String,
        file_path: String,
        cause: String,
    },

    #[error("invalid TLS configuration: {cause}")]
    InvalidConfig { cause: String },
}

impl TlsError {
    /// Structured form of the error, for API responses
    pub fn to_map(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "reason": self.to_string() }))
    }

    /// The field this error is about, if any
    pub fn which_option(&self) -> Option<&str> {
        match self {
            TlsError::PemFilePathOrStringIsRequired { which_option }
            | TlsError::InvalidFilePathOrPemString { which_option }
            | TlsError::FailedToParseCertfile { which_option, .. }
            | TlsError::FailedToParseKeyfile { which_option, .. }
            | TlsError::EncryptedKeyfileMissingPassword { which_option, .. }
            | TlsError::BadPasswordOrInvalidKeyfile { which_option, .. }
            | TlsError::InvalidPem { which_option, .. }
            | TlsError::FailedToWriteFile { which_option, .. }
            | TlsError::FailedToCreateDirFor { which_option, .. }
            | TlsError::FailedToReadFile { which_option, .. } => Some(which_option),
            TlsError::CertFileNotFound { which_option, .. } => which_option.as_deref(),
            TlsError::NoAvailableTlsVersion { .. }
            | TlsError::SslFileOptionNotFound { .. }
            | TlsError::InvalidConfig { .. } => None,
        }
    }
}

impl From<serde_json::Error> for TlsError {
    fn from(err: serde_json::Error) -> Self {
        TlsError::InvalidConfig { cause: err.to_string() }
    }
}
