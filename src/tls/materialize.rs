//! Certificate materialization
//!
//! Walks the certificate and key fields of a [`TlsOptions`]. Inline PEM is
//! validated and written to the [`CertStore`], and the field is replaced by
//! the stored path. File paths are validated in place and never rewritten.

use std::fs;
use std::io::ErrorKind;

use tracing::{debug, info};

use super::config::{SslFileKey, TlsOptions};
use super::env::interpolate;
use super::error::TlsError;
use super::pem::{self as pemfile, DecodeError, PemKind, PemOrPath};
use super::store::{CertStore, StoreError, StoredFile};
use super::Result;

/// Materialization settings
#[derive(Debug, Clone, Default)]
pub struct MaterializeOptions {
    /// Compute paths and validate, but write nothing
    pub dry_run: bool,
    /// Fields that must be present
    pub required_keys: Vec<SslFileKey>,
}

impl MaterializeOptions {
    pub fn dry_run() -> Self {
        MaterializeOptions {
            dry_run: true,
            ..Default::default()
        }
    }

    pub fn require(mut self, keys: impl IntoIterator<Item = SslFileKey>) -> Self {
        self.required_keys.extend(keys);
        self
    }
}

/// Validate every certificate field and persist inline PEM under `dir`.
///
/// Returns the configuration with inline PEM replaced by stored paths. Stops
/// at the first invalid field.
pub fn ensure_ssl_files(
    store: &CertStore,
    dir: &str,
    options: &TlsOptions,
    settings: &MaterializeOptions,
) -> Result<TlsOptions> {
    if options.is_disabled() {
        return Ok(options.clone());
    }

    check_required(options, settings)?;

    let mut materialized = options.clone();
    for key in SslFileKey::ALL {
        ensure_ssl_file(store, dir, key, &mut materialized, settings.dry_run)?;
    }
    Ok(materialized)
}

fn check_required(options: &TlsOptions, settings: &MaterializeOptions) -> Result<()> {
    let mut required = settings.required_keys.clone();
    let stapling = options
        .ocsp
        .as_ref()
        .and_then(|ocsp| ocsp.enable_ocsp_stapling)
        .unwrap_or(false);
    if stapling && !required.contains(&SslFileKey::OcspIssuerPem) {
        required.push(SslFileKey::OcspIssuerPem);
    }

    let missing_options: Vec<String> = required
        .into_iter()
        .filter(|key| key.get(options).is_none())
        .map(SslFileKey::name)
        .collect();

    if missing_options.is_empty() {
        Ok(())
    } else {
        Err(TlsError::SslFileOptionNotFound { missing_options })
    }
}

fn ensure_ssl_file(
    store: &CertStore,
    dir: &str,
    key: SslFileKey,
    options: &mut TlsOptions,
    dry_run: bool,
) -> Result<()> {
    let Some(value) = key.get(options) else {
        return Ok(());
    };

    if value.is_empty() {
        if key.allows_blank() {
            return Ok(());
        }
        return Err(TlsError::PemFilePathOrStringIsRequired { which_option: key.name() });
    }

    if !pemfile::is_printable(value) {
        return Err(TlsError::InvalidFilePathOrPemString { which_option: key.name() });
    }

    let password = options.password.as_ref().map(|p| p.expose().as_str());
    match PemOrPath::classify(value) {
        PemOrPath::Inline(content) => {
            pemfile::validate(key.pem_kind(), &content, password).map_err(|e| field_error(key, e, None))?;

            let file = StoredFile::new(dir, key.path(), &content);
            let path = file.path(store);
            if !dry_run {
                store.save(&file, &content).map_err(|e| store_error(key, &path, e))?;
                info!(option = %key.name(), path = %path.display(), "materialized inline PEM");
            }
            if let Some(slot) = key.slot_mut(options) {
                *slot = Some(path.to_string_lossy().into_owned());
            }
            Ok(())
        }
        PemOrPath::FilePath(path) => {
            let resolved = interpolate(&path);
            let content = match fs::read(&*resolved) {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound && dry_run => {
                    debug!(option = %key.name(), path = %resolved, "file not found, ignored in dry run");
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(TlsError::CertFileNotFound {
                        which_option: Some(key.name()),
                        file_path: resolved.into_owned(),
                    });
                }
                Err(e) => {
                    return Err(TlsError::FailedToReadFile {
                        which_option: key.name(),
                        file_path: resolved.into_owned(),
                        cause: e.to_string(),
                    });
                }
            };
            pemfile::validate(key.pem_kind(), &content, password)
                .map_err(|e| field_error(key, e, Some(resolved.into_owned())))
        }
    }
}

fn field_error(key: SslFileKey, err: DecodeError, file_path: Option<String>) -> TlsError {
    let which_option = key.name();
    match (err, key.pem_kind()) {
        (DecodeError::NotPem, PemKind::Other) => TlsError::InvalidPem {
            which_option,
            file_path: file_path.unwrap_or_default(),
        },
        (DecodeError::NotPem | DecodeError::CertificateParse, PemKind::Certificate) => {
            TlsError::FailedToParseCertfile { which_option, file_path }
        }
        (DecodeError::EncryptedKeyMissingPassword, _) => {
            TlsError::EncryptedKeyfileMissingPassword { which_option, file_path }
        }
        (DecodeError::BadPasswordOrInvalidKey, _) => TlsError::BadPasswordOrInvalidKeyfile { which_option, file_path },
        _ => TlsError::FailedToParseKeyfile { which_option, file_path },
    }
}

fn store_error(key: SslFileKey, path: &std::path::Path, err: StoreError) -> TlsError {
    let file_path = path.display().to_string();
    match err {
        StoreError::CreateDir(e) => TlsError::FailedToCreateDirFor {
            which_option: key.name(),
            file_path,
            cause: e.to_string(),
        },
        StoreError::Write(e) => TlsError::FailedToWriteFile {
            which_option: key.name(),
            file_path,
            cause: e.to_string(),
        },
    }
}

/// Inline PEM, or a path to a readable file holding PEM.
pub fn is_valid_pem_file(value: &str) -> bool {
    match PemOrPath::classify(value) {
        PemOrPath::Inline(_) => true,
        PemOrPath::FilePath(path) => fs::read(&*interpolate(&path))
            .map(|content| pemfile::is_pem(&content))
            .unwrap_or(false),
    }
}

/// Remove certificate fields that would not validate.
///
/// A disabled configuration loses all of them. Nothing here fails: the
/// caller notices the missing fields.
pub fn drop_invalid_certs(options: &TlsOptions) -> TlsOptions {
    let mut checked = options.clone();
    let disabled = options.is_disabled();

    for key in SslFileKey::ALL {
        let keep = !disabled && key.get(options).map_or(true, is_valid_pem_file);
        if keep {
            continue;
        }
        if let Some(slot) = key.slot_mut(&mut checked) {
            if slot.take().is_some() && !disabled {
                debug!(option = %key.name(), "dropped invalid certificate option");
            }
        }
    }
    checked
}
