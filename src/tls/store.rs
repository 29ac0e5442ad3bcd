//! Content-addressed certificate store
//!
//! Inline PEM is written to `<root>/<dir>/<keypath>-<fingerprint>`, where the
//! fingerprint hashes the directory name, the key path and the content. Every
//! node of a cluster therefore derives the same path for the same input.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use openssl::sha::Sha256;
use tracing::debug;

/// Number of hash bytes kept in a file name
const FINGERPRINT_LEN: usize = 8;

/// A materialized PEM file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Directory relative to the store root
    pub directory: String,
    /// Normalized key path, e.g. `cert`, `ocsp_issuer_pem`
    pub keypath: String,
    /// Hex fingerprint
    pub fingerprint: String,
}

impl StoredFile {
    pub fn new(directory: &str, keypath: &[&str], content: &[u8]) -> Self {
        let keypath = normalize_keypath(keypath);
        let fingerprint = fingerprint(directory, &keypath, content);
        StoredFile {
            directory: directory.to_string(),
            keypath,
            fingerprint,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}", self.keypath, self.fingerprint)
    }

    /// Full path under `store`
    pub fn path(&self, store: &CertStore) -> PathBuf {
        store.pem_dir(&self.directory).join(self.file_name())
    }
}

/// Join the segments with `_` and strip every `file`.
pub fn normalize_keypath(keypath: &[&str]) -> String {
    keypath.join("_").replace("file", "")
}

/// First 8 bytes of SHA-256 over directory, key path and content, as hex.
pub fn fingerprint(directory: &str, keypath: &str, content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(directory.as_bytes());
    hasher.update(keypath.as_bytes());
    hasher.update(content);
    hex::encode(&hasher.finish()[..FINGERPRINT_LEN])
}

/// Whether `path` looks like a file written by the store.
///
/// The base name must split on `-` into exactly two parts with a hex suffix.
pub fn is_managed_ssl_file(path: impl AsRef<Path>) -> bool {
    let Some(name) = path.as_ref().file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let parts: Vec<&str> = name.split('-').collect();
    match parts.as_slice() {
        [_, suffix] => !suffix.is_empty() && hex::decode(suffix).is_ok(),
        _ => false,
    }
}

/// Failure while persisting a file
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create directory: {0}")]
    CreateDir(#[source] std::io::Error),
    #[error("failed to write file: {0}")]
    Write(#[source] std::io::Error),
}

/// Store rooted at the mutable certificates directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertStore {
    root: PathBuf,
}

impl CertStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CertStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the files of `dir`
    pub fn pem_dir(&self, dir: &str) -> PathBuf {
        self.root.join(dir)
    }

    /// Write `content` to the file's path, replacing any previous file.
    ///
    /// The content goes to a temporary file in the same directory first and
    /// is then renamed into place.
    pub fn save(&self, file: &StoredFile, content: &[u8]) -> Result<PathBuf, StoreError> {
        let path = file.path(self);
        let dir = self.pem_dir(&file.directory);
        fs::create_dir_all(&dir).map_err(StoreError::CreateDir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(StoreError::Write)?;
        tmp.write_all(content).map_err(StoreError::Write)?;
        tmp.as_file().sync_all().map_err(StoreError::Write)?;
        tmp.persist(&path).map_err(|e| StoreError::Write(e.error))?;

        debug!(path = %path.display(), bytes = content.len(), "saved PEM file");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_keypath() {
        assert_eq!(normalize_keypath(&["certfile"]), "cert");
        assert_eq!(normalize_keypath(&["keyfile"]), "key");
        assert_eq!(normalize_keypath(&["cacertfile"]), "cacert");
        assert_eq!(normalize_keypath(&["ocsp", "issuer_pem"]), "ocsp_issuer_pem");
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = fingerprint("listeners", "cert", b"content");
        assert_eq!(a, fingerprint("listeners", "cert", b"content"));
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        assert_ne!(a, fingerprint("listeners", "cert", b"contenT"));
        assert_ne!(a, fingerprint("listener", "cert", b"content"));
        assert_ne!(a, fingerprint("listeners", "key", b"content"));
    }

    #[test]
    fn test_stored_file_name() {
        let file = StoredFile::new("authn", &["ocsp", "issuer_pem"], b"pem");
        assert_eq!(file.file_name(), format!("ocsp_issuer_pem-{}", file.fingerprint));

        let store = CertStore::new("/var/lib/certs");
        assert_eq!(
            file.path(&store),
            PathBuf::from("/var/lib/certs/authn").join(file.file_name())
        );
    }

    #[test]
    fn test_is_managed_ssl_file() {
        let file = StoredFile::new("authn", &["certfile"], b"pem");
        assert!(is_managed_ssl_file(format!("/data/certs/authn/{}", file.file_name())));
        assert!(is_managed_ssl_file("key-0123456789ABCDEF"));
        assert!(!is_managed_ssl_file("/etc/ssl/server.pem"));
        assert!(!is_managed_ssl_file("ocsp-issuer-0123456789abcdef"));
        assert!(!is_managed_ssl_file("cert-xyz"));
        assert!(!is_managed_ssl_file("cert-"));
    }

    #[test]
    fn test_save_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CertStore::new(tmp.path());
        let file = StoredFile::new("listeners", &["certfile"], b"one");

        let path = store.save(&file, b"one").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"one");

        let again = store.save(&file, b"one").unwrap();
        assert_eq!(path, again);
        assert_eq!(fs::read_dir(store.pem_dir("listeners")).unwrap().count(), 1);
    }

    #[test]
    fn test_save_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"").unwrap();

        let file = StoredFile::new("listeners", &["certfile"], b"one");
        let err = CertStore::new(&blocker).save(&file, b"one").unwrap_err();
        assert!(matches!(err, StoreError::CreateDir(_)));
        assert!(err.to_string().starts_with("failed to create directory: "));
        assert!(std::error::Error::source(&err).is_some());

        let store = CertStore::new(tmp.path());
        fs::create_dir_all(file.path(&store)).unwrap();
        let err = store.save(&file, b"one").unwrap_err();
        assert!(matches!(err, StoreError::Write(_)));
        assert!(err.to_string().starts_with("failed to write file: "));
    }
}
