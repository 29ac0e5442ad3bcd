//! Certificate materialization integration tests
//!
//! These tests exercise the content-addressed store end to end:
//! - Inline certificates and keys are validated and written once
//! - Identical input maps to the identical path
//! - Encrypted keys need the right password
//! - Files referenced by path are validated but never rewritten

use openssl::pkey::PKey;
use openssl::symm::Cipher;
use serde_json::json;
use std::fs;
use tlsopts::tls::{
    drop_invalid_certs, ensure_ssl_files, is_managed_ssl_file, CertStore, MaterializeOptions, SslFileKey, StoredFile,
    TlsError, TlsOptions,
};

const CERT: &str = include_str!("fixtures/server.crt");
const KEY: &str = include_str!("fixtures/server.key");

fn encrypted_key(password: &[u8]) -> String {
    let pem = PKey::private_key_from_pem(KEY.as_bytes())
        .unwrap()
        .private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), password)
        .unwrap();
    String::from_utf8(pem).unwrap()
}

#[test]
fn test_same_content_same_path_across_stores() {
    // Two nodes with different roots agree on the relative file name
    let node_a = tempfile::tempdir().unwrap();
    let node_b = tempfile::tempdir().unwrap();
    let options = TlsOptions::enabled().certfile(CERT).keyfile(KEY);

    let a = ensure_ssl_files(&CertStore::new(node_a.path()), "ssl", &options, &MaterializeOptions::default()).unwrap();
    let b = ensure_ssl_files(&CertStore::new(node_b.path()), "ssl", &options, &MaterializeOptions::default()).unwrap();

    let name = |p: &Option<String>| {
        std::path::Path::new(p.as_deref().unwrap())
            .file_name()
            .unwrap()
            .to_owned()
    };
    assert_eq!(name(&a.certfile), name(&b.certfile));
    assert_eq!(name(&a.keyfile), name(&b.keyfile));
    assert_ne!(name(&a.certfile), name(&a.keyfile));
}

#[test]
fn test_changed_byte_changes_fingerprint() {
    let mut altered = CERT.to_string();
    altered.push('\n');

    let one = StoredFile::new("ssl", &["certfile"], CERT.as_bytes());
    let two = StoredFile::new("ssl", &["certfile"], altered.as_bytes());
    assert_ne!(one.fingerprint, two.fingerprint);
    assert_eq!(one, StoredFile::new("ssl", &["certfile"], CERT.as_bytes()));
}

#[test]
fn test_materialized_certificate_validates_as_path() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertStore::new(tmp.path());

    let out = ensure_ssl_files(&store, "ssl", &TlsOptions::enabled().certfile(CERT), &MaterializeOptions::default())
        .unwrap();
    let path = out.certfile.clone().unwrap();
    assert!(is_managed_ssl_file(&path));

    let by_path = TlsOptions::enabled().certfile(path.clone());
    let again = ensure_ssl_files(&store, "other", &by_path, &MaterializeOptions::default()).unwrap();
    assert_eq!(again.certfile.as_deref(), Some(path.as_str()));
}

#[test]
fn test_malformed_certificate_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertStore::new(tmp.path());
    let bad = pem::encode(&pem::Pem::new("CERTIFICATE", b"definitely not DER".to_vec()));

    let err = ensure_ssl_files(&store, "ssl", &TlsOptions::enabled().certfile(bad), &MaterializeOptions::default())
        .unwrap_err();
    assert_eq!(
        err,
        TlsError::FailedToParseCertfile {
            which_option: "certfile".to_string(),
            file_path: None,
        }
    );
    assert!(!store.pem_dir("ssl").exists());
}

#[test]
fn test_encrypted_key_passwords() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertStore::new(tmp.path());
    let key = encrypted_key(b"s3cret");
    let settings = MaterializeOptions::default();

    let err = ensure_ssl_files(&store, "ssl", &TlsOptions::enabled().keyfile(key.clone()), &settings).unwrap_err();
    assert!(matches!(err, TlsError::EncryptedKeyfileMissingPassword { .. }));

    let wrong = TlsOptions::enabled().keyfile(key.clone()).password("nope");
    let err = ensure_ssl_files(&store, "ssl", &wrong, &settings).unwrap_err();
    assert!(matches!(err, TlsError::BadPasswordOrInvalidKeyfile { .. }));

    let right = TlsOptions::enabled().keyfile(key.clone()).password("s3cret");
    let out = ensure_ssl_files(&store, "ssl", &right, &settings).unwrap();
    assert_eq!(fs::read_to_string(out.keyfile.unwrap()).unwrap(), key);
}

#[test]
fn test_encrypted_key_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertStore::new(tmp.path().join("store"));
    let path = tmp.path().join("key.pem");
    fs::write(&path, encrypted_key(b"s3cret")).unwrap();
    let path = path.to_str().unwrap().to_string();

    let err = ensure_ssl_files(
        &store,
        "ssl",
        &TlsOptions::enabled().keyfile(path.clone()),
        &MaterializeOptions::default(),
    )
    .unwrap_err();
    assert_eq!(
        err.to_map(),
        json!({
            "reason": "encrypted_keyfile_missing_password",
            "which_option": "keyfile",
            "file_path": path,
        })
    );
}

#[test]
fn test_env_interpolated_path() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("ca.pem"), CERT).unwrap();
    std::env::set_var("TLSOPTS_IT_CERT_DIR", tmp.path());

    let options = TlsOptions::enabled().cacertfile("${TLSOPTS_IT_CERT_DIR}/ca.pem");
    let out = ensure_ssl_files(
        &CertStore::new(tmp.path().join("store")),
        "ssl",
        &options,
        &MaterializeOptions::default(),
    )
    .unwrap();
    // Paths are validated, never rewritten
    assert_eq!(out.cacertfile.as_deref(), Some("${TLSOPTS_IT_CERT_DIR}/ca.pem"));
    std::env::remove_var("TLSOPTS_IT_CERT_DIR");
}

#[test]
fn test_sp_keys_from_json() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertStore::new(tmp.path());
    let options = TlsOptions::from_value(json!({
        "enable": "true",
        "sp_public_key": CERT,
        "sp_private_key": KEY,
    }))
    .unwrap();

    let settings = MaterializeOptions::default().require([SslFileKey::SpPublicKey, SslFileKey::SpPrivateKey]);
    let out = ensure_ssl_files(&store, "authn/saml", &options, &settings).unwrap();
    assert!(out.sp_public_key.unwrap().contains("sp_public_key-"));
    assert!(out.sp_private_key.unwrap().contains("sp_private_key-"));
}

#[test]
fn test_drop_invalid_certs_keeps_valid_fields() {
    let tmp = tempfile::tempdir().unwrap();
    let ca = tmp.path().join("ca.pem");
    fs::write(&ca, CERT).unwrap();
    let junk = tmp.path().join("junk.pem");
    fs::write(&junk, "junk").unwrap();

    let options = TlsOptions::enabled()
        .certfile(CERT)
        .cacertfile(ca.to_str().unwrap())
        .keyfile(junk.to_str().unwrap());
    let checked = drop_invalid_certs(&options);
    assert_eq!(checked.certfile, options.certfile);
    assert_eq!(checked.cacertfile, options.cacertfile);
    assert_eq!(checked.keyfile, None);
}
