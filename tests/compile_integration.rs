//! Option compilation integration tests
//!
//! Raw JSON configuration goes in, an ordered and version-filtered option
//! list comes out.

use serde_json::json;
use std::fs;
use tlsopts::tls::{
    ensure_ssl_files, CertStore, CompileSettings, CryptoRuntime, Hook, MaterializeOptions, OptionCompiler,
    OptionValue, Protocol, Role, StaticRuntime, TlsError, TlsOptions, TlsVersion,
};

const CERT: &str = include_str!("fixtures/server.crt");
const KEY: &str = include_str!("fixtures/server.key");

#[test]
fn test_listener_from_json() {
    let tmp = tempfile::tempdir().unwrap();
    let store = CertStore::new(tmp.path());
    let runtime = StaticRuntime::modern();

    let options = TlsOptions::from_value(json!({
        "versions": ["tlsv1.2", "1.3", "tlsv1.2"],
        "ciphers": "ECDHE-RSA-AES128-GCM-SHA256, AES128-SHA256",
        "certfile": CERT,
        "keyfile": KEY,
        "cacertfile": "",
        "verify": "verify_peer",
        "fail_if_no_peer_cert": "true",
        "depth": 3,
        "handshake_timeout": "5s",
    }))
    .unwrap();
    let options = ensure_ssl_files(&store, "listeners/ssl", &options, &MaterializeOptions::default()).unwrap();

    let compiled = OptionCompiler::new(&runtime)
        .compile(Role::Server, Protocol::Tls, &options)
        .unwrap();

    assert_eq!(
        compiled.get("versions"),
        Some(&OptionValue::Versions(vec![TlsVersion::Tls12, TlsVersion::Tls13]))
    );
    match compiled.get("ciphers") {
        Some(OptionValue::List(ciphers)) => {
            // TLS 1.3 defaults are prepended to a legacy-only list
            assert!(ciphers[0].starts_with("TLS_"));
            assert_eq!(&ciphers[ciphers.len() - 2..], ["ECDHE-RSA-AES128-GCM-SHA256", "AES128-SHA256"]);
        }
        other => panic!("unexpected ciphers: {:?}", other),
    }
    assert_eq!(compiled.get("certfile"), Some(&OptionValue::Str(options.certfile.clone().unwrap())));
    assert!(!compiled.contains("cacertfile"));
    assert_eq!(compiled.get("fail_if_no_peer_cert"), Some(&OptionValue::Bool(true)));
    assert_eq!(compiled.get("depth"), Some(&OptionValue::Int(3)));
    assert_eq!(
        compiled.get("user_lookup_fun"),
        Some(&OptionValue::Hook(Hook::DefaultPskLookup))
    );
}

#[test]
fn test_early_data_follows_versions() {
    let runtime = StaticRuntime::modern();
    let compiler = OptionCompiler::new(&runtime);
    let base = TlsOptions::from_value(json!({"enable": true, "early_data": "enabled"})).unwrap();

    let tls12 = compiler
        .compile(Role::Client, Protocol::Tls, &base.clone().versions("tlsv1.2"))
        .unwrap();
    assert!(!tls12.contains("early_data"));

    let tls13 = compiler
        .compile(Role::Client, Protocol::Tls, &base.versions("tlsv1.3"))
        .unwrap();
    assert_eq!(tls13.get("early_data"), Some(&OptionValue::Json(json!("enabled"))));
}

#[test]
fn test_custom_user_lookup_fun() {
    let runtime = StaticRuntime::modern();
    let options = TlsOptions::from_value(json!({"versions": "tlsv1.2", "user_lookup_fun": "psk_store"})).unwrap();
    let compiled = OptionCompiler::new(&runtime)
        .compile(Role::Server, Protocol::Tls, &options)
        .unwrap();
    assert_eq!(
        compiled.get("user_lookup_fun"),
        Some(&OptionValue::Hook(Hook::Named("psk_store".to_string())))
    );
}

#[test]
fn test_crl_timeout_from_settings() {
    let runtime = StaticRuntime::modern();
    let settings = CompileSettings {
        crl_http_timeout: std::time::Duration::from_secs(3),
        ..Default::default()
    };
    let compiled = OptionCompiler::new(&runtime)
        .with_settings(settings)
        .compile(Role::Server, Protocol::Tls, &TlsOptions::enabled().enable_crl_check(true))
        .unwrap();
    assert_eq!(
        serde_json::to_value(compiled.get("crl_cache").unwrap()).unwrap(),
        json!({"http_timeout": 3000})
    );
}

#[test]
fn test_server_paths_present_on_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let cert = tmp.path().join("cert.pem");
    fs::write(&cert, CERT).unwrap();

    let runtime = StaticRuntime::modern();
    let options = TlsOptions::enabled()
        .certfile(cert.to_str().unwrap())
        .keyfile(tmp.path().join("missing.pem").to_str().unwrap());
    let compiled = OptionCompiler::new(&runtime)
        .compile(Role::Server, Protocol::Tls, &options)
        .unwrap();
    assert!(compiled.contains("certfile"));
    assert!(!compiled.contains("keyfile"));
}

#[test]
fn test_runtime_without_requested_version() {
    let runtime = StaticRuntime::new().with_tls_versions([TlsVersion::Tls12]);
    let err = OptionCompiler::new(&runtime)
        .compile(Role::Client, Protocol::Tls, &TlsOptions::enabled().versions("tlsv1.3"))
        .unwrap_err();
    assert_eq!(
        err.to_map(),
        json!({
            "reason": "no_available_tls_version",
            "desired": ["tlsv1.3"],
            "available": ["tlsv1.2"],
        })
    );
    assert!(matches!(err, TlsError::NoAvailableTlsVersion { .. }));
    assert!(runtime.known_ciphers().iter().any(|c| c.starts_with("PSK-")));
}
