//! Option compilation
//!
//! Turns a [`TlsOptions`] into the ordered option list handed to the
//! handshake engine. Versions and ciphers are resolved against the crypto
//! runtime, recognized fields go through a declarative extractor table, and
//! the result is filtered by version compatibility.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use super::cipher::integral_ciphers;
use super::config::{PartialChain, TlsOptions, VerifyMode};
use super::env::interpolate;
use super::error::TlsError;
use super::options::{filter_by_versions, CompiledOptions, CrlCheck, Hook, HostnameCheck, OptionValue, SslOption};
use super::runtime::{CryptoRuntime, OpensslRuntime};
use super::version::{resolve_versions, ProtocolKind, TlsVersion};
use super::Result;

/// Default HTTP timeout for CRL fetches
pub const DEFAULT_CRL_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Default certificate chain depth
const DEFAULT_DEPTH: i64 = 10;

/// Default handshake timeout
const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Which end of the connection the options are for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Listener
    Server,
    /// Connector
    Client,
}

/// Transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tls,
    Dtls,
}

impl From<Protocol> for ProtocolKind {
    fn from(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Tls => ProtocolKind::Tls,
            Protocol::Dtls => ProtocolKind::Dtls,
        }
    }
}

/// Compiler settings
#[derive(Debug, Clone)]
pub struct CompileSettings {
    /// Passed to the CRL cache
    pub crl_http_timeout: Duration,
    /// Fail on missing server certificate paths instead of dropping them
    pub strict_cert_paths: bool,
}

impl Default for CompileSettings {
    fn default() -> Self {
        CompileSettings {
            crl_http_timeout: DEFAULT_CRL_HTTP_TIMEOUT,
            strict_cert_paths: false,
        }
    }
}

/// Extra server options contributed by an authentication backend
pub trait AuthExtension: Send + Sync {
    fn server_options(&self, config: &TlsOptions) -> Vec<SslOption>;
}

/// Contributes nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthExtension;

impl AuthExtension for NoAuthExtension {
    fn server_options(&self, _config: &TlsOptions) -> Vec<SslOption> {
        Vec::new()
    }
}

/// Maps `partial_chain` and `verify_peer_ext_key_usage` to hooks
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialChainExtension;

impl AuthExtension for PartialChainExtension {
    fn server_options(&self, config: &TlsOptions) -> Vec<SslOption> {
        let mut options = Vec::new();
        match config.partial_chain {
            None | Some(PartialChain::Disabled) => {}
            Some(mode) => options.push(SslOption::new(
                "partial_chain",
                OptionValue::Hook(Hook::PartialChain(mode.as_str().to_string())),
            )),
        }
        if let Some(usage) = &config.verify_peer_ext_key_usage {
            options.push(SslOption::new(
                "verify_fun",
                OptionValue::Hook(Hook::VerifyPeerExtKeyUsage(usage.clone())),
            ));
        }
        options
    }
}

/// Values the extractors read from
struct Inputs<'c> {
    config: &'c TlsOptions,
    versions: Vec<TlsVersion>,
    ciphers: Vec<String>,
    keyfile: Option<String>,
    certfile: Option<String>,
    cacertfile: Option<String>,
}

/// One recognized option
struct Extractor {
    name: &'static str,
    get: fn(&Inputs<'_>) -> Option<OptionValue>,
    default: Option<OptionValue>,
    omit_if: Option<OptionValue>,
}

impl Extractor {
    fn new(name: &'static str, get: fn(&Inputs<'_>) -> Option<OptionValue>) -> Self {
        Extractor {
            name,
            get,
            default: None,
            omit_if: None,
        }
    }

    fn default(mut self, value: OptionValue) -> Self {
        self.default = Some(value);
        self
    }

    fn omit_if(mut self, value: OptionValue) -> Self {
        self.omit_if = Some(value);
        self
    }

    fn extract(&self, inputs: &Inputs<'_>) -> Option<SslOption> {
        let value = (self.get)(inputs).or_else(|| self.default.clone())?;
        if self.omit_if.as_ref() == Some(&value) {
            return None;
        }
        Some(SslOption::new(self.name, value))
    }
}

fn run(table: &[Extractor], inputs: &Inputs<'_>) -> Vec<SslOption> {
    table.iter().filter_map(|ex| ex.extract(inputs)).collect()
}

fn str_opt(value: &Option<String>) -> Option<OptionValue> {
    value.clone().map(OptionValue::Str)
}

fn bool_opt(value: Option<bool>) -> Option<OptionValue> {
    value.map(OptionValue::Bool)
}

fn empty() -> OptionValue {
    OptionValue::Str(String::new())
}

fn versions(i: &Inputs<'_>) -> Option<OptionValue> {
    Some(OptionValue::Versions(i.versions.clone()))
}

fn ciphers(i: &Inputs<'_>) -> Option<OptionValue> {
    Some(OptionValue::List(i.ciphers.clone()))
}

fn password(i: &Inputs<'_>) -> Option<OptionValue> {
    i.config
        .password
        .as_ref()
        .map(|p| OptionValue::Str(p.expose().clone()))
}

fn verify(i: &Inputs<'_>) -> Option<OptionValue> {
    i.config.verify.map(OptionValue::Verify)
}

fn depth(i: &Inputs<'_>) -> Option<OptionValue> {
    i.config.depth.map(|d| OptionValue::Int(d.into()))
}

fn server_table() -> Vec<Extractor> {
    vec![
        Extractor::new("versions", versions),
        Extractor::new("ciphers", ciphers),
        Extractor::new("keyfile", |i: &Inputs<'_>| str_opt(&i.keyfile)),
        Extractor::new("certfile", |i: &Inputs<'_>| str_opt(&i.certfile)),
        Extractor::new("cacertfile", |i: &Inputs<'_>| str_opt(&i.cacertfile)),
        Extractor::new("password", password).omit_if(empty()),
        Extractor::new("verify", verify).default(OptionValue::Verify(VerifyMode::VerifyNone)),
        Extractor::new("fail_if_no_peer_cert", |i: &Inputs<'_>| bool_opt(i.config.fail_if_no_peer_cert)),
        Extractor::new("depth", depth).default(OptionValue::Int(DEFAULT_DEPTH)),
        Extractor::new("dhfile", |i: &Inputs<'_>| str_opt(&i.config.dhfile)).omit_if(empty()),
        Extractor::new("handshake_timeout", |i: &Inputs<'_>| {
            i.config.handshake_timeout.map(OptionValue::Duration)
        })
        .default(OptionValue::Duration(DEFAULT_HANDSHAKE_TIMEOUT)),
        Extractor::new("reuse_sessions", |i: &Inputs<'_>| bool_opt(i.config.reuse_sessions))
            .default(OptionValue::Bool(true)),
        Extractor::new("secure_renegotiate", |i: &Inputs<'_>| bool_opt(i.config.secure_renegotiate))
            .default(OptionValue::Bool(true)),
        Extractor::new("client_renegotiation", |i: &Inputs<'_>| bool_opt(i.config.client_renegotiation)),
        Extractor::new("honor_cipher_order", |i: &Inputs<'_>| bool_opt(i.config.honor_cipher_order))
            .default(OptionValue::Bool(true)),
        Extractor::new("hibernate_after", |i: &Inputs<'_>| {
            i.config.hibernate_after.map(OptionValue::Duration)
        }),
        Extractor::new("log_level", |i: &Inputs<'_>| str_opt(&i.config.log_level)),
    ]
}

fn client_table() -> Vec<Extractor> {
    vec![
        Extractor::new("keyfile", |i: &Inputs<'_>| str_opt(&i.keyfile)).omit_if(empty()),
        Extractor::new("certfile", |i: &Inputs<'_>| str_opt(&i.certfile)).omit_if(empty()),
        Extractor::new("cacertfile", |i: &Inputs<'_>| str_opt(&i.cacertfile)).omit_if(empty()),
        Extractor::new("verify", verify).default(OptionValue::Verify(VerifyMode::VerifyNone)),
        Extractor::new("server_name_indication", |i: &Inputs<'_>| {
            i.config.server_name_indication.clone().map(OptionValue::Sni)
        }),
        Extractor::new("versions", versions),
        Extractor::new("ciphers", ciphers),
        Extractor::new("reuse_sessions", |i: &Inputs<'_>| bool_opt(i.config.reuse_sessions))
            .default(OptionValue::Bool(true)),
        Extractor::new("depth", depth).default(OptionValue::Int(DEFAULT_DEPTH)),
        Extractor::new("password", password).omit_if(empty()),
        Extractor::new("secure_renegotiate", |i: &Inputs<'_>| bool_opt(i.config.secure_renegotiate))
            .default(OptionValue::Bool(true)),
    ]
}

/// Compiles [`TlsOptions`] against a crypto runtime
pub struct OptionCompiler<'a, R: CryptoRuntime + ?Sized> {
    runtime: &'a R,
    settings: CompileSettings,
    auth: &'a dyn AuthExtension,
}

impl<'a, R: CryptoRuntime + ?Sized> OptionCompiler<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        OptionCompiler {
            runtime,
            settings: CompileSettings::default(),
            auth: &NoAuthExtension,
        }
    }

    pub fn with_settings(mut self, settings: CompileSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_auth_extension(mut self, auth: &'a dyn AuthExtension) -> Self {
        self.auth = auth;
        self
    }

    pub fn compile(&self, role: Role, protocol: Protocol, config: &TlsOptions) -> Result<CompiledOptions> {
        match role {
            Role::Server => self.server_options(protocol, config),
            Role::Client => self.client_options(protocol, config),
        }
    }

    /// Listener options. An absent `enable` counts as enabled.
    pub fn server_options(&self, protocol: Protocol, config: &TlsOptions) -> Result<CompiledOptions> {
        if config.is_disabled() {
            return Ok(CompiledOptions::default());
        }

        let (versions, ciphers) = self.resolve(protocol, config)?;
        let inputs = Inputs {
            config,
            keyfile: self.server_path("keyfile", &config.keyfile)?,
            certfile: self.server_path("certfile", &config.certfile)?,
            cacertfile: self.server_path("cacertfile", &config.cacertfile)?,
            versions,
            ciphers,
        };

        let mut options = run(&server_table(), &inputs);

        if let Some(name) = &config.user_lookup_fun {
            options.push(SslOption::new("user_lookup_fun", OptionValue::Hook(Hook::Named(name.clone()))));
        } else if inputs.versions.iter().any(|v| !v.is_tls13()) {
            options.push(SslOption::new("user_lookup_fun", OptionValue::Hook(Hook::DefaultPskLookup)));
        }

        if config.enable_crl_check == Some(true) {
            options.push(SslOption::new("crl_check", OptionValue::CrlCheck(CrlCheck::Peer)));
            options.push(SslOption::new(
                "crl_cache",
                OptionValue::CrlCache {
                    http_timeout: self.settings.crl_http_timeout,
                },
            ));
        }

        options.extend(self.auth.server_options(config));
        Ok(self.finish(options, &inputs))
    }

    /// Connector options. An absent `enable` counts as disabled.
    pub fn client_options(&self, protocol: Protocol, config: &TlsOptions) -> Result<CompiledOptions> {
        if config.enable != Some(true) {
            return Ok(CompiledOptions::default());
        }

        let (versions, ciphers) = self.resolve(protocol, config)?;
        let inputs = Inputs {
            config,
            keyfile: client_path(&config.keyfile),
            certfile: client_path(&config.certfile),
            cacertfile: client_path(&config.cacertfile),
            versions,
            ciphers,
        };

        let mut options = run(&client_table(), &inputs);
        if config.verify == Some(VerifyMode::VerifyPeer) {
            options.push(SslOption::new(
                "customize_hostname_check",
                OptionValue::Hook(Hook::HostnameMatch(HostnameCheck::Https)),
            ));
        }
        Ok(self.finish(options, &inputs))
    }

    fn resolve(&self, protocol: Protocol, config: &TlsOptions) -> Result<(Vec<TlsVersion>, Vec<String>)> {
        let versions = resolve_versions(self.runtime, protocol.into(), config.versions.as_ref())?;
        let ciphers = integral_ciphers(self.runtime, &versions, config.ciphers.as_ref());
        Ok((versions, ciphers))
    }

    /// Interpolated path; a missing file counts as absent unless strict.
    fn server_path(&self, which: &str, value: &Option<String>) -> Result<Option<String>> {
        let Some(value) = value.as_deref().filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        let path = interpolate(value).into_owned();
        if Path::new(&path).exists() {
            return Ok(Some(path));
        }
        if self.settings.strict_cert_paths {
            return Err(TlsError::CertFileNotFound {
                which_option: Some(which.to_string()),
                file_path: path,
            });
        }
        warn!(option = which, file_path = %path, "cert_file_not_found");
        Ok(None)
    }

    fn finish(&self, mut options: Vec<SslOption>, inputs: &Inputs<'_>) -> CompiledOptions {
        for (name, value) in &inputs.config.extra {
            if options.iter().any(|o| &o.name == name) {
                debug!(option = %name, "extra option shadowed by a recognized one");
                continue;
            }
            options.push(SslOption::new(name.clone(), OptionValue::Json(value.clone())));
        }
        CompiledOptions::new(filter_by_versions(options, &inputs.versions))
    }
}

fn client_path(value: &Option<String>) -> Option<String> {
    value.as_deref().map(|v| interpolate(v).into_owned())
}

/// Compile against the linked OpenSSL.
pub fn compile(role: Role, protocol: Protocol, config: &TlsOptions) -> Result<CompiledOptions> {
    OptionCompiler::new(&OpensslRuntime).compile(role, protocol, config)
}
