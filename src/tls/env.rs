//! Environment interpolation for configured paths

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use tracing::warn;

fn pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("static pattern")
    })
}

/// Expand `${VAR}`, `${VAR:-default}` and `$VAR` in a configured path.
///
/// Unset variables without a default are kept verbatim.
pub fn interpolate(path: &str) -> Cow<'_, str> {
    if !path.contains('$') {
        return Cow::Borrowed(path);
    }

    pattern().replace_all(path, |caps: &Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();
        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => match caps.get(2) {
                Some(default) => default.as_str().to_string(),
                None => {
                    warn!(var = name, path = path, "environment variable not set");
                    caps[0].to_string()
                }
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path_is_borrowed() {
        assert!(matches!(interpolate("/etc/certs/cert.pem"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_braced_and_bare_variables() {
        std::env::set_var("TLSOPTS_TEST_CERTS", "/opt/certs");
        assert_eq!(interpolate("${TLSOPTS_TEST_CERTS}/cert.pem"), "/opt/certs/cert.pem");
        assert_eq!(interpolate("$TLSOPTS_TEST_CERTS/key.pem"), "/opt/certs/key.pem");
        std::env::remove_var("TLSOPTS_TEST_CERTS");
    }

    #[test]
    fn test_default_value() {
        assert_eq!(
            interpolate("${TLSOPTS_TEST_UNSET_DIR:-/var/lib}/ca.pem"),
            "/var/lib/ca.pem"
        );
    }

    #[test]
    fn test_unset_variable_is_kept() {
        assert_eq!(
            interpolate("${TLSOPTS_TEST_NOPE}/ca.pem"),
            "${TLSOPTS_TEST_NOPE}/ca.pem"
        );
        assert_eq!(interpolate("$TLSOPTS_TEST_NOPE/ca.pem"), "$TLSOPTS_TEST_NOPE/ca.pem");
    }
}
