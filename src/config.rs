//! Client configuration.

use std::{path::PathBuf, time::Duration};

/// Connection settings consumed by [`Client::connect`](crate::Client::connect).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use kvpipe::{Config, TlsConfig};
///
/// let config = Config::new("kv.internal", 7000)
///     .timeout(Duration::from_secs(5))
///     .tls(
///         TlsConfig::new()
///             .ca_path("/etc/kv/ca.pem")
///             .client_auth("/etc/kv/client.pem", "/etc/kv/client.key"),
///     );
/// assert_eq!(config.host(), "kv.internal");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) timeout: Duration,
    pub(crate) tls: Option<TlsConfig>,
}

impl Config {
    /// Settings for a plain connection to `host:port` with a 10 second
    /// operation timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_secs(10),
            tls: None,
        }
    }

    /// Bounds each single-operation round trip and the connection
    /// establishment. Zero disables the bound.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wraps the connection in TLS 1.3.
    #[must_use]
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// TLS settings: certificate material paths and verification policy.
///
/// Peer verification defaults to on; disabling it keeps the session
/// encrypted but accepts any server certificate.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub(crate) ca_path: Option<PathBuf>,
    pub(crate) cert_path: Option<PathBuf>,
    pub(crate) key_path: Option<PathBuf>,
    pub(crate) verify_hostname: Option<String>,
    pub(crate) verify_peer: bool,
}

impl TlsConfig {
    pub fn new() -> Self {
        Self {
            ca_path: None,
            cert_path: None,
            key_path: None,
            verify_hostname: None,
            verify_peer: true,
        }
    }

    /// PEM file with the CA certificates anchoring server verification.
    #[must_use]
    pub fn ca_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_path = Some(path.into());
        self
    }

    /// PEM files with the client certificate chain and private key for
    /// mutual authentication.
    #[must_use]
    pub fn client_auth(
        mut self,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        self.cert_path = Some(cert_path.into());
        self.key_path = Some(key_path.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn cert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_path = Some(path.into());
        self
    }

    /// Name to verify the server certificate against when it differs from
    /// the dialed host (also used for SNI).
    #[must_use]
    pub fn verify_hostname(mut self, name: impl Into<String>) -> Self {
        self.verify_hostname = Some(name.into());
        self
    }

    /// Enables or disables server certificate verification.
    #[must_use]
    pub fn verify_peer(mut self, verify: bool) -> Self {
        self.verify_peer = verify;
        self
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = Config::new("localhost", 7000);
        assert_eq!(config.host(), "localhost");
        assert_eq!(config.port(), 7000);
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.tls.is_none());
    }

    #[test]
    fn tls_defaults_to_verification() {
        let tls = TlsConfig::new();
        assert!(tls.verify_peer);
        assert!(tls.ca_path.is_none());
        assert!(tls.verify_hostname.is_none());
    }

    #[test]
    fn builder_chaining() {
        let config = Config::new("kv.internal", 1)
            .timeout(Duration::ZERO)
            .tls(TlsConfig::new().verify_peer(false).verify_hostname("kv"));
        assert!(config.timeout.is_zero());
        let tls = config.tls.unwrap();
        assert!(!tls.verify_peer);
        assert_eq!(tls.verify_hostname.as_deref(), Some("kv"));
    }
}
