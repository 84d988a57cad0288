//! TLS 1.3 session establishment.
//!
//! Builds a [`TlsConnector`] from a [`TlsConfig`]: CA roots and optional
//! client certificate/key are loaded from PEM files, the protocol is pinned
//! to TLS 1.3, and peer verification can be disabled for deployments that
//! rely on network-level isolation instead of a PKI.

use std::{fs::File, io::BufReader, path::Path, sync::Arc};

use rustls::{
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::CryptoProvider,
    pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime},
    DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use tokio_rustls::TlsConnector;

use crate::{config::TlsConfig, error::Error};

/// Builds a connector honoring the given TLS configuration.
pub(crate) fn connector(config: &TlsConfig) -> Result<TlsConnector, Error> {
    let builder = rustls::ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS13]);

    let builder = if config.verify_peer {
        let mut roots = RootCertStore::empty();
        if let Some(ca_path) = &config.ca_path {
            for cert in load_certs(ca_path)? {
                roots.add(cert)?;
            }
        }
        builder.with_root_certificates(roots)
    } else {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerification::new()))
    };

    let tls_config = match (&config.cert_path, &config.key_path) {
        (Some(cert_path), Some(key_path)) => {
            builder.with_client_auth_cert(load_certs(cert_path)?, load_key(key_path)?)?
        }
        (None, None) => builder.with_no_client_auth(),
        _ => {
            return Err(Error::InvalidParam(
                "client certificate and key must be configured together",
            ))
        }
    };

    Ok(TlsConnector::from(Arc::new(tls_config)))
}

/// The name presented for certificate verification and SNI: the configured
/// override when present, the dialed host otherwise.
pub(crate) fn server_name(config: &TlsConfig, host: &str) -> Result<ServerName<'static>, Error> {
    let name = config.verify_hostname.as_deref().unwrap_or(host);
    ServerName::try_from(name.to_owned())
        .map_err(|_| Error::InvalidParam("invalid tls server name"))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, Error> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(Error::InvalidParam("certificate file contains no certificates"));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, Error> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or(Error::InvalidParam("key file contains no private key"))
}

/// Certificate verifier that accepts any peer.
///
/// Installed only when `verify_peer` is off. Handshake signatures are still
/// checked so the session remains a genuine TLS 1.3 session with the
/// presented key.
#[derive(Debug)]
struct NoVerification(Arc<CryptoProvider>);

impl NoVerification {
    fn new() -> Self {
        Self(Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
    }
}

impl ServerCertVerifier for NoVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_name_prefers_override() {
        let config = TlsConfig::new().verify_hostname("kv.internal");
        let name = server_name(&config, "10.0.0.1").unwrap();
        assert_eq!(name, ServerName::try_from("kv.internal").unwrap());
    }

    #[test]
    fn server_name_falls_back_to_host() {
        let config = TlsConfig::new();
        let name = server_name(&config, "127.0.0.1").unwrap();
        assert_eq!(name, ServerName::try_from("127.0.0.1").unwrap());
    }

    #[test]
    fn connector_without_verification() {
        let config = TlsConfig::new().verify_peer(false);
        connector(&config).unwrap();
    }

    #[test]
    fn connector_rejects_lone_client_cert() {
        let config = TlsConfig::new()
            .verify_peer(false)
            .cert_path("/tmp/does-not-matter.pem");
        match connector(&config) {
            Err(Error::InvalidParam(_)) => {}
            Err(other) => panic!("expected parameter error, got {other:?}"),
            Ok(_) => panic!("expected parameter error, got Ok"),
        }
    }
}
