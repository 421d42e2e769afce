//! TLS configuration and certificate loading.
//!
//! Turns [`TlsOptions`] into a `tokio_rustls::TlsAcceptor`: PEM loading,
//! protocol version selection, cipher suite filtering and optional client
//! certificate verification.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig, SupportedProtocolVersion};
use thiserror::Error;
use tokio_rustls::TlsAcceptor;

use crate::config::{CertRequirement, TlsOptions, TlsVersion};

/// Errors raised while building the TLS acceptor.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("{0} is not configured")]
    Missing(&'static str),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {0}")]
    NoCertificates(String),

    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    #[error("none of the configured ciphers are supported: {0}")]
    NoCiphers(String),

    #[error("invalid CA bundle: {0}")]
    CaBundle(String),

    #[error("TLS configuration rejected: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Build a TLS acceptor from the listener's TLS options.
pub fn build_acceptor(options: &TlsOptions) -> Result<TlsAcceptor, TlsError> {
    let certfile = options.certfile.as_deref().ok_or(TlsError::Missing("certfile"))?;
    let keyfile = options.keyfile.as_deref().ok_or(TlsError::Missing("keyfile"))?;

    let certs = load_certs(certfile)?;
    let key = load_private_key(keyfile)?;

    let provider = Arc::new(crypto_provider(options.ciphers.as_deref())?);

    let builder = ServerConfig::builder_with_provider(Arc::clone(&provider))
        .with_protocol_versions(protocol_versions(options.ssl_version))?;

    let builder = match options.cert_reqs {
        CertRequirement::None => builder.with_no_client_auth(),
        reqs => {
            let bundle = options.ca_certs.as_deref().ok_or(TlsError::Missing("ca_certs"))?;
            let mut roots = RootCertStore::empty();
            for cert in load_certs(bundle)? {
                roots.add(cert)?;
            }
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider);
            let verifier = if reqs == CertRequirement::Optional {
                verifier.allow_unauthenticated()
            } else {
                verifier
            };
            let verifier = verifier
                .build()
                .map_err(|e| TlsError::CaBundle(e.to_string()))?;
            builder.with_client_cert_verifier(verifier)
        }
    };

    let mut config = builder.with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    tracing::info!(
        certfile,
        cert_reqs = ?options.cert_reqs,
        ssl_version = ?options.ssl_version,
        "TLS enabled"
    );

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn protocol_versions(version: Option<TlsVersion>) -> &'static [&'static SupportedProtocolVersion] {
    static TLS12_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS12];
    static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

    match version {
        Some(TlsVersion::Tls12) => TLS12_ONLY,
        Some(TlsVersion::Tls13) => TLS13_ONLY,
        Some(TlsVersion::Any) | None => rustls::ALL_VERSIONS,
    }
}

/// The ring provider, optionally narrowed to a colon separated cipher list.
fn crypto_provider(ciphers: Option<&str>) -> Result<CryptoProvider, TlsError> {
    let mut provider = rustls::crypto::ring::default_provider();

    if let Some(list) = ciphers {
        let wanted: Vec<&str> = list
            .split(':')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();

        provider.cipher_suites.retain(|suite| {
            let name = format!("{:?}", suite.suite());
            wanted.iter().any(|w| w.eq_ignore_ascii_case(&name))
        });

        if provider.cipher_suites.is_empty() {
            return Err(TlsError::NoCiphers(list.to_string()));
        }
    }

    Ok(provider)
}

/// Load certificates from a PEM file.
pub fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io { path: path.to_string(), source })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_string()));
    }

    Ok(certs)
}

/// Load the first private key (PKCS#1, PKCS#8 or SEC1) from a PEM file.
pub fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;

    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io { path: path.to_string(), source })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_string()))
}

fn open(path: &str) -> Result<BufReader<File>, TlsError> {
    File::open(Path::new(path))
        .map(BufReader::new)
        .map_err(|source| TlsError::Io { path: path.to_string(), source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> Option<String> {
        Some(format!("{}/tests/fixtures/tls/{}", env!("CARGO_MANIFEST_DIR"), name))
    }

    fn server_options() -> TlsOptions {
        TlsOptions {
            certfile: fixture("server.pem"),
            keyfile: fixture("server.key"),
            ..TlsOptions::default()
        }
    }

    #[test]
    fn missing_certfile_is_reported() {
        let err = build_acceptor(&TlsOptions::default()).err().unwrap();
        assert!(matches!(err, TlsError::Missing("certfile")));
    }

    #[test]
    fn unreadable_certificate_is_an_io_error() {
        let options = TlsOptions {
            certfile: Some("/nonexistent/cert.pem".into()),
            keyfile: Some("/nonexistent/key.pem".into()),
            ..TlsOptions::default()
        };
        let err = build_acceptor(&options).err().unwrap();
        assert!(matches!(err, TlsError::Io { .. }));
    }

    #[test]
    fn acceptor_builds_from_pem_files() {
        assert!(build_acceptor(&server_options()).is_ok());

        let pinned = TlsOptions {
            ssl_version: Some(TlsVersion::Tls12),
            ciphers: Some("TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256".into()),
            ..server_options()
        };
        assert!(build_acceptor(&pinned).is_ok());
    }

    #[test]
    fn client_verification_needs_a_ca_bundle() {
        let required = TlsOptions {
            cert_reqs: CertRequirement::Required,
            ..server_options()
        };
        let err = build_acceptor(&required).err().unwrap();
        assert!(matches!(err, TlsError::Missing("ca_certs")));

        let with_ca = TlsOptions {
            ca_certs: fixture("ca.pem"),
            ..required
        };
        assert!(build_acceptor(&with_ca).is_ok());

        let optional = TlsOptions {
            cert_reqs: CertRequirement::Optional,
            ..with_ca
        };
        assert!(build_acceptor(&optional).is_ok());
    }

    #[test]
    fn key_file_without_a_key_is_rejected() {
        let options = TlsOptions {
            keyfile: fixture("server.pem"),
            ..server_options()
        };
        let err = build_acceptor(&options).err().unwrap();
        assert!(matches!(err, TlsError::NoPrivateKey(_)));
    }

    #[test]
    fn cipher_list_filters_suites() {
        let provider = crypto_provider(Some("TLS13_AES_128_GCM_SHA256")).unwrap();
        assert_eq!(provider.cipher_suites.len(), 1);

        let err = crypto_provider(Some("RC4-MD5")).unwrap_err();
        assert!(matches!(err, TlsError::NoCiphers(_)));
    }

    #[test]
    fn version_selection() {
        assert_eq!(protocol_versions(Some(TlsVersion::Tls13)).len(), 1);
        assert_eq!(protocol_versions(None).len(), rustls::ALL_VERSIONS.len());
    }
}
