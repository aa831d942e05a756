//! Mutual TLS configuration loading.
//!
//! All certificate material is read once, at startup; any failure here is
//! fatal and must keep the process from serving at all.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use thiserror::Error;

/// An error that can occur while loading the mTLS configuration.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {}: {}", .path.display(), .source)]
    Io { path: PathBuf, source: io::Error },
    #[error("no PEM certificates found in {}", .0.display())]
    NoCertificates(PathBuf),
    #[error("no PEM private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),
    #[error("invalid CA certificate: {0}")]
    InvalidCaCertificate(rustls::Error),
    #[error("failed to build the client certificate verifier: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),
    #[error("invalid server certificate or key: {0}")]
    InvalidKeyPair(rustls::Error),
}

/// Builds a server-side TLS configuration for mutual authentication: the
/// server presents `cert`/`key`, and clients must present a certificate that
/// verifies against the CA pool loaded from `ca_cert`.
pub fn load_server_config(
    ca_cert: &Path, cert: &Path, key: &Path,
) -> Result<ServerConfig, TlsError> {
    let cert_chain = read_certs(cert)?;
    let key = read_private_key(key)?;

    let mut roots = RootCertStore::empty();
    for ca in read_certs(ca_cert)? {
        roots.add(ca).map_err(TlsError::InvalidCaCertificate)?;
    }

    let verifier = WebPkiClientVerifier::builder(Arc::new(roots)).build()?;

    ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(cert_chain, key)
        .map_err(TlsError::InvalidKeyPair)
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let mut reader = open(path)?;

    let certs: Vec<_> = rustls_pemfile::certs(&mut reader)
        .collect::<io::Result<_>>()
        .map_err(|source| TlsError::Io {
            path: path.into(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.into()));
    }
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let mut reader = open(path)?;

    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsError::Io {
            path: path.into(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.into()))
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
    let file = File::open(path).map_err(|source| TlsError::Io {
        path: path.into(),
        source,
    })?;
    Ok(BufReader::new(file))
}
