//! Certificate material and rustls client configuration.
//!
//! The client expects a single directory holding the CA bundle used to verify
//! the server plus an optional client certificate and key for mutual TLS:
//!
//! ```text
//! certs/
//!   server_ca.pem
//!   client.pem
//!   client.key
//! ```
use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
};

use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::{CertificateDer, PrivateKeyDer};
use thiserror::Error;
use tracing::{debug, warn};

/// file name of the CA bundle inside the cert directory
pub const CA_BUNDLE: &str = "server_ca.pem";
/// file name of the client certificate chain
pub const CLIENT_CERT: &str = "client.pem";
/// file name of the client private key
pub const CLIENT_KEY: &str = "client.key";

/// Problems locating or loading certificate material
#[derive(Debug, Error)]
pub enum CertError {
    /// the cert directory itself is absent
    #[error("certificate directory not found at {0}")]
    MissingDirectory(PathBuf),
    /// no CA bundle, so the server can't be verified
    #[error("CA certificate not found at {0}")]
    MissingCaBundle(PathBuf),
    /// a PEM file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// file being read
        path: PathBuf,
        /// underlying error
        source: io::Error,
    },
    /// a PEM file contained no certificates
    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),
    /// a PEM file contained no private key
    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),
    /// rustls refused the material
    #[error("invalid certificate material: {0}")]
    Invalid(String),
}

/// Paths of the certificate material found in a cert directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPaths {
    /// CA bundle, always present
    pub ca: PathBuf,
    /// client certificate, if found
    pub cert: Option<PathBuf>,
    /// client key, if found
    pub key: Option<PathBuf>,
}

impl CertPaths {
    /// Look for the expected files in `dir`.
    ///
    /// A missing directory or CA bundle is an error. A missing client
    /// certificate or key is only logged, the connection proceeds without
    /// client authentication.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self, CertError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CertError::MissingDirectory(dir.to_path_buf()));
        }
        let ca = dir.join(CA_BUNDLE);
        if !ca.is_file() {
            return Err(CertError::MissingCaBundle(ca));
        }
        let cert = dir.join(CLIENT_CERT);
        let cert = if cert.is_file() {
            Some(cert)
        } else {
            warn!(path = %cert.display(), "client certificate not found");
            None
        };
        let key = dir.join(CLIENT_KEY);
        let key = if key.is_file() {
            Some(key)
        } else {
            warn!(path = %key.display(), "client key not found");
            None
        };
        Ok(Self { ca, cert, key })
    }

    /// both halves of a client identity are present
    pub fn has_client_identity(&self) -> bool {
        self.cert.is_some() && self.key.is_some()
    }
}

/// Build a rustls client config trusting only the CA bundle, presenting the
/// client certificate when one is available.
pub fn client_config(paths: &CertPaths) -> Result<ClientConfig, CertError> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(&paths.ca)? {
        roots
            .add(cert)
            .map_err(|err| CertError::Invalid(err.to_string()))?;
    }
    debug!(roots = roots.len(), ca = %paths.ca.display(), "loaded CA bundle");

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|err| CertError::Invalid(err.to_string()))?
        .with_root_certificates(roots);

    match (&paths.cert, &paths.key) {
        (Some(cert), Some(key)) => {
            let chain = load_certs(cert)?;
            let key = load_key(key)?;
            builder
                .with_client_auth_cert(chain, key)
                .map_err(|err| CertError::Invalid(err.to_string()))
        }
        _ => Ok(builder.with_no_client_auth()),
    }
}

fn open(path: &Path) -> Result<BufReader<File>, CertError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| CertError::Read {
            path: path.to_path_buf(),
            source,
        })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, CertError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| CertError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(CertError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, CertError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| CertError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| CertError::NoPrivateKey(path.to_path_buf()))
}
