use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName};
use tokio_rustls::rustls::{self, RootCertStore, crypto::ring};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::NetError;

/// PEM key and certificate chain for the listener.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsFiles {
    pub key: PathBuf,
    pub cert: PathBuf,
}

pub fn load_acceptor(files: &TlsFiles) -> Result<TlsAcceptor, NetError> {
    let certs = read_certs(&files.cert)?;
    if certs.is_empty() {
        return Err(NetError::Tls(format!(
            "no certificates in {}",
            files.cert.display()
        )));
    }
    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(&files.key)?))?
        .ok_or_else(|| NetError::Tls(format!("no private key in {}", files.key.display())))?;

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| NetError::Tls(e.to_string()))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| NetError::Tls(e.to_string()))?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Client side of a TLS connection: the roots to trust and the name the
/// server certificate must carry.
#[derive(Clone)]
pub struct ClientTls {
    pub(crate) connector: TlsConnector,
    pub(crate) server_name: ServerName<'static>,
}

impl ClientTls {
    /// Trusts the certificates in the PEM file `ca` and expects `server_name`.
    pub fn new(ca: &Path, server_name: &str) -> Result<Self, NetError> {
        let mut roots = RootCertStore::empty();
        for cert in read_certs(ca)? {
            roots.add(cert).map_err(|e| NetError::Tls(e.to_string()))?;
        }
        if roots.is_empty() {
            return Err(NetError::Tls(format!("no certificates in {}", ca.display())));
        }
        let server_name = ServerName::try_from(server_name.to_string())
            .map_err(|e| NetError::Tls(format!("bad server name '{server_name}': {e}")))?;

        let config = rustls::ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| NetError::Tls(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            server_name,
        })
    }
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, NetError> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    Ok(certs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_are_io_errors() {
        let files = TlsFiles {
            key: "/nonexistent/key.pem".into(),
            cert: "/nonexistent/cert.pem".into(),
        };
        assert!(matches!(load_acceptor(&files), Err(NetError::Io(_))));
    }

    #[test]
    fn non_pem_cert_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, "not a certificate").unwrap();
        std::fs::write(&key, "not a key").unwrap();
        let err = load_acceptor(&TlsFiles { key, cert }).err().unwrap();
        assert!(matches!(err, NetError::Tls(_)));
    }

    #[test]
    fn client_roots_must_hold_a_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("ca.pem");
        std::fs::write(&ca, "").unwrap();
        assert!(matches!(ClientTls::new(&ca, "localhost"), Err(NetError::Tls(_))));
        assert!(matches!(
            ClientTls::new(&dir.path().join("absent.pem"), "localhost"),
            Err(NetError::Io(_))
        ));
    }
}
