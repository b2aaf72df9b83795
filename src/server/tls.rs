//! TLS configuration and handshake helpers for `AUTH TLS` and `PROT P`.

use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

/// Whether and how FTPS is available on a server instance.
#[derive(Clone, Default)]
pub enum FtpsConfig {
    /// No certificate configured; `AUTH TLS` always fails with 421.
    #[default]
    Off,
    /// A certificate/key pair is loaded and ready to accept handshakes.
    On(Arc<ServerConfig>),
}

impl FtpsConfig {
    /// Builds a [`FtpsConfig::On`] from a PEM certificate chain and private
    /// key on disk.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> Result<Self, crate::error::ServerError> {
        let certs = load_certs(cert_path).map_err(crate::error::ServerError::Bind)?;
        let key = load_key(key_path).map_err(crate::error::ServerError::Bind)?;
        let config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| crate::error::ServerError::Bind(std::io::Error::other(e)))?;
        Ok(FtpsConfig::On(Arc::new(config)))
    }

    /// Whether a certificate is configured at all.
    pub fn is_enabled(&self) -> bool {
        matches!(self, FtpsConfig::On(_))
    }

    /// An acceptor for performing the server side of a handshake, if TLS is
    /// configured.
    pub fn acceptor(&self) -> Option<TlsAcceptor> {
        match self {
            FtpsConfig::Off => None,
            FtpsConfig::On(cfg) => Some(TlsAcceptor::from(cfg.clone())),
        }
    }
}

fn load_certs(path: &Path) -> std::io::Result<Vec<CertificateDer<'static>>> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()
}

fn load_key(path: &Path) -> std::io::Result<PrivateKeyDer<'static>> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)?.ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "no private key found in file"))
}

/// Performs the server side of a TLS handshake on an already-connected
/// plain socket, used both for `AUTH TLS` on the control channel (after the
/// 234 reply has been flushed) and for data channels under `PROT P`.
pub async fn upgrade(acceptor: &TlsAcceptor, stream: TcpStream) -> Result<tokio_rustls::server::TlsStream<TcpStream>, crate::error::EngineError> {
    acceptor.accept(stream).await.map_err(crate::error::EngineError::Io)
}
