//! Blocking TCP / TLS stream establishment for the call layer.
//!
//! Every RPC exchange owns a short-lived [`Transport`]: acquired at the start
//! of the call and dropped at the end of it. Streams are never pooled.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, OnceLock};

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use tracing::debug;

use crate::error::RpcError;

/// A connected bidirectional byte stream, optionally TLS-protected.
///
/// TLS sessions negotiate rustls' safe protocol defaults (TLS 1.2/1.3); the
/// legacy SSL family is not offered at all.
#[derive(Debug)]
pub enum Transport {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

/// Establish a connection to `host:port`, completing the TLS handshake
/// before returning when `use_tls` is set.
///
/// DNS failures, refusals, and handshake failures all surface as
/// [`RpcError::Connection`] naming the endpoint. Retrying and timeouts are
/// caller concerns.
pub fn connect(host: &str, port: u16, use_tls: bool) -> Result<Transport, RpcError> {
    let endpoint = format!("{host}:{port}");
    debug!(%endpoint, use_tls, "connecting");

    let tcp = TcpStream::connect((host, port))
        .map_err(|e| connection_error(&endpoint, &e.to_string()))?;
    if !use_tls {
        return Ok(Transport::Plain(tcp));
    }

    let server_name = ServerName::try_from(host.to_owned())
        .map_err(|e| connection_error(&endpoint, &format!("invalid server name: {e}")))?;
    let mut conn = ClientConnection::new(tls_config(), server_name)
        .map_err(|e| connection_error(&endpoint, &e.to_string()))?;

    // Drive the handshake to completion here so negotiation failures are
    // reported as connection failures, not as mid-exchange read errors.
    let mut tcp = tcp;
    while conn.is_handshaking() {
        conn.complete_io(&mut tcp)
            .map_err(|e| connection_error(&endpoint, &format!("TLS handshake failed: {e}")))?;
    }

    Ok(Transport::Tls(Box::new(StreamOwned::new(conn, tcp))))
}

fn connection_error(endpoint: &str, reason: &str) -> RpcError {
    RpcError::Connection {
        endpoint: endpoint.to_owned(),
        reason: reason.to_owned(),
    }
}

fn tls_config() -> Arc<ClientConfig> {
    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();
    CONFIG
        .get_or_init(|| {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            Arc::new(
                ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth(),
            )
        })
        .clone()
}

impl Read for Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.read(buf),
            Transport::Tls(stream) => stream.read(buf),
        }
    }
}

impl Write for Transport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.write(buf),
            Transport::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Transport::Plain(stream) => stream.flush(),
            Transport::Tls(stream) => stream.flush(),
        }
    }
}
