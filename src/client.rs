// Copyright 2026 reflect-rpc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Module H: the client.
//!
//! A mirror of the line/HTTP framers from the requesting side: builds
//! request envelopes with a monotonically increasing id, sends them through
//! whichever framer the connection was configured with, reads the matching
//! reply, and classifies failures the way §4.H and §7 describe.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_rustls::{rustls, TlsConnector};
use tokio_util::codec::Framed;

use crate::codec::LineCodec;
use crate::http_codec;
use crate::message::ErrorObject;

#[cfg(unix)]
use tokio::net::UnixStream;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection or transport failure; wraps the underlying cause (§7).
    #[error("network error: {0}")]
    Network(String),
    /// Certificate `commonName` did not match the expected hostname (§4.H).
    #[error("TLS hostname mismatch: expected {expected:?}, certificate names {actual:?}")]
    TlsHostname { expected: String, actual: String },
    /// A non-200 HTTP response, or malformed HTTP framing (§7).
    #[error("HTTP error: {0}")]
    Http(String),
    /// The server returned a non-null structured error object (§7).
    #[error("{}: {}", .0.name, .0.message)]
    Rpc(ErrorObject),
    #[error("request timed out")]
    Timeout,
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Network(e.to_string())
    }
}

impl From<crate::codec::LineCodecError> for ClientError {
    fn from(e: crate::codec::LineCodecError) -> Self {
        ClientError::Network(e.to_string())
    }
}

impl From<http_codec::HttpError> for ClientError {
    fn from(e: http_codec::HttpError) -> Self {
        match e {
            http_codec::HttpError::Status { status, reason } => {
                ClientError::Http(format!("{} {}", status, reason))
            }
            other => ClientError::Http(other.to_string()),
        }
    }
}

/// Any duplex byte stream the client can open: plain TCP, TLS over TCP, or
/// (on unix) a domain socket. Boxed so the line/HTTP paths don't need a
/// variant per transport.
pub trait DuplexStream: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> DuplexStream for T {}

/// Transport selection and its associated options; chosen once at
/// construction (§4.H "options mirror the server's").
pub enum Transport {
    Line,
    Http {
        path: String,
        basic_auth: Option<(String, String)>,
    },
}

/// TLS options for the client connection.
pub struct TlsOptions {
    pub connector: TlsConnector,
    pub server_name: rustls::ServerName,
    /// When set, the leaf certificate's `commonName` must equal this value
    /// or a [`ClientError::TlsHostname`] is raised.
    pub expected_hostname: Option<String>,
}

/// Builds a `TlsConnector` trusting `ca_path`'s certificates, optionally
/// presenting a client certificate for mutual TLS (§4.H "TLS with CA
/// verification ... client certificate + key"). Mirrors
/// [`crate::listener::build_tls_acceptor`] on the requesting side.
pub fn build_tls_connector(
    ca_path: &Path,
    client_cert_and_key: Option<(&Path, &Path)>,
) -> Result<TlsConnector, ClientError> {
    let mut roots = rustls::RootCertStore::empty();
    for ca in read_certs(ca_path)? {
        roots
            .add(&ca)
            .map_err(|e| ClientError::Network(e.to_string()))?;
    }

    let builder = rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots);
    let config = match client_cert_and_key {
        Some((cert_path, key_path)) => {
            let certs = read_certs(cert_path)?;
            let key = read_private_key(key_path)?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| ClientError::Network(e.to_string()))?
        }
        None => builder.with_no_client_auth(),
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

fn read_certs(path: &Path) -> Result<Vec<rustls::Certificate>, ClientError> {
    let mut reader = std::io::BufReader::new(
        std::fs::File::open(path).map_err(|e| ClientError::Network(e.to_string()))?,
    );
    rustls_pemfile::certs(&mut reader)
        .map_err(|e| ClientError::Network(format!("reading certificates from {:?}: {}", path, e)))
        .map(|raw| raw.into_iter().map(rustls::Certificate).collect())
}

fn read_private_key(path: &Path) -> Result<rustls::PrivateKey, ClientError> {
    let mut reader = std::io::BufReader::new(
        std::fs::File::open(path).map_err(|e| ClientError::Network(e.to_string()))?,
    );
    let keys = rustls_pemfile::pkcs8_private_keys(&mut reader)
        .map_err(|e| ClientError::Network(format!("reading private key from {:?}: {}", path, e)))?;
    keys.into_iter()
        .next()
        .map(rustls::PrivateKey)
        .ok_or_else(|| ClientError::Network(format!("no private key found in {:?}", path)))
}

pub struct ClientConfig {
    pub address: String,
    pub transport: Transport,
    pub tls: Option<TlsOptions>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        ClientConfig {
            address: address.into(),
            transport: Transport::Line,
            tls: None,
            timeout: Duration::from_secs(5),
        }
    }

    fn is_unix(&self) -> bool {
        self.address.starts_with("unix://")
    }
}

/// A standing line-framed connection, kept open and reused across calls
/// (§4.H "auto-reconnect on first use after close").
type LineConnection = Framed<Box<dyn DuplexStream>, LineCodec>;

/// Speaks the protocol against one server: builds envelopes with an
/// incrementing id starting at 1, dispatches through the configured
/// transport, and surfaces errors per §7.
///
/// Only the line transport keeps a standing connection: each HTTP request
/// is answered with `Connection: close` by [`crate::listener::run_http_connection`],
/// so an HTTP call always opens a fresh stream rather than risking reuse of
/// an already-closed socket.
pub struct Client {
    config: ClientConfig,
    next_id: AtomicI64,
    line_conn: Mutex<Option<LineConnection>>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Client {
            config,
            next_id: AtomicI64::new(1),
            line_conn: Mutex::new(None),
        }
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn open_raw_stream(&self) -> Result<Box<dyn DuplexStream>, ClientError> {
        #[cfg(unix)]
        if self.config.is_unix() {
            let path = self
                .config
                .address
                .strip_prefix("unix://")
                .expect("is_unix checked the prefix");
            let stream = UnixStream::connect(path).await?;
            return Ok(Box::new(stream));
        }
        #[cfg(not(unix))]
        if self.config.is_unix() {
            return Err(ClientError::Network(
                "unix:// sockets are not supported on this platform".into(),
            ));
        }

        let tcp = tokio::time::timeout(self.config.timeout, TcpStream::connect(&self.config.address))
            .await
            .map_err(|_| ClientError::Timeout)??;

        if let Some(tls) = &self.config.tls {
            let stream = tls
                .connector
                .connect(tls.server_name.clone(), tcp)
                .await
                .map_err(|e| ClientError::Network(e.to_string()))?;
            if let Some(expected) = &tls.expected_hostname {
                let cn = peer_common_name(&stream);
                if cn.as_deref() != Some(expected.as_str()) {
                    return Err(ClientError::TlsHostname {
                        expected: expected.clone(),
                        actual: cn.unwrap_or_default(),
                    });
                }
            }
            Ok(Box::new(stream))
        } else {
            Ok(Box::new(tcp))
        }
    }

    async fn open_line_connection(&self) -> Result<LineConnection, ClientError> {
        let stream = self.open_raw_stream().await?;
        Ok(Framed::new(stream, LineCodec::new()))
    }

    /// Ensures the standing line connection exists, auto-reconnecting on
    /// first use after a prior close (§4.H), runs `f` against it, and
    /// invalidates it on any transport failure so the next call reconnects
    /// from scratch. Line-transport-only: HTTP never reuses a connection
    /// (see the `Client` doc comment), so it doesn't go through here.
    async fn with_line_connection<F, Fut, T>(&self, f: F) -> Result<T, ClientError>
    where
        F: FnOnce(&mut LineConnection) -> Fut,
        Fut: std::future::Future<Output = Result<T, ClientError>>,
    {
        let mut guard = self.line_conn.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_line_connection().await?);
        }
        let conn = guard.as_mut().expect("just populated");
        let result = f(conn).await;
        if result.is_err() {
            *guard = None;
        }
        result
    }

    /// Sends a request and awaits its reply, raising [`ClientError::Rpc`]
    /// if the server's reply carries a non-null error.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, ClientError> {
        let id = self.allocate_id();
        let envelope = serde_json::json!({ "id": id, "method": method, "params": params });
        let raw = serde_json::to_string(&envelope).expect("envelope is always serializable");

        let reply_text = tokio::time::timeout(self.config.timeout, self.send_and_receive(raw))
            .await
            .map_err(|_| ClientError::Timeout)??;

        let reply: Value = serde_json::from_str(&reply_text)
            .map_err(|e| ClientError::Network(format!("server sent invalid JSON: {}", e)))?;

        if let Some(error) = reply.get("error").filter(|e| !e.is_null()) {
            let name = error
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("JsonRpcError")
                .to_owned();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            return Err(ClientError::Rpc(ErrorObject::new(
                std::borrow::Cow::Owned(name),
                message,
            )));
        }

        Ok(reply.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Sends a notification (`id: null`) and does not wait for a reply
    /// (§4.H).
    pub async fn notify(&self, method: &str, params: Vec<Value>) -> Result<(), ClientError> {
        let envelope = serde_json::json!({ "id": Value::Null, "method": method, "params": params });
        let raw = serde_json::to_string(&envelope).expect("envelope is always serializable");

        match &self.config.transport {
            Transport::Line => {
                self.with_line_connection(|framed| async move { Ok(framed.send(raw).await?) })
                    .await
            }
            Transport::Http { path, basic_auth } => {
                let auth = basic_auth.clone();
                let path = path.clone();
                let mut stream = self.open_raw_stream().await?;
                let auth_ref = auth.as_ref().map(|(u, p)| (u.as_str(), p.as_str()));
                http_codec::write_request(&mut stream, "client", &path, &raw, auth_ref).await?;
                Ok(())
            }
        }
    }

    async fn send_and_receive(&self, raw: String) -> Result<String, ClientError> {
        match &self.config.transport {
            Transport::Line => {
                self.with_line_connection(|framed| async move {
                    framed.send(raw).await?;
                    match framed.next().await {
                        Some(line) => Ok(line?),
                        None => Err(ClientError::Network("connection closed by peer".into())),
                    }
                })
                .await
            }
            Transport::Http { path, basic_auth } => {
                // Each HTTP call opens its own connection: the server
                // closes the socket after one response (§4.F), so caching
                // it here would just hand the next call an already-dead
                // stream.
                let auth = basic_auth.clone();
                let mut stream = self.open_raw_stream().await?;
                let auth_ref = auth.as_ref().map(|(u, p)| (u.as_str(), p.as_str()));
                http_codec::write_request(&mut stream, "client", path, &raw, auth_ref).await?;
                Ok(http_codec::read_response(&mut stream).await?)
            }
        }
    }
}

fn peer_common_name<IO>(stream: &tokio_rustls::client::TlsStream<IO>) -> Option<String> {
    let (_, session) = stream.get_ref();
    let certs = session.peer_certificates()?;
    let leaf = certs.first()?;
    let (_, parsed) = x509_parser::parse_x509_certificate(leaf.as_ref()).ok()?;
    parsed
        .subject()
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|s| s.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn call_round_trips_result_over_line_transport() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 512];
            let n = socket.read(&mut buf).await.unwrap();
            let text = String::from_utf8_lossy(&buf[..n]);
            assert!(text.contains("\"method\":\"echo\""));
            socket
                .write_all(b"{\"id\":1,\"result\":\"hi\",\"error\":null}\r\n")
                .await
                .unwrap();
        });

        let client = Client::new(ClientConfig::new(addr.to_string()));
        let result = client.call("echo", vec![Value::String("hi".into())]).await.unwrap();
        assert_eq!(result, Value::String("hi".into()));
    }

    #[tokio::test]
    async fn call_surfaces_rpc_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 512];
            socket.read(&mut buf).await.unwrap();
            socket
                .write_all(b"{\"id\":1,\"result\":null,\"error\":{\"name\":\"JsonRpcError\",\"message\":\"nope\"}}\r\n")
                .await
                .unwrap();
        });

        let client = Client::new(ClientConfig::new(addr.to_string()));
        let err = client.call("fails", vec![]).await.unwrap_err();
        match err {
            ClientError::Rpc(obj) => {
                assert_eq!(obj.name, "JsonRpcError");
                assert_eq!(obj.message, "nope");
            }
            other => panic!("expected Rpc error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn request_ids_increase_monotonically_from_one() {
        let client = Client::new(ClientConfig::new("127.0.0.1:1"));
        assert_eq!(client.allocate_id(), 1);
        assert_eq!(client.allocate_id(), 2);
        assert_eq!(client.allocate_id(), 3);
    }

    #[tokio::test]
    async fn describe_functions_is_reachable_through_a_real_listener() {
        use crate::dispatcher::Dispatcher;
        use std::sync::Arc;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let dispatcher = Dispatcher::new(Arc::new(RegistryBuilder::new().build()));

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(socket, LineCodec::new());
            if let Some(Ok(line)) = framed.next().await {
                if let Some(reply) = dispatcher.dispatch(&line, None).await {
                    framed.send(serde_json::to_string(&reply).unwrap()).await.unwrap();
                }
            }
        });

        let client = Client::new(ClientConfig::new(addr.to_string()));
        let result = client.call("__describe_functions", vec![]).await.unwrap();
        assert!(result.is_array());
    }
}
