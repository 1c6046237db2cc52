// Copyright 2026 reflect-rpc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Module G: the listener.
//!
//! Accepts connections on TCP, TCP+TLS, or a UNIX domain socket, and spawns
//! one independent handling task per connection (§4.G, §5 "one accept → one
//! independent handling context"). The accept loop itself is a direct
//! generalization of the teacher's `time_server2.rs` example: bind, turn the
//! listener into a stream of sockets, `for_each` spawn a handler — only
//! `tokio::net` in place of `tokio 0.1`'s, and a framer choice instead of a
//! single hard-coded one.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::{SinkExt, StreamExt};
use slog::Logger;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;
use tokio_util::codec::Framed;

use crate::codec::LineCodec;
use crate::dispatcher::{CallContext, Dispatcher};
use crate::http_codec;

#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("invalid bind address {0:?}")]
    InvalidAddress(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Codec(#[from] crate::codec::LineCodecError),
    #[error("TLS configuration error: {0}")]
    Tls(String),
}

/// A password-check callback for HTTP Basic Auth (§4.G); returns `true` when
/// the credentials are accepted.
pub type BasicAuthCheck = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// UNIX-domain-socket specific options, only meaningful when `bind_address`
/// uses the `unix://` scheme.
#[derive(Clone, Default)]
pub struct UnixOptions {
    pub backlog: Option<u32>,
    /// Filesystem permission bits to apply to the socket file after binding.
    pub mode: Option<u32>,
    /// Path to write this process's PID to, created alongside the socket.
    pub pid_file: Option<PathBuf>,
}

/// Listener configuration (§4.G). Every axis is independent: TLS, client-cert
/// auth, HTTP framing, and Basic Auth can be combined freely.
#[derive(Clone)]
pub struct ListenerConfig {
    pub bind_address: String,
    pub tls_enabled: bool,
    pub tls_acceptor: Option<TlsAcceptor>,
    /// When set, a client certificate is required; its `commonName` becomes
    /// the call context's `username`.
    pub tls_client_auth_enabled: bool,
    pub http_enabled: bool,
    pub rpc_path: String,
    pub http_basic_auth_enabled: bool,
    pub http_basic_auth_check: Option<BasicAuthCheck>,
    pub http_basic_auth_realm: String,
    pub unix: UnixOptions,
}

impl ListenerConfig {
    pub fn new(bind_address: impl Into<String>) -> Self {
        ListenerConfig {
            bind_address: bind_address.into(),
            tls_enabled: false,
            tls_acceptor: None,
            tls_client_auth_enabled: false,
            http_enabled: false,
            rpc_path: "/rpc".to_owned(),
            http_basic_auth_enabled: false,
            http_basic_auth_check: None,
            http_basic_auth_realm: "reflect-rpc".to_owned(),
            unix: UnixOptions::default(),
        }
    }

    fn is_unix(&self) -> bool {
        self.bind_address.starts_with("unix://")
    }
}

/// Loads a server certificate chain and private key from PEM files (§4.G
/// "server cert and key supplied as a PEM path") and builds the
/// `TlsAcceptor` to place in [`ListenerConfig::tls_acceptor`]. When
/// `client_ca_path` is given, client certificates are required and verified
/// against it, matching `tls_client_auth_enabled`.
pub fn build_tls_acceptor(
    cert_path: &Path,
    key_path: &Path,
    client_ca_path: Option<&Path>,
) -> Result<TlsAcceptor, ListenerError> {
    let certs = read_certs(cert_path)?;
    let key = read_private_key(key_path)?;

    let builder = rustls::ServerConfig::builder().with_safe_defaults();
    let config = if let Some(ca_path) = client_ca_path {
        let mut roots = rustls::RootCertStore::empty();
        for ca in read_certs(ca_path)? {
            roots
                .add(&ca)
                .map_err(|e| ListenerError::Tls(e.to_string()))?;
        }
        let verifier = rustls::server::AllowAnyAuthenticatedClient::new(roots);
        builder
            .with_client_cert_verifier(verifier)
            .with_single_cert(certs, key)
            .map_err(|e| ListenerError::Tls(e.to_string()))?
    } else {
        builder
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| ListenerError::Tls(e.to_string()))?
    };

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn read_certs(path: &Path) -> Result<Vec<rustls::Certificate>, ListenerError> {
    let mut reader = std::io::BufReader::new(std::fs::File::open(path)?);
    rustls_pemfile::certs(&mut reader)
        .map_err(|e| ListenerError::Tls(format!("reading certificates from {:?}: {}", path, e)))
        .map(|raw| raw.into_iter().map(rustls::Certificate).collect())
}

fn read_private_key(path: &Path) -> Result<rustls::PrivateKey, ListenerError> {
    let mut reader = std::io::BufReader::new(std::fs::File::open(path)?);
    let keys = rustls_pemfile::pkcs8_private_keys(&mut reader)
        .map_err(|e| ListenerError::Tls(format!("reading private key from {:?}: {}", path, e)))?;
    keys.into_iter()
        .next()
        .map(rustls::PrivateKey)
        .ok_or_else(|| ListenerError::Tls(format!("no private key found in {:?}", path)))
}

/// Runs the accept loop until the process is torn down; each accepted
/// connection is spawned onto its own task and handled independently.
pub async fn serve(
    config: ListenerConfig,
    dispatcher: Dispatcher,
    logger: Logger,
) -> Result<(), ListenerError> {
    if config.is_unix() {
        serve_unix(config, dispatcher, logger).await
    } else {
        serve_tcp(config, dispatcher, logger).await
    }
}

async fn serve_tcp(
    config: ListenerConfig,
    dispatcher: Dispatcher,
    logger: Logger,
) -> Result<(), ListenerError> {
    let listener = TcpListener::bind(&config.bind_address).await?;
    slog::info!(logger, "listening"; "address" => &config.bind_address);

    loop {
        let (socket, peer) = listener.accept().await?;
        let config = config.clone();
        let dispatcher = dispatcher.clone();
        let logger = logger.new(slog::o!("peer" => peer.to_string()));
        tokio::spawn(async move {
            if let Err(e) = handle_tcp_connection(socket, config, dispatcher, logger.clone()).await {
                slog::debug!(logger, "connection ended"; "error" => %e);
            }
        });
    }
}

async fn handle_tcp_connection(
    socket: TcpStream,
    config: ListenerConfig,
    dispatcher: Dispatcher,
    logger: Logger,
) -> Result<(), ListenerError> {
    socket.set_nodelay(true).ok();

    if config.tls_enabled {
        let acceptor = config
            .tls_acceptor
            .clone()
            .ok_or_else(|| ListenerError::Tls("tls_enabled but no acceptor configured".into()))?;
        let tls_stream = acceptor
            .accept(socket)
            .await
            .map_err(|e| ListenerError::Tls(e.to_string()))?;

        let ctx = if config.tls_client_auth_enabled {
            peer_common_name(&tls_stream).map(|username| CallContext {
                authenticated: true,
                username,
            })
        } else {
            None
        };

        run_framer(tls_stream, config, dispatcher, ctx, logger).await
    } else {
        run_framer(socket, config, dispatcher, None, logger).await
    }
}

#[cfg(unix)]
async fn serve_unix(
    config: ListenerConfig,
    dispatcher: Dispatcher,
    logger: Logger,
) -> Result<(), ListenerError> {
    let path = config
        .bind_address
        .strip_prefix("unix://")
        .ok_or_else(|| ListenerError::InvalidAddress(config.bind_address.clone()))?;
    let path = Path::new(path);
    let _ = std::fs::remove_file(path);

    let listener = UnixListener::bind(path)?;

    if let Some(mode) = config.unix.mode {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(mode);
        std::fs::set_permissions(path, perms)?;
    }
    if let Some(pid_file) = &config.unix.pid_file {
        std::fs::write(pid_file, std::process::id().to_string())?;
    }

    slog::info!(logger, "listening"; "address" => %config.bind_address);

    loop {
        let (socket, _addr) = listener.accept().await?;
        let config = config.clone();
        let dispatcher = dispatcher.clone();
        let logger = logger.clone();
        tokio::spawn(async move {
            if let Err(e) = run_framer(socket, config, dispatcher, None, logger.clone()).await {
                slog::debug!(logger, "connection ended"; "error" => %e);
            }
        });
    }
}

#[cfg(not(unix))]
async fn serve_unix(
    _config: ListenerConfig,
    _dispatcher: Dispatcher,
    _logger: Logger,
) -> Result<(), ListenerError> {
    Err(ListenerError::InvalidAddress(
        "unix:// sockets are not supported on this platform".into(),
    ))
}

/// Extracts the leaf certificate's `commonName` from an established TLS
/// stream's peer certificate chain, if client-cert auth produced one.
fn peer_common_name<IO>(stream: &tokio_rustls::server::TlsStream<IO>) -> Option<String> {
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

async fn run_framer<IO>(
    stream: IO,
    config: ListenerConfig,
    dispatcher: Dispatcher,
    ctx: Option<CallContext>,
    logger: Logger,
) -> Result<(), ListenerError>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    if config.http_enabled {
        run_http_connection(stream, config, dispatcher, ctx, logger).await
    } else {
        run_line_connection(stream, dispatcher, ctx, logger).await
    }
}

/// Drives one line-framed connection. Requests are read eagerly and their
/// dispatches run concurrently in `pending`, so a slow deferred handler never
/// blocks the framer from reading the next line; replies are written as
/// their dispatch resolves, which is completion order, not arrival order
/// (§4.E).
async fn run_line_connection<IO>(
    stream: IO,
    dispatcher: Dispatcher,
    ctx: Option<CallContext>,
    logger: Logger,
) -> Result<(), ListenerError>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let (mut sink, mut lines) = Framed::new(stream, LineCodec::new()).split();
    let mut pending = FuturesUnordered::new();
    let mut input_open = true;

    while input_open || !pending.is_empty() {
        tokio::select! {
            next = lines.next(), if input_open => {
                match next {
                    Some(line) => {
                        let line = line?;
                        let dispatcher = dispatcher.clone();
                        let ctx = ctx.clone();
                        pending.push(async move { dispatcher.dispatch(&line, ctx.as_ref()).await });
                    }
                    None => input_open = false,
                }
            }
            Some(reply) = pending.next(), if !pending.is_empty() => {
                if let Some(reply) = reply {
                    let body = serde_json::to_string(&reply).unwrap_or_else(|_| {
                        r#"{"id":-1,"result":null,"error":{"name":"InternalError","message":"Internal error"}}"#.to_owned()
                    });
                    if let Err(e) = sink.send(body).await {
                        slog::debug!(logger, "failed to send reply"; "error" => %e);
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

async fn run_http_connection<IO>(
    mut stream: IO,
    config: ListenerConfig,
    dispatcher: Dispatcher,
    mut ctx: Option<CallContext>,
    logger: Logger,
) -> Result<(), ListenerError>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let request = match http_codec::read_request(&mut stream, &config.rpc_path).await {
        Ok(req) => req,
        Err(e) => {
            slog::debug!(logger, "bad HTTP request"; "error" => %e);
            return Ok(());
        }
    };

    if config.http_basic_auth_enabled {
        let check = config
            .http_basic_auth_check
            .clone()
            .ok_or_else(|| ListenerError::Tls("http_basic_auth_enabled but no check configured".into()))?;
        let authorized = request
            .basic_auth
            .as_ref()
            .is_some_and(|a| check(&a.username, &a.password));
        if !authorized {
            http_codec::write_unauthorized(&mut stream, &config.http_basic_auth_realm).await?;
            return Ok(());
        }
        if let Some(auth) = request.basic_auth {
            ctx = Some(CallContext {
                authenticated: true,
                username: auth.username,
            });
        }
    }

    let reply = dispatcher.dispatch(&request.body, ctx.as_ref()).await;
    let body = match reply {
        Some(reply) => serde_json::to_string(&reply).unwrap_or_else(|_| "{}".to_owned()),
        // Notifications over HTTP still need a response; an empty successful
        // body with a null id mirrors what a line-framer peer would never see.
        None => r#"{"id":null,"result":null,"error":null}"#.to_owned(),
    };
    http_codec::write_response(&mut stream, &body).await?;
    Ok(())
}
