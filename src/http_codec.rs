// Copyright 2026 reflect-rpc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Module F: the HTTP framer.
//!
//! A minimal HTTP/1.1 POST-with-`Content-Length` parser/writer — not a
//! general HTTP implementation. Used on both ends: the server side parses a
//! request and writes a response; [`crate::client::Client`] uses the
//! mirror-image reader/writer when configured for HTTP transport (§4.F).

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const CONTENT_TYPE: &str = "application/json-rpc";

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("connection closed before a full HTTP message was received")]
    UnexpectedEof,
    #[error("malformed HTTP request/status line: {0:?}")]
    MalformedStartLine(String),
    #[error("unsupported HTTP method {0:?}, only POST is accepted")]
    UnsupportedMethod(String),
    #[error("unknown path {0:?}")]
    NotFound(String),
    #[error("missing required Content-Length header")]
    MissingContentLength,
    #[error("invalid Content-Length header")]
    InvalidContentLength,
    #[error("chunked transfer-encoding is not supported")]
    ChunkedNotSupported,
    #[error("body was not valid UTF-8: {0}")]
    NotUtf8(#[from] std::string::FromUtf8Error),
    #[error("HTTP request requires authentication")]
    AuthRequired,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Surfaced to the *client* when the server's response is not `HTTP/1.1 200`.
    #[error("HTTP error: {status} {reason}")]
    Status { status: u16, reason: String },
}

/// Basic-auth credentials extracted from an `Authorization: Basic ...`
/// header, not yet checked against anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// A parsed HTTP/1.1 POST request: the decoded JSON-RPC body plus whatever
/// `Authorization` header was present.
pub struct HttpRequest {
    pub body: String,
    pub basic_auth: Option<BasicAuth>,
}

async fn read_line<R: AsyncRead + Unpin>(stream: &mut R, buf: &mut Vec<u8>) -> Result<String, HttpError> {
    loop {
        if let Some(pos) = buf.windows(2).position(|w| w == b"\r\n") {
            let line = buf.drain(..pos + 2).collect::<Vec<u8>>();
            return Ok(String::from_utf8_lossy(&line[..line.len() - 2]).into_owned());
        }
        let mut chunk = [0u8; 512];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(HttpError::UnexpectedEof);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Reads one `POST <rpc_path> HTTP/1.1` request, its headers, and exactly
/// `Content-Length` bytes of body.
pub async fn read_request<R: AsyncRead + Unpin>(
    stream: &mut R,
    rpc_path: &str,
) -> Result<HttpRequest, HttpError> {
    let mut pending = Vec::new();

    let start_line = read_line(stream, &mut pending).await?;
    let mut parts = start_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| HttpError::MalformedStartLine(start_line.clone()))?;
    let path = parts
        .next()
        .ok_or_else(|| HttpError::MalformedStartLine(start_line.clone()))?;
    if method != "POST" {
        return Err(HttpError::UnsupportedMethod(method.to_owned()));
    }
    if path != rpc_path {
        return Err(HttpError::NotFound(path.to_owned()));
    }

    let mut content_length: Option<usize> = None;
    let mut basic_auth = None;
    loop {
        let line = read_line(stream, &mut pending).await?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| HttpError::MalformedStartLine(line.clone()))?;
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        match name.as_str() {
            "content-length" => {
                content_length =
                    Some(value.parse().map_err(|_| HttpError::InvalidContentLength)?);
            }
            "transfer-encoding" if value.eq_ignore_ascii_case("chunked") => {
                return Err(HttpError::ChunkedNotSupported)
            }
            "authorization" => basic_auth = parse_basic_auth(value),
            _ => {}
        }
    }

    let content_length = content_length.ok_or(HttpError::MissingContentLength)?;
    let mut body = pending;
    while body.len() < content_length {
        let mut chunk = vec![0u8; content_length - body.len()];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(HttpError::UnexpectedEof);
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(HttpRequest {
        body: String::from_utf8(body)?,
        basic_auth,
    })
}

fn parse_basic_auth(header_value: &str) -> Option<BasicAuth> {
    use base64::Engine;
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(BasicAuth {
        username: username.to_owned(),
        password: password.to_owned(),
    })
}

/// Writes `HTTP/1.1 200 OK` with the reply body (§4.F, §6).
pub async fn write_response<W: AsyncWrite + Unpin>(
    stream: &mut W,
    body: &str,
) -> Result<(), HttpError> {
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        CONTENT_TYPE,
        body.as_bytes().len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Writes `401 Unauthorized` with the `WWW-Authenticate` challenge (§4.F).
pub async fn write_unauthorized<W: AsyncWrite + Unpin>(
    stream: &mut W,
    realm: &str,
) -> Result<(), HttpError> {
    let head = format!(
        "HTTP/1.1 401 Unauthorized\r\nWWW-Authenticate: Basic realm=\"{}\"\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        realm
    );
    stream.write_all(head.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Client-side: reads a status line, headers, and exactly `Content-Length`
/// bytes of body. Rejects non-200 status, chunked encoding, and anything
/// other than `HTTP/1.1`.
pub async fn read_response<R: AsyncRead + Unpin>(stream: &mut R) -> Result<String, HttpError> {
    let mut pending = Vec::new();
    let start_line = read_line(stream, &mut pending).await?;
    let mut parts = start_line.splitn(3, ' ');
    let version = parts
        .next()
        .ok_or_else(|| HttpError::MalformedStartLine(start_line.clone()))?;
    let status: u16 = parts
        .next()
        .ok_or_else(|| HttpError::MalformedStartLine(start_line.clone()))?
        .parse()
        .map_err(|_| HttpError::MalformedStartLine(start_line.clone()))?;
    let reason = parts.next().unwrap_or("").to_owned();

    if version != "HTTP/1.1" {
        return Err(HttpError::MalformedStartLine(start_line));
    }

    let mut content_length: Option<usize> = None;
    loop {
        let line = read_line(stream, &mut pending).await?;
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name == "content-length" {
                content_length =
                    Some(value.parse().map_err(|_| HttpError::InvalidContentLength)?);
            } else if name == "transfer-encoding" && value.eq_ignore_ascii_case("chunked") {
                return Err(HttpError::ChunkedNotSupported);
            }
        }
    }

    if status != 200 {
        return Err(HttpError::Status { status, reason });
    }

    let content_length = content_length.ok_or(HttpError::MissingContentLength)?;
    let mut body = pending;
    while body.len() < content_length {
        let mut chunk = vec![0u8; content_length - body.len()];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(HttpError::UnexpectedEof);
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);
    Ok(String::from_utf8(body)?)
}

/// Client-side: writes `POST <path> HTTP/1.1` with the request body, and an
/// optional `Authorization: Basic` header.
pub async fn write_request<W: AsyncWrite + Unpin>(
    stream: &mut W,
    host: &str,
    path: &str,
    body: &str,
    basic_auth: Option<(&str, &str)>,
) -> Result<(), HttpError> {
    let mut head = format!(
        "POST {} HTTP/1.1\r\nHost: {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n",
        path,
        host,
        CONTENT_TYPE,
        body.as_bytes().len()
    );
    if let Some((user, pass)) = basic_auth {
        use base64::Engine;
        let token =
            base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, pass));
        head.push_str(&format!("Authorization: Basic {}\r\n", token));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn parses_post_with_content_length() {
        let raw = b"POST /rpc HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json-rpc\r\nContent-Length: 13\r\n\r\n{\"id\":1}text";
        let mut cursor = Cursor::new(raw.to_vec());
        let req = read_request(&mut cursor, "/rpc").await.unwrap();
        assert_eq!(req.body, "{\"id\":1}text"[..13].to_owned());
        assert!(req.basic_auth.is_none());
    }

    #[tokio::test]
    async fn rejects_wrong_path_with_not_found() {
        let raw = b"POST /other HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
        let mut cursor = Cursor::new(raw.to_vec());
        let err = read_request(&mut cursor, "/rpc").await.unwrap_err();
        assert!(matches!(err, HttpError::NotFound(_)));
    }

    #[tokio::test]
    async fn rejects_chunked_encoding() {
        let raw = b"POST /rpc HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n";
        let mut cursor = Cursor::new(raw.to_vec());
        let err = read_request(&mut cursor, "/rpc").await.unwrap_err();
        assert!(matches!(err, HttpError::ChunkedNotSupported));
    }

    #[tokio::test]
    async fn parses_basic_auth_header() {
        let raw = b"POST /rpc HTTP/1.1\r\nAuthorization: Basic dXNlcjpwYXNz\r\nContent-Length: 2\r\n\r\n{}";
        let mut cursor = Cursor::new(raw.to_vec());
        let req = read_request(&mut cursor, "/rpc").await.unwrap();
        let auth = req.basic_auth.unwrap();
        assert_eq!(auth.username, "user");
        assert_eq!(auth.password, "pass");
    }

    #[tokio::test]
    async fn response_content_length_matches_body() {
        let mut out = Vec::new();
        write_response(&mut out, r#"{"result":1,"error":null,"id":1}"#)
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        let declared: usize = text
            .lines()
            .find_map(|l| l.strip_prefix("Content-Length: "))
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let body = text.split("\r\n\r\n").nth(1).unwrap();
        assert_eq!(declared, body.as_bytes().len());
    }

    #[tokio::test]
    async fn client_rejects_non_200_status() {
        let raw = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
        let mut cursor = Cursor::new(raw.to_vec());
        let err = read_response(&mut cursor).await.unwrap_err();
        assert!(matches!(err, HttpError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn client_round_trips_response_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json-rpc\r\nContent-Length: 17\r\n\r\n{\"result\":true}\r\n";
        let mut cursor = Cursor::new(raw.to_vec());
        let body = read_response(&mut cursor).await.unwrap();
        assert_eq!(body, "{\"result\":true}\r\n"[..17].to_owned());
    }
}
