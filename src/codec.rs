// Copyright 2026 reflect-rpc Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Module E: the line framer.
//!
//! A `tokio_util::codec` `Decoder`/`Encoder` pair: accumulates a byte
//! stream, emits complete newline-terminated messages (a preceding `\r` is
//! tolerated and stripped, empty lines are skipped), and writes replies
//! followed by `\r\n`. Genuinely partial lines are held in the codec's
//! internal buffer by `tokio_util` until their terminator arrives — the
//! same "never read past what's needed" behavior as the reference client's
//! `rpc_call_raw` loop in `original_source/reflectrpc/__init__.py`.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Codec for the raw line-delimited wire format. Operates on already
/// UTF-8-decoded text; `Decoder::decode` yields one complete line per call,
/// skipping blank lines internally so callers never see them.
#[derive(Debug, Default)]
pub struct LineCodec {
    _priv: (),
}

impl LineCodec {
    pub fn new() -> Self {
        LineCodec::default()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LineCodecError {
    #[error("line was not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = LineCodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline_pos = match src.iter().position(|b| *b == b'\n') {
                Some(pos) => pos,
                None => return Ok(None),
            };

            let mut line = src.split_to(newline_pos + 1);
            line.truncate(line.len() - 1); // drop '\n'
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }

            if line.is_empty() {
                // Empty lines are ignored (§4.E); keep scanning the buffer.
                continue;
            }

            let text = std::str::from_utf8(&line)?.to_owned();
            return Ok(Some(text));
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = LineCodecError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len() + 2);
        dst.put_slice(item.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Advances `src` without allocating, used by tests that want to assert
/// no-op decode attempts don't consume partial data.
#[cfg(test)]
fn remaining(src: &BytesMut) -> usize {
    src.remaining()
}
