//! Newline-delimited line codec for tokio.
//!
//! Inbound lines are yielded without their `\r\n` terminator and decoded
//! lossily, since servers relay whatever bytes other clients send. Outbound
//! lines get `\r\n` appended.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{IrcError, Result};

/// Default inbound limit. Generous compared to RFC 1459's 512 bytes so that
/// tagged lines from modern servers still fit.
pub const DEFAULT_MAX_LINE_LEN: usize = 8192;

/// Codec that frames a byte stream into text lines.
#[derive(Debug)]
pub struct LineCodec {
    /// Index of the next byte to scan for `\n`.
    next_index: usize,
    max_len: usize,
}

impl LineCodec {
    /// Create a codec with the default length limit.
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Create a codec with a custom inbound length limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = IrcError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
            self.next_index = src.len();
            if src.len() > self.max_len {
                return Err(IrcError::LineTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }
            return Ok(None);
        };

        let line = src.split_to(self.next_index + offset + 1);
        self.next_index = 0;

        if line.len() > self.max_len {
            return Err(IrcError::LineTooLong {
                actual: line.len(),
                limit: self.max_len,
            });
        }

        let text = String::from_utf8_lossy(&line);
        Ok(Some(text.trim_end_matches(['\r', '\n']).to_string()))
    }
}

impl Encoder<String> for LineCodec {
    type Error = IrcError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<()> {
        let line = line.trim_end_matches(['\r', '\n']);
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
