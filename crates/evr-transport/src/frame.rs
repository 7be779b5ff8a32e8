// SPDX-License-Identifier: MIT

//! Line-delimited JSON framing (§4.7): one frame per `\n`-terminated
//! line (`\r\n` tolerated), capped at a configurable maximum size.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Default cap on a single frame's byte length, overridable via
/// `KSI_MAX_FRAME_BYTES`.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame exceeded {0} bytes before a line terminator was found")]
    TooLarge(usize),
    #[error("frame was not valid UTF-8")]
    InvalidUtf8,
    #[error("connection I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read one frame from `reader`. Returns `Ok(None)` on a clean EOF with
/// no partial data buffered (the connection's normal close). Returns
/// `FrameError::TooLarge` as soon as the accumulated line exceeds
/// `max_bytes`, without waiting for the rest of the (possibly huge)
/// line to arrive.
pub async fn read_frame<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    max_bytes: usize,
) -> Result<Option<String>, FrameError> {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return if buf.is_empty() {
                Ok(None)
            } else {
                Err(FrameError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-frame",
                )))
            };
        }

        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                buf.extend_from_slice(&available[..pos]);
                reader.consume(pos + 1);
                if buf.len() > max_bytes {
                    return Err(FrameError::TooLarge(max_bytes));
                }
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                return String::from_utf8(buf).map(Some).map_err(|_| FrameError::InvalidUtf8);
            }
            None => {
                buf.extend_from_slice(available);
                let consumed = available.len();
                reader.consume(consumed);
                if buf.len() > max_bytes {
                    return Err(FrameError::TooLarge(max_bytes));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
