//! Wire framing. A request is command text followed by one NUL byte; a
//! response is any number of bytes followed by one [`EOF_CHAR`].

use std::io::{self, Read, Write};

use tracing::debug;

/// Marks the end of every response.
pub const EOF_CHAR: u8 = 0x04;
/// Terminates every request.
pub const REQUEST_END: u8 = 0;

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Command(String),
    /// The buffer filled up before a terminator arrived.
    Oversized,
}

/// Splits a byte stream into requests. Bytes that arrive after a
/// terminator are kept for the next call.
#[derive(Debug)]
pub struct RequestReader<R> {
    inner: R,
    buf: Vec<u8>,
    capacity: usize,
    discarding: bool,
}

impl<R: Read> RequestReader<R> {
    pub fn new(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(capacity.min(READ_CHUNK)),
            capacity: capacity.max(1),
            discarding: false,
        }
    }

    /// Returns `Ok(None)` once the peer has closed the connection. An
    /// unterminated request pending at that point is dropped.
    pub fn next_request(&mut self) -> io::Result<Option<Request>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if !self.discarding {
                if let Some(pos) = self.buf.iter().position(|&b| b == REQUEST_END) {
                    let text = String::from_utf8_lossy(&self.buf[..pos]).into_owned();
                    self.buf.drain(..=pos);
                    return Ok(Some(Request::Command(text)));
                }
                if self.buf.len() >= self.capacity {
                    self.buf.clear();
                    self.discarding = true;
                    return Ok(Some(Request::Oversized));
                }
            }

            let want = if self.discarding {
                READ_CHUNK
            } else {
                (self.capacity - self.buf.len()).min(READ_CHUNK)
            };
            let read = match self.inner.read(&mut chunk[..want]) {
                Ok(0) => {
                    if !self.buf.is_empty() {
                        debug!(bytes = self.buf.len(), "dropping unterminated request");
                    }
                    return Ok(None);
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            let received = &chunk[..read];
            if self.discarding {
                if let Some(pos) = received.iter().position(|&b| b == REQUEST_END) {
                    self.discarding = false;
                    self.buf.extend_from_slice(&received[pos + 1..]);
                }
            } else {
                self.buf.extend_from_slice(received);
            }
        }
    }
}

/// Writes the end-of-response marker.
pub fn send_eof<W: Write>(out: &mut W) -> io::Result<()> {
    out.write_all(&[EOF_CHAR])?;
    out.flush()
}

/// Writes a complete response: `message` and the end-of-response marker.
pub fn send_message<W: Write>(out: &mut W, message: &str) -> io::Result<()> {
    out.write_all(message.as_bytes())?;
    send_eof(out)
}

/// Writes `command` as one request.
pub fn send_request<W: Write>(out: &mut W, command: &str) -> io::Result<()> {
    out.write_all(command.as_bytes())?;
    out.write_all(&[REQUEST_END])?;
    out.flush()
}
