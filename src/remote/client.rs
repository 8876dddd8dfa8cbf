use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};

use super::protocol::{send_request, EOF_CHAR};

/// A connection to an rdsh server.
pub struct Client {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Client {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self { stream, reader })
    }

    pub fn send(&mut self, command: &str) -> io::Result<()> {
        send_request(&mut self.stream, command)
    }

    /// Writes bytes as-is, without request framing.
    pub fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }

    /// Reads one response, without its end marker.
    pub fn read_response(&mut self) -> io::Result<Vec<u8>> {
        let mut response = Vec::new();
        self.reader.read_until(EOF_CHAR, &mut response)?;
        if response.pop() != Some(EOF_CHAR) {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            ));
        }
        Ok(response)
    }

    pub fn read_text(&mut self) -> io::Result<String> {
        let response = self.read_response()?;
        Ok(String::from_utf8_lossy(&response).into_owned())
    }

    /// Sends `command` and waits for its complete response.
    pub fn execute(&mut self, command: &str) -> io::Result<String> {
        self.send(command)?;
        self.read_text()
    }
}
