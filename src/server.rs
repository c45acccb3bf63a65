//! Line-delimited JSON over TCP.
//!
//! One thread per connection. Each request line gets exactly one response
//! line; a line longer than the configured limit is answered with a `parse`
//! error and skipped, and the connection stays usable.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

use crate::api::{Response, Service, encode_response};
use crate::config::ServerConfig;

/// A bound, not yet running, request server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    service: Service,
    max_request_bytes: usize,
}

impl Server {
    /// Bind to `config.listen`.
    ///
    /// # Errors
    /// Returns the I/O error if the address cannot be bound.
    pub fn bind(config: &ServerConfig, service: Service) -> io::Result<Self> {
        let listener = TcpListener::bind(config.listen)?;
        Ok(Self {
            listener,
            service,
            max_request_bytes: config.max_request_bytes,
        })
    }

    /// The bound address (useful when binding port 0).
    ///
    /// # Errors
    /// Returns the I/O error from the socket.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever.
    pub fn run(self) {
        match self.listener.local_addr() {
            Ok(addr) => tracing::info!(%addr, "listening"),
            Err(e) => tracing::warn!(error = %e, "listening on unknown address"),
        }
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let service = self.service.clone();
                    let max = self.max_request_bytes;
                    std::thread::spawn(move || {
                        let peer = stream.peer_addr().ok();
                        if let Err(e) = handle_client(stream, &service, max) {
                            tracing::debug!(?peer, error = %e, "connection closed with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept error");
                }
            }
        }
    }
}

/// Serve one connection until the client hangs up.
fn handle_client(stream: TcpStream, service: &Service, max_request_bytes: usize) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    let limit = u64::try_from(max_request_bytes).unwrap_or(u64::MAX).saturating_add(1);

    loop {
        let mut buf = Vec::new();
        let n = (&mut reader).take(limit).read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Ok(());
        }

        let response = if buf.last() != Some(&b'\n') && buf.len() > max_request_bytes {
            skip_line(&mut reader)?;
            encode_response(&Response::parse_error(format!(
                "request exceeds {max_request_bytes} bytes"
            )))
        } else {
            match std::str::from_utf8(&buf) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => service.handle_line(line.trim_end()),
                Err(e) => encode_response(&Response::parse_error(format!("request is not UTF-8: {e}"))),
            }
        };

        writer.write_all(response.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
}

/// Discard input up to and including the next newline.
fn skip_line(reader: &mut impl BufRead) -> io::Result<()> {
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(());
        }
        if let Some(i) = available.iter().position(|&b| b == b'\n') {
            reader.consume(i + 1);
            return Ok(());
        }
        let len = available.len();
        reader.consume(len);
    }
}
