//! Mail transport boundary.
//!
//! A minimal POP-style contract: stateful numeric indices, the highest index
//! is the most recent message. The poller only needs connect/stat/retr/quit;
//! timeouts are whatever the underlying transport provides.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("mail server connection failed: {0}")]
    Io(#[from] std::io::Error),

    /// The server answered a command with an error status.
    #[error("mail server refused {command}: {reply}")]
    Protocol { command: String, reply: String },

    /// USER/PASS were rejected.
    #[error("mail server authentication failed: {reply}")]
    Auth { reply: String },

    /// A command was issued without an established connection.
    #[error("not connected to mail server")]
    NotConnected,
}

/// POP-style mailbox access.
#[async_trait]
pub trait MailTransport: Send {
    /// Connect and authenticate.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Total number of messages in the mailbox.
    async fn stat(&mut self) -> Result<u32, TransportError>;

    /// Fetch the raw bytes of the message at the given 1-based index.
    async fn retr(&mut self, index: u32) -> Result<Vec<u8>, TransportError>;

    /// Close the session. Safe to call after a failed connect.
    async fn quit(&mut self) -> Result<(), TransportError>;
}

/// A small POP3 client over a plain TCP stream.
pub struct Pop3Client {
    host: String,
    port: u16,
    username: String,
    password: String,
    stream: Option<BufReader<TcpStream>>,
}

impl Pop3Client {
    #[must_use]
    pub fn new(host: String, port: u16, username: String, password: String) -> Self {
        Self {
            host,
            port,
            username,
            password,
            stream: None,
        }
    }

    fn stream(&mut self) -> Result<&mut BufReader<TcpStream>, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }

    async fn read_line(&mut self) -> Result<String, TransportError> {
        let stream = self.stream()?;
        let mut buf = Vec::new();
        stream.read_until(b'\n', &mut buf).await?;
        if buf.is_empty() {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )));
        }
        // Replies are ASCII; lossy decoding keeps a broken server visible.
        Ok(String::from_utf8_lossy(&buf).trim_end().to_string())
    }

    /// Send a command and expect a `+OK` status line.
    async fn command(&mut self, command: &str) -> Result<String, TransportError> {
        let stream = self.stream()?;
        stream
            .get_mut()
            .write_all(format!("{command}\r\n").as_bytes())
            .await?;
        let reply = self.read_line().await?;
        debug!(command = command.split(' ').next().unwrap_or(command), %reply, "pop3 exchange");
        if reply.starts_with("+OK") {
            Ok(reply)
        } else {
            Err(TransportError::Protocol {
                command: command.split(' ').next().unwrap_or(command).to_string(),
                reply,
            })
        }
    }

    /// Read a multiline response body up to the lone-dot terminator,
    /// reversing dot-stuffing.
    async fn read_multiline(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut body = Vec::new();
        loop {
            let stream = self.stream()?;
            let mut line = Vec::new();
            stream.read_until(b'\n', &mut line).await?;
            if line.is_empty() {
                return Err(TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "server closed mid-message",
                )));
            }
            if line == b".\r\n" || line == b".\n" {
                return Ok(body);
            }
            if line.starts_with(b"..") {
                body.extend_from_slice(&line[1..]);
            } else {
                body.extend_from_slice(&line);
            }
        }
    }
}

#[async_trait]
impl MailTransport for Pop3Client {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        self.stream = Some(BufReader::new(stream));

        let greeting = self.read_line().await?;
        if !greeting.starts_with("+OK") {
            return Err(TransportError::Protocol {
                command: "greeting".to_string(),
                reply: greeting,
            });
        }

        for command in [
            format!("USER {}", self.username),
            format!("PASS {}", self.password),
        ] {
            match self.command(&command).await {
                Ok(_) => {}
                Err(TransportError::Protocol { reply, .. }) => {
                    return Err(TransportError::Auth { reply })
                }
                Err(other) => return Err(other),
            }
        }

        Ok(())
    }

    async fn stat(&mut self) -> Result<u32, TransportError> {
        let reply = self.command("STAT").await?;
        // "+OK <count> <size>"
        let count = reply
            .split_whitespace()
            .nth(1)
            .and_then(|c| c.parse().ok())
            .ok_or(TransportError::Protocol {
                command: "STAT".to_string(),
                reply: reply.clone(),
            })?;
        Ok(count)
    }

    async fn retr(&mut self, index: u32) -> Result<Vec<u8>, TransportError> {
        self.command(&format!("RETR {index}")).await?;
        self.read_multiline().await
    }

    async fn quit(&mut self) -> Result<(), TransportError> {
        if self.stream.is_none() {
            return Ok(());
        }
        let result = self.command("QUIT").await;
        self.stream = None;
        result.map(|_| ())
    }
}
