//! Minimal line-protocol client.

use greeter_server::{Request, Response};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

pub struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    /// Sends `request` and waits for its response.
    pub async fn request(&mut self, request: &Request) -> io::Result<Response> {
        let line = request.to_line().map_err(io::Error::other)?;
        self.writer.write_all(&line).await?;
        self.next_response().await
    }

    /// Reads the next line from the service.
    pub async fn next_response(&mut self) -> io::Result<Response> {
        let line = self.lines.next_line().await?.ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by server")
        })?;
        serde_json::from_str(&line).map_err(io::Error::other)
    }
}
