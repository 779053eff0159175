//! LSP Transport Layer
//!
//! Handles LSP message framing with Content-Length headers over any
//! duplex byte stream: a child's stdio or a TCP socket.

use std::io;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::protocol::{Message, Notification, Request, Response};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Largest frame body accepted from the server
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Reading half of a framed LSP connection
pub struct Transport {
    reader: BufReader<BoxedReader>,
}

impl Transport {
    pub fn new(reader: BoxedReader) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next message from the server
    ///
    /// LSP messages are framed with headers:
    /// ```text
    /// Content-Length: 123\r\n
    /// \r\n
    /// {"jsonrpc":"2.0",...}
    /// ```
    pub async fn read_message(&mut self) -> io::Result<Message> {
        let json = self.read_frame().await?;
        tracing::trace!("LSP <- {}", json);
        Message::parse(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Read one frame body as text
    pub async fn read_frame(&mut self) -> io::Result<String> {
        let content_length = self.read_headers().await?;
        if content_length > MAX_FRAME_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Frame of {content_length} bytes exceeds {MAX_FRAME_BYTES}"),
            ));
        }

        let mut body = vec![0u8; content_length];
        self.reader.read_exact(&mut body).await?;

        String::from_utf8(body).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Read headers and return Content-Length
    async fn read_headers(&mut self) -> io::Result<usize> {
        let mut content_length: Option<usize> = None;
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Server closed connection",
                ));
            }

            let line = line.trim();

            // Empty line marks end of headers
            if line.is_empty() {
                break;
            }

            if let Some(value) = line.strip_prefix("Content-Length:") {
                content_length = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
                );
            }
            // Content-Type and friends are ignored
        }

        content_length
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "Missing Content-Length"))
    }
}

pub async fn write_request<W>(writer: &mut W, request: &Request) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write_payload(writer, request).await
}

pub async fn write_notification<W>(writer: &mut W, notification: &Notification) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write_payload(writer, notification).await
}

/// Write an LSP response (for server-initiated requests)
pub async fn write_response<W>(writer: &mut W, response: &Response) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    write_payload(writer, response).await
}

/// Serialize any payload and write it with LSP framing
pub async fn write_payload<W, T>(writer: &mut W, payload: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_string(payload)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_message(writer, &json).await
}

async fn write_message<W>(writer: &mut W, json: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    tracing::trace!("LSP -> {}", json);

    let message = format!("Content-Length: {}\r\n\r\n{}", json.len(), json);
    writer.write_all(message.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_survive_a_pipe() {
        let (client, server) = tokio::io::duplex(4096);
        let (_, mut write_half) = tokio::io::split(client);
        let (read_half, _) = tokio::io::split(server);

        let request = Request::new(1, "aya/load", Some(serde_json::json!("file:///ü.aya")));
        write_request(&mut write_half, &request).await.unwrap();
        write_notification(&mut write_half, &Notification::new("exit", None))
            .await
            .unwrap();

        let mut transport = Transport::new(Box::new(read_half));
        match transport.read_message().await.unwrap() {
            Message::Request(r) => {
                assert_eq!(r.method, "aya/load");
                assert_eq!(r.params, Some(serde_json::json!("file:///ü.aya")));
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(matches!(
            transport.read_message().await.unwrap(),
            Message::Notification(n) if n.method == "exit"
        ));
    }

    #[tokio::test]
    async fn test_eof_is_reported() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let mut transport = Transport::new(Box::new(server));
        let err = transport.read_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let body = r#"{"jsonrpc":"2.0","method":"aya/publishSyntaxHighlight","params":{"uri":"file:///a.aya","symbols":[]}}"#;
        let header = format!("Content-Length: {}\r\n", body.len());
        let mock = tokio_test::io::Builder::new()
            .read(header.as_bytes())
            .read(b"Content-Type: application/vscode-jsonrpc; charset=utf-8\r\n\r\n")
            .read(&body.as_bytes()[..20])
            .read(&body.as_bytes()[20..])
            .build();

        let mut transport = Transport::new(Box::new(mock));
        assert!(matches!(
            transport.read_message().await.unwrap(),
            Message::Notification(n) if n.method == "aya/publishSyntaxHighlight"
        ));
    }

    #[tokio::test]
    async fn test_written_frame_bytes() {
        let request = Request::new(7, "shutdown", None);
        let body = serde_json::to_string(&request).unwrap();
        let frame = format!("Content-Length: {}\r\n\r\n{}", body.len(), body);
        let mut mock = tokio_test::io::Builder::new()
            .write(frame.as_bytes())
            .build();

        tokio_test::assert_ok!(write_request(&mut mock, &request).await);
    }

    #[tokio::test]
    async fn test_missing_content_length() {
        let bytes: &[u8] = b"Content-Type: application/json\r\n\r\n{}";
        let mut transport = Transport::new(Box::new(bytes));
        let err = transport.read_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let bytes: &[u8] = b"Content-Length: 18446744073709551615\r\n\r\n";
        let mut transport = Transport::new(Box::new(bytes));
        let err = transport.read_message().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
