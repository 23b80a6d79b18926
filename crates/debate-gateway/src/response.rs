//! HTTP response serialization.
//!
//! Every response carries `Cache-Control: no-store` and `Connection: close`;
//! the connection is closed after one response.

use reqwest::StatusCode;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const TEXT_HTML: &str = "text/html; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json; charset=utf-8";

/// A complete response, written in one go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: Some(content_type.into()),
            body: body.into(),
        }
    }

    pub fn text(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self::new(status, TEXT_PLAIN, body)
    }

    pub fn html(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, TEXT_HTML, body)
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        Self::new(status, APPLICATION_JSON, body)
    }

    /// `{"error": message}`
    pub fn json_error(status: u16, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }

    /// 204 with no body and no content headers.
    pub fn no_content() -> Self {
        Self {
            status: 204,
            content_type: None,
            body: Vec::new(),
        }
    }

    pub fn not_found() -> Self {
        Self::text(404, "not found\n")
    }

    pub fn payload_too_large() -> Self {
        Self::text(413, "payload too large\n")
    }

    pub fn reason(&self) -> &'static str {
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown")
    }

    /// Status line, headers, and body as sent on the wire.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason());
        if let Some(content_type) = &self.content_type {
            head.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        if self.status != 204 {
            head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        }
        head.push_str("Cache-Control: no-store\r\n");
        head.push_str("Connection: close\r\n\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }

    pub async fn write_to<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.to_bytes()).await?;
        writer.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(resp: &HttpResponse) -> String {
        String::from_utf8(resp.to_bytes()).unwrap()
    }

    #[test]
    fn test_not_found_wire_format() {
        assert_eq!(
            wire(&HttpResponse::not_found()),
            "HTTP/1.1 404 Not Found\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Length: 10\r\n\
Cache-Control: no-store\r\n\
Connection: close\r\n\r\n\
not found\n"
        );
    }

    #[test]
    fn test_no_content_omits_length() {
        let text = wire(&HttpResponse::no_content());
        assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(!text.contains("Content-Length"));
        assert!(!text.contains("Content-Type"));
        assert!(text.ends_with("Connection: close\r\n\r\n"));
    }

    #[test]
    fn test_json_error_escapes() {
        let resp = HttpResponse::json_error(502, "said \"no\"");
        assert_eq!(resp.body, br#"{"error":"said \"no\""}"#);
        assert_eq!(resp.reason(), "Bad Gateway");
    }

    #[test]
    fn test_unknown_status_reason() {
        assert_eq!(HttpResponse::text(599, "").reason(), "Unknown");
    }

    #[tokio::test]
    async fn test_write_to() {
        let mut out = Vec::new();
        HttpResponse::payload_too_large()
            .write_to(&mut out)
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));
        assert!(text.ends_with("payload too large\n"));
    }
}
