//! Request/response messages and the datagram/stream envelopes.

use std::net::{IpAddr, SocketAddr};

use url::Url;

use crate::error::MessageError;
use crate::header::Headers;

/// Methods used by SSDP and GENA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    MSearch,
    Notify,
    Subscribe,
    Unsubscribe,
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::MSearch => "M-SEARCH",
            Method::Notify => "NOTIFY",
            Method::Subscribe => "SUBSCRIBE",
            Method::Unsubscribe => "UNSUBSCRIBE",
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "M-SEARCH" => Some(Method::MSearch),
            "NOTIFY" => Some(Method::Notify),
            "SUBSCRIBE" => Some(Method::Subscribe),
            "UNSUBSCRIBE" => Some(Method::Unsubscribe),
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            _ => None,
        }
    }
}

/// A message is either a request (method + target) or a response (status).
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Request { method: Method, target: String },
    Response { status: u16, reason: String },
}

impl Operation {
    pub fn is_request(&self) -> bool {
        matches!(self, Operation::Request { .. })
    }

    /// Request method, `None` for responses.
    pub fn method(&self) -> Option<Method> {
        match self {
            Operation::Request { method, .. } => Some(*method),
            Operation::Response { .. } => None,
        }
    }

    /// Response status, `None` for requests.
    pub fn status(&self) -> Option<u16> {
        match self {
            Operation::Response { status, .. } => Some(*status),
            Operation::Request { .. } => None,
        }
    }
}

/// Message body: text or binary, never both.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    None,
    Text(String),
    Binary(Vec<u8>),
}

impl Body {
    pub fn is_none(&self) -> bool {
        matches!(self, Body::None)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// One SSDP/GENA message: operation, ordered headers, optional body.
#[derive(Debug, Clone, PartialEq)]
pub struct UpnpMessage {
    pub operation: Operation,
    pub headers: Headers,
    pub body: Body,
}

impl UpnpMessage {
    pub fn request(method: Method, target: impl Into<String>) -> Self {
        Self {
            operation: Operation::Request {
                method,
                target: target.into(),
            },
            headers: Headers::new(),
            body: Body::None,
        }
    }

    pub fn response(status: u16, reason: impl Into<String>) -> Self {
        Self {
            operation: Operation::Response {
                status,
                reason: reason.into(),
            },
            headers: Headers::new(),
            body: Body::None,
        }
    }

    /// `200 OK` shorthand.
    pub fn ok() -> Self {
        Self::response(200, "OK")
    }

    /// Serialize to wire bytes: start line, headers, blank line, body.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut head = String::new();
        match &self.operation {
            Operation::Request { method, target } => {
                head.push_str(method.as_str());
                head.push(' ');
                head.push_str(target);
                head.push_str(" HTTP/1.1\r\n");
            }
            Operation::Response { status, reason } => {
                head.push_str(&format!("HTTP/1.1 {status} {reason}\r\n"));
            }
        }
        self.headers.write_wire(&mut head);
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        match &self.body {
            Body::None => {}
            Body::Text(text) => bytes.extend_from_slice(text.as_bytes()),
            Body::Binary(data) => bytes.extend_from_slice(data),
        }
        bytes
    }

    /// Parse wire bytes. The header section must be UTF-8; the body is
    /// kept as text when it decodes cleanly, binary otherwise.
    pub fn from_wire(data: &[u8]) -> Result<Self, MessageError> {
        let (head, body) = split_head_body(data)?;
        let head = std::str::from_utf8(head).map_err(|_| MessageError::InvalidUtf8)?;

        let mut lines = head.split("\r\n");
        let start = lines.next().ok_or(MessageError::Truncated)?.trim();
        let operation = parse_start_line(start)?;

        let mut headers = Headers::new();
        for line in lines {
            headers.parse_wire_line(line);
        }

        let body = if body.is_empty() {
            Body::None
        } else {
            match std::str::from_utf8(body) {
                Ok(text) => Body::Text(text.to_string()),
                Err(_) => Body::Binary(body.to_vec()),
            }
        };

        Ok(Self {
            operation,
            headers,
            body,
        })
    }
}

fn split_head_body(data: &[u8]) -> Result<(&[u8], &[u8]), MessageError> {
    let marker = b"\r\n\r\n";
    match data
        .windows(marker.len())
        .position(|window| window == marker)
    {
        Some(idx) => Ok((&data[..idx], &data[idx + marker.len()..])),
        // Tolerate datagrams that omit the trailing blank line.
        None => Ok((data, &[][..])),
    }
}

fn parse_start_line(line: &str) -> Result<Operation, MessageError> {
    if line.is_empty() {
        return Err(MessageError::InvalidStartLine(line.to_string()));
    }

    let mut tokens = line.split_whitespace();
    let first = tokens.next().ok_or_else(|| {
        MessageError::InvalidStartLine(line.to_string())
    })?;

    if first.to_ascii_uppercase().starts_with("HTTP/") {
        let status = tokens
            .next()
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| MessageError::InvalidStartLine(line.to_string()))?;
        let reason = tokens.collect::<Vec<_>>().join(" ");
        return Ok(Operation::Response { status, reason });
    }

    let method = Method::from_wire(first)
        .ok_or_else(|| MessageError::InvalidStartLine(line.to_string()))?;
    let target = tokens
        .next()
        .ok_or_else(|| MessageError::InvalidStartLine(line.to_string()))?
        .to_string();
    Ok(Operation::Request { method, target })
}

/// A message bound for one destination, fanned out by the router.
#[derive(Debug, Clone)]
pub struct OutgoingDatagram {
    pub message: UpnpMessage,
    pub destination: SocketAddr,
}

impl OutgoingDatagram {
    pub fn new(message: UpnpMessage, destination: SocketAddr) -> Self {
        Self {
            message,
            destination,
        }
    }
}

/// A received datagram with its source and the local address it arrived on.
#[derive(Debug, Clone)]
pub struct IncomingDatagram {
    pub message: UpnpMessage,
    pub source: SocketAddr,
    /// The local address of the interface that received this packet;
    /// responses derive their LOCATION and hardware headers from it.
    pub local_address: IpAddr,
}

/// An outbound HTTP exchange (GENA SUBSCRIBE/UNSUBSCRIBE/NOTIFY).
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub message: UpnpMessage,
    pub url: Url,
}

/// The response to a [`StreamRequest`].
#[derive(Debug, Clone)]
pub struct StreamResponse {
    pub message: UpnpMessage,
}

impl StreamResponse {
    pub fn status(&self) -> u16 {
        self.message.operation.status().unwrap_or(0)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status())
    }
}
