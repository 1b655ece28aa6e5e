//! Outbound HTTP stream client backed by reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use upnp_message::{Body, HeaderName, Operation, StreamRequest, StreamResponse, UpnpMessage};

use crate::transport::StreamClient;

const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// The single outbound HTTP client shared by all protocols.
///
/// GENA uses non-standard methods (SUBSCRIBE, UNSUBSCRIBE, NOTIFY) and
/// vendor headers; both pass through reqwest unmodified.
pub struct HttpStreamClient {
    client: Client,
}

impl HttpStreamClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(EXCHANGE_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    fn build_request(&self, request: &StreamRequest) -> Option<reqwest::Request> {
        let method = match &request.message.operation {
            Operation::Request { method, .. } => {
                reqwest::Method::from_bytes(method.as_str().as_bytes()).ok()?
            }
            Operation::Response { .. } => {
                debug!("refusing to send a response message as a stream request");
                return None;
            }
        };

        let mut builder = self.client.request(method, request.url.as_str());
        for (name, value) in request.message.headers.iter() {
            // HOST and CONTENT-LENGTH are derived by the client itself
            if matches!(name, HeaderName::Host) {
                continue;
            }
            builder = builder.header(name.as_str(), value);
        }
        builder = match &request.message.body {
            Body::None => builder,
            Body::Text(text) => builder.body(text.clone()),
            Body::Binary(data) => builder.body(data.clone()),
        };

        builder.build().ok()
    }
}

impl Default for HttpStreamClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamClient for HttpStreamClient {
    async fn send_request(&self, request: StreamRequest) -> Option<StreamResponse> {
        let url = request.url.clone();
        let built = self.build_request(&request)?;

        let response = match self.client.execute(built).await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "stream exchange failed");
                return None;
            }
        };

        let status = response.status();
        let mut message = UpnpMessage::response(
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
        );
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                message
                    .headers
                    .add(HeaderName::from_wire(name.as_str()), value);
            }
        }
        match response.text().await {
            Ok(text) if !text.is_empty() => message.body = Body::Text(text),
            Ok(_) => {}
            Err(e) => {
                warn!(url = %url, error = %e, "failed to read stream response body");
                return None;
            }
        }

        Some(StreamResponse { message })
    }
}
