use std::{future::Future, time::Duration};

use bytes::Bytes;
use reqwest::{Client, Url};

use crate::error::Error;

/// kind of payload a request expects from the frame source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// opaque image bytes, whatever the content type says
    Binary,
}

/// a single fetch attempt issued by the poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRequest {
    endpoint: Url,
    payload: PayloadKind,
    sequence: u64,
}

impl FrameRequest {
    pub fn new(endpoint: Url, sequence: u64) -> Self {
        Self { endpoint, payload: PayloadKind::Binary, sequence }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn payload(&self) -> PayloadKind {
        self.payload
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Something which hands out a single still frame per request
pub trait FrameSource: Send + Sync + 'static {
    fn fetch(&self, request: &FrameRequest) -> impl Future<Output = Result<Bytes, Error>> + Send;
}

/// frame source pulling a still image over plain `GET` requests
#[derive(Clone)]
pub struct HttpFrameSource {
    client: Client,
    timeout: Option<Duration>,
}

impl HttpFrameSource {
    pub fn new(timeout: Option<Duration>) -> Result<Self, Error> {
        let client = Client::builder().build().map_err(Error::Transport)?;
        Ok(Self::with_client(client, timeout))
    }

    pub fn with_client(client: Client, timeout: Option<Duration>) -> Self {
        Self { client, timeout }
    }
}

impl FrameSource for HttpFrameSource {
    async fn fetch(&self, request: &FrameRequest) -> Result<Bytes, Error> {
        log::debug!("requesting frame {} from {}", request.sequence(), request.endpoint());

        let mut builder = self.client.get(request.endpoint().clone());
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(Error::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Server(status));
        }

        let bytes = response.bytes().await.map_err(Error::Transport)?;
        log::debug!("received {} bytes for frame {}", bytes.len(), request.sequence());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_expect_binary_payloads() {
        let url = Url::parse("http://127.0.0.1:8000/video_feed").unwrap();
        let request = FrameRequest::new(url.clone(), 3);
        assert_eq!(request.endpoint(), &url);
        assert_eq!(request.payload(), PayloadKind::Binary);
        assert_eq!(request.sequence(), 3);
    }
}
