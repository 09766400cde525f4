//! HTTP responses via reqwest

use reqwest::{RequestBuilder, Response};
use tracing::debug;

use super::{BoxChunkSource, StreamBody, StreamResponse};

/// A reqwest response consumed as a chunk stream
#[derive(Debug)]
pub struct HttpResponse {
    inner: Response,
}

impl HttpResponse {
    pub fn new(inner: Response) -> Self {
        Self { inner }
    }
}

impl From<Response> for HttpResponse {
    fn from(inner: Response) -> Self {
        Self::new(inner)
    }
}

impl StreamResponse for HttpResponse {
    fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    fn into_body(self: Box<Self>) -> BoxChunkSource {
        Box::new(StreamBody::new(self.inner.bytes_stream()))
    }
}

/// Send a request and wrap the response for streaming
///
/// Only transport errors fail here; non-2xx statuses are left for the
/// engine to reject.
pub async fn send(request: RequestBuilder) -> Result<HttpResponse, reqwest::Error> {
    let response = request.send().await?;
    debug!(
        status = response.status().as_u16(),
        url = %response.url(),
        "HTTP response received"
    );
    Ok(HttpResponse::new(response))
}
