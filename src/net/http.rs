//! reqwest-backed [`Transport`] for talking to a live triage service.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderValue};

use super::gateway::{HttpRequest, HttpResponse, Method, RequestBody, Transport, TransportError};

/// HTTP transport bound to one service base URL.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Build a transport with request/connect timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(base_url: &str, request_timeout: Duration, connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait(?Send)]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.url(&request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        let builder = match request.authorization {
            Some(value) => {
                let value = HeaderValue::from_str(&value).map_err(|e| TransportError(e.to_string()))?;
                builder.header(AUTHORIZATION, value)
            }
            None => builder,
        };
        let builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(json) => builder.json(json),
            RequestBody::Form(fields) => builder.form(fields),
        };

        let response = builder.send().await.map_err(|e| TransportError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}
