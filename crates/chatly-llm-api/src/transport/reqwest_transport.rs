use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

use super::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Default timeout for a whole request/response round-trip
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Network transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn to_header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("bad header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidRequest(format!("bad value for header '{}': {}", name, e)))?;
        map.append(name, value);
    }
    Ok(map)
}

fn from_header_map(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else {
        TransportError::Network(error.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let headers = to_header_map(&request.headers)?;

        let response = self
            .client
            .request(request.method, &request.url)
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let headers = from_header_map(response.headers());
        // Read to completion so callers and decorators all see the same bytes
        let body = response.bytes().await.map_err(classify)?;

        Ok(HttpResponse { status, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_name_is_rejected() {
        let err = to_header_map(&[("bad header".to_string(), "v".to_string())]).unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }

    #[test]
    fn test_header_map_round_trip_keeps_duplicates() {
        let headers = vec![
            ("accept".to_string(), "application/json".to_string()),
            ("x-trace".to_string(), "a".to_string()),
            ("x-trace".to_string(), "b".to_string()),
        ];
        let map = to_header_map(&headers).unwrap();
        assert_eq!(from_header_map(&map).len(), 3);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let transport = ReqwestTransport::with_timeout(Duration::from_secs(5)).unwrap();
        let request = HttpRequest::post("http://127.0.0.1:1/v1/chat/completions", "{}");
        let err = transport.send(request).await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_) | TransportError::Timeout(_)));
    }
}
