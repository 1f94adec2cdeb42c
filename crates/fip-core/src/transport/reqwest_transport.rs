use super::{Method, Transport, TransportResponse};
use crate::error::TransportError;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Default transport: a single shared `reqwest::Client`, honouring a
/// per-request deadline and an external cancellation signal via
/// `tokio::select!`.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        execute(&self.client, method, url, headers, body, timeout, cancel).await
    }
}

/// Shared by [`ReqwestTransport`] and the mesh-aware fallback once it
/// has picked an address family, so both paths classify errors the
/// same way.
pub(super) async fn execute(
    client: &reqwest::Client,
    method: Method,
    url: &str,
    headers: &[(String, String)],
    body: Vec<u8>,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<TransportResponse, TransportError> {
    let host = url_host(url);

    let mut builder = match method {
        Method::Get => client.get(url),
        Method::Post => client.post(url),
    };
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    if !body.is_empty() {
        builder = builder.body(body);
    }

    let start = Instant::now();
    let send = builder.timeout(timeout).send();

    let response = tokio::select! {
        result = send => result.map_err(|e| classify_reqwest_error(&host, e))?,
        _ = cancel.cancelled() => return Err(TransportError::Cancelled { host }),
    };

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| classify_reqwest_error(&host, e))?
        .to_vec();

    let _ = start.elapsed();

    Ok(TransportResponse {
        status,
        bytes,
        headers,
    })
}

fn classify_reqwest_error(host: &str, err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout {
            host: host.to_string(),
            elapsed_ms: 0,
        };
    }
    if err.is_connect() {
        return TransportError::Connect {
            host: host.to_string(),
            message: err.to_string(),
        };
    }
    TransportError::Protocol {
        host: host.to_string(),
        message: err.to_string(),
    }
}

fn url_host(url: &str) -> String {
    url.parse::<reqwest::Url>()
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method as method_matcher, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn get_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method_matcher("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new();
        let resp = transport
            .request(
                Method::Get,
                &format!("{}/ping", server.uri()),
                &[],
                Vec::new(),
                Duration::from_secs(5),
                CancellationToken::new(),
            )
            .await
            .expect("request");

        assert_eq!(resp.status, 200);
        assert_eq!(resp.bytes, b"pong");
    }

    #[tokio::test]
    async fn cancellation_short_circuits() {
        let server = MockServer::start().await;
        Mock::given(method_matcher("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = transport
            .request(
                Method::Get,
                &format!("{}/slow", server.uri()),
                &[],
                Vec::new(),
                Duration::from_secs(5),
                cancel,
            )
            .await;

        assert!(matches!(result, Err(TransportError::Cancelled { .. })));
    }
}
