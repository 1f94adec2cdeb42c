use super::reqwest_transport::execute;
use super::{Method, Transport, TransportResponse};
use crate::error::TransportError;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
enum Family {
    V6,
    V4,
    Unspecified,
}

impl Family {
    fn matches(self, addr: &IpAddr) -> bool {
        match self {
            Family::V6 => addr.is_ipv6(),
            Family::V4 => addr.is_ipv4(),
            Family::Unspecified => true,
        }
    }
}

/// Decorates an inner [`Transport`] with address-family fallback for
/// hosts ending in a configured mesh domain suffix (e.g.
/// `.railway.internal`). Non-mesh hosts pass straight through.
pub struct MeshAwareTransport<T: Transport> {
    inner: T,
    mesh_domain_suffix: String,
}

impl<T: Transport> MeshAwareTransport<T> {
    pub fn new(inner: T, mesh_domain_suffix: String) -> Self {
        Self {
            inner,
            mesh_domain_suffix,
        }
    }

    fn is_mesh_host(&self, host: &str) -> bool {
        !self.mesh_domain_suffix.is_empty() && host.ends_with(&self.mesh_domain_suffix)
    }
}

#[async_trait::async_trait]
impl<T: Transport> Transport for MeshAwareTransport<T> {
    async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError> {
        let host = url_host(url);

        if !self.is_mesh_host(&host) {
            return self
                .inner
                .request(method, url, headers, body, timeout, cancel)
                .await;
        }

        mesh_request(&host, method, url, headers, body, timeout, cancel).await
    }
}

async fn mesh_request(
    host: &str,
    method: Method,
    url: &str,
    headers: &[(String, String)],
    body: Vec<u8>,
    timeout: Duration,
    cancel: CancellationToken,
) -> Result<TransportResponse, TransportError> {
    let port = url
        .parse::<reqwest::Url>()
        .ok()
        .and_then(|u| u.port_or_known_default())
        .unwrap_or(443);

    for family in [Family::V6, Family::V4, Family::Unspecified] {
        if let Some(addr) = resolve_one(host, port, family).await {
            let client = reqwest::Client::builder()
                .resolve(host, addr)
                .build()
                .map_err(|e| TransportError::Connect {
                    host: host.to_string(),
                    message: e.to_string(),
                })?;
            return execute(
                &client,
                method,
                url,
                headers,
                body,
                timeout,
                cancel,
            )
            .await;
        }
    }

    let diagnostic = diagnose(host, port).await;
    tracing::warn!(host = %host, diagnostic = %diagnostic, "mesh DNS resolution exhausted all address families");
    Err(TransportError::Dns {
        host: host.to_string(),
        diagnostic,
    })
}

async fn resolve_one(host: &str, port: u16, family: Family) -> Option<SocketAddr> {
    let addrs = tokio::net::lookup_host((host, port)).await.ok()?;
    addrs.into_iter().find(|a| family.matches(&a.ip()))
}

async fn diagnose(host: &str, port: u16) -> String {
    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, port))
        .await
        .map(|it| it.map(|a| a.ip()).collect())
        .unwrap_or_default();

    let v4 = if addrs.iter().any(IpAddr::is_ipv4) {
        "found"
    } else {
        "not-found"
    };
    let v6 = if addrs.iter().any(IpAddr::is_ipv6) {
        "found"
    } else {
        "not-found"
    };
    let default = if addrs.is_empty() {
        "not-found"
    } else {
        "found"
    };

    format!("ipv4={v4} ipv6={v6} default={default}")
}

fn url_host(url: &str) -> String {
    url.parse::<reqwest::Url>()
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
