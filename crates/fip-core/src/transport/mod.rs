//! Mesh-aware HTTP transport.
//!
//! A `Transport` trait with a `reqwest`-backed default implementation,
//! plus a mesh-aware decorator that layers address-family fallback and
//! a single-shot DNS diagnostic on top for hosts that live behind a
//! private service mesh.

mod mesh;
mod reqwest_transport;

pub use mesh::MeshAwareTransport;
pub use reqwest_transport::ReqwestTransport;

use crate::error::TransportError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// HTTP method used by a transport request. The LLM client only ever
/// issues `POST`/`GET`, so the set is kept small rather than reusing
/// `http::Method` for one more dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A transport-level HTTP response: status code plus raw body bytes.
/// Callers deserialize the body themselves.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub bytes: Vec<u8>,
    /// Lowercased header name -> value, for the handful of headers
    /// (`retry-after`) the LLM client needs to read.
    pub headers: Vec<(String, String)>,
}

impl TransportResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Abstraction over "perform one HTTP request with a deadline and a
/// cancellation signal", implemented either directly over `reqwest` or
/// via the mesh-aware address-family fallback path.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: Method,
        url: &str,
        headers: &[(String, String)],
        body: Vec<u8>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<TransportResponse, TransportError>;
}

/// Construct the default transport for a given mesh domain suffix: a
/// plain `reqwest`-backed transport, wrapped in the mesh-aware decorator
/// so hosts matching `mesh_domain_suffix` get address-family fallback
/// and hosts that don't pass straight through.
pub fn default_transport(mesh_domain_suffix: impl Into<String>) -> MeshAwareTransport<ReqwestTransport> {
    MeshAwareTransport::new(ReqwestTransport::new(), mesh_domain_suffix.into())
}
