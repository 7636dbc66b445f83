use super::types::{RawRequest, RpcRequest, UpstreamResponse};
use crate::{
    Error, Result,
    config::{ErpConfig, SessionConfig},
};
use async_trait::async_trait;
use axum::http::{
    HeaderMap, HeaderName, HeaderValue,
    header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST},
};
use std::time::Duration;
use tracing::debug;

const X_REQUESTED_WITH: &str = "x-requested-with";

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Outbound side of the gateway. One call in, at most one request out.
#[async_trait]
pub trait ErpTransport: Send + Sync {
    /// POSTs a JSON-RPC envelope to `path`, attaching the session when known.
    async fn call(
        &self,
        path: &str,
        envelope: &RpcRequest,
        session_id: Option<&str>,
    ) -> Result<UpstreamResponse>;

    /// Sends a request verbatim.
    async fn forward(&self, request: RawRequest) -> Result<UpstreamResponse>;
}

pub struct HttpErpTransport {
    client: reqwest::Client,
    base_url: String,
    session_header: HeaderName,
    cookie_name: String,
}

impl HttpErpTransport {
    pub fn new(erp: &ErpConfig, session: &SessionConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = erp.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        let session_header = HeaderName::from_bytes(erp.session_header.as_bytes())
            .map_err(|e| Error::config(format!("Invalid erp.session_header: {}", e)))?;

        debug!("Creating ERP transport for: {}", erp.base_url);

        Ok(Self {
            client,
            base_url: erp.base_url.trim_end_matches('/').to_string(),
            session_header,
            cookie_name: session.cookie_name.clone(),
        })
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url, path_and_query)
    }

    async fn collect(response: reqwest::Response) -> Result<UpstreamResponse> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(Error::from_transport)?;
        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl ErpTransport for HttpErpTransport {
    async fn call(
        &self,
        path: &str,
        envelope: &RpcRequest,
        session_id: Option<&str>,
    ) -> Result<UpstreamResponse> {
        let url = self.url(path);
        let body = serde_json::to_vec(envelope)?;

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(X_REQUESTED_WITH, "XMLHttpRequest")
            .body(body);

        if let Some(session_id) = session_id {
            let value = HeaderValue::from_str(session_id)
                .map_err(|_| Error::bad_request("Session token contains invalid characters"))?;
            let cookie = HeaderValue::from_str(&format!("{}={}", self.cookie_name, session_id))
                .map_err(|_| Error::bad_request("Session token contains invalid characters"))?;
            request = request
                .header(self.session_header.clone(), value)
                .header(COOKIE, cookie);
        }

        debug!(
            "Calling ERP {} (session attached: {})",
            url,
            session_id.is_some()
        );

        let response = request.send().await.map_err(Error::from_transport)?;
        Self::collect(response).await
    }

    async fn forward(&self, request: RawRequest) -> Result<UpstreamResponse> {
        let url = self.url(&request.path_and_query);

        let mut headers = request.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(HOST);
        headers.remove(CONTENT_LENGTH);

        debug!("Forwarding {} {}", request.method, url);

        let mut builder = self.client.request(request.method, &url).headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder.send().await.map_err(Error::from_transport)?;
        Self::collect(response).await
    }
}

/// Removes headers that only apply to a single connection.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
