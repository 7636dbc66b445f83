use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{HeaderMap, HeaderValue, StatusCode, header::SET_COOKIE},
};
use customk9_gateway::{
    Error, Result,
    erp::{ErpTransport, RawRequest, RpcRequest, UpstreamResponse},
};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// One outbound call seen by [`MockErpTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub envelope: Option<RpcRequest>,
    pub session_id: Option<String>,
}

/// Mock ERP transport for testing
#[derive(Debug)]
pub struct MockErpTransport {
    pub responses: Arc<Mutex<Vec<UpstreamResponse>>>,
    pub calls: Arc<Mutex<Vec<RecordedCall>>>,
    pub error: Option<String>,
}

impl MockErpTransport {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            error: None,
        }
    }

    pub fn with_json(self, status: StatusCode, body: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(json_response(status, body, &[]));
        self
    }

    pub fn with_response(self, response: UpstreamResponse) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    /// Every call fails as if the ERP could not be reached.
    pub fn unreachable(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn get_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn next_response(&self) -> Result<UpstreamResponse> {
        if let Some(ref error) = self.error {
            return Err(Error::UpstreamUnreachable(error.clone()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(Error::internal("No more mock responses available"));
        }
        Ok(responses.remove(0))
    }
}

impl Default for MockErpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ErpTransport for MockErpTransport {
    async fn call(
        &self,
        path: &str,
        envelope: &RpcRequest,
        session_id: Option<&str>,
    ) -> Result<UpstreamResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            path: path.to_string(),
            envelope: Some(envelope.clone()),
            session_id: session_id.map(str::to_string),
        });
        self.next_response()
    }

    async fn forward(&self, request: RawRequest) -> Result<UpstreamResponse> {
        self.calls.lock().unwrap().push(RecordedCall {
            path: request.path_and_query,
            envelope: None,
            session_id: None,
        });
        self.next_response()
    }
}

/// Builds an ERP reply with a JSON body and optional `Set-Cookie` headers.
pub fn json_response(status: StatusCode, body: Value, cookies: &[&str]) -> UpstreamResponse {
    let mut headers = HeaderMap::new();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    for cookie in cookies {
        headers.append(SET_COOKIE, HeaderValue::from_str(cookie).unwrap());
    }
    UpstreamResponse {
        status,
        headers,
        body: Bytes::from(body.to_string()),
    }
}
