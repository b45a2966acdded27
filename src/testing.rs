//! Test doubles shared by the unit tests.

use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};

use crate::error::Result;
use crate::transport::{HttpRequest, HttpResponse, Transport};

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync;

/// Transport answering from a closure and recording every request it sees.
#[derive(Clone)]
pub(crate) struct ScriptedTransport {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub(crate) fn new<F>(handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn requests_to(&self, url: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url == url)
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        (self.handler)(request)
    }
}

pub(crate) fn json_response(status: u16, value: Value) -> HttpResponse {
    HttpResponse::new(status, value.to_string()).with_header("content-type", "application/json")
}

/// Unsigned JWT-shaped token; `exp` is milliseconds since the epoch.
pub(crate) fn access_token(exp: Option<i64>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = match exp {
        Some(exp) => json!({"sub": "uuid", "exp": exp}),
        None => json!({"sub": "uuid"}),
    };
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

pub(crate) fn now_ms() -> i64 {
    crate::access_tokens::now_millis()
}

pub(crate) fn query_u64(request: &HttpRequest, name: &str) -> Option<u64> {
    request.query_param(name).and_then(|v| v.parse().ok())
}

/// Serves `[{"id": n}]` items from a collection of `total`, honouring
/// `limit`/`offset` and answering with a `Content-Range` header.
pub(crate) fn paged_items(request: &HttpRequest, total: u64) -> HttpResponse {
    let limit = query_u64(request, "limit").unwrap_or(100);
    let offset = query_u64(request, "offset").unwrap_or(0);

    let first = offset + 1;
    let last = (offset + limit).min(total);
    let items: Vec<Value> = (first..=last).map(|id| json!({"id": id})).collect();

    json_response(200, Value::Array(items))
        .with_header("content-range", format!("items {first}-{last}/{total}"))
}
