use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result, server_error};
use crate::transport::{HttpRequest, Transport};

/// Status and headers of a successful response, kept after the body is decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

impl ResponseMeta {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Performs one request and decodes its JSON payload.
///
/// A status outside 2xx becomes [`Error::Request`] carrying the server's
/// message; a body that does not decode as `T` is reported as
/// "Failed to parse response payload". An empty body decodes as `null`.
pub fn make_request<T, X>(transport: &X, request: &HttpRequest) -> Result<(T, ResponseMeta)>
where
    T: DeserializeOwned,
    X: Transport + ?Sized,
{
    let resp = transport.execute(request)?;

    if !resp.is_success() {
        let err = server_error(resp.status, &resp.body);
        tracing::debug!(
            method = request.method.as_str(),
            url = %request.url,
            status = resp.status,
            error = %err,
            "request failed"
        );
        return Err(err);
    }

    let body = if resp.body.trim().is_empty() {
        "null"
    } else {
        resp.body.as_str()
    };

    let payload = serde_json::from_str::<T>(body).map_err(|e| {
        tracing::debug!(url = %request.url, error = %e, "undecodable response payload");
        Error::Request {
            status: Some(resp.status),
            message: "Failed to parse response payload".to_string(),
            errors: Vec::new(),
        }
    })?;

    Ok((
        payload,
        ResponseMeta {
            status: resp.status,
            headers: resp.headers,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, json_response};
    use crate::transport::HttpResponse;
    use serde_json::{Value, json};

    #[test]
    fn decodes_payload_and_keeps_headers() {
        let transport = ScriptedTransport::new(|_| {
            Ok(json_response(200, json!([{"id": 1}])).with_header("Content-Range", "items 1-1/1"))
        });

        let (payload, meta): (Vec<Value>, _) =
            make_request(&transport, &HttpRequest::get("https://api/v1/test")).unwrap();

        assert_eq!(payload, vec![json!({"id": 1})]);
        assert_eq!(meta.header("content-range"), Some("items 1-1/1"));
    }

    #[test]
    fn error_status_becomes_request_error() {
        let transport = ScriptedTransport::new(|_| {
            Ok(json_response(
                400,
                json!({"message": "Bad Request", "errors": [{"field": "filename", "message": "required"}]}),
            ))
        });

        let err = make_request::<Value, _>(&transport, &HttpRequest::get("https://api/v1/data"))
            .unwrap_err();

        match err {
            Error::Request {
                status, errors, ..
            } => {
                assert_eq!(status, Some(400));
                assert_eq!(errors[0].field, "filename");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_2xx_status_is_an_error() {
        let transport = ScriptedTransport::new(|_| Ok(HttpResponse::new(304, "")));

        let err = make_request::<Value, _>(&transport, &HttpRequest::get("https://api/v1/data"))
            .unwrap_err();

        assert_eq!(err.status(), Some(304));
        assert_eq!(err.to_string(), "Not Modified");
    }

    #[test]
    fn invalid_payload() {
        let transport = ScriptedTransport::new(|_| Ok(HttpResponse::new(200, "<html>")));

        let err = make_request::<Value, _>(&transport, &HttpRequest::get("https://api/v1/data"))
            .unwrap_err();

        assert_eq!(err.to_string(), "Failed to parse response payload");
    }

    #[test]
    fn empty_body_is_null() {
        let transport = ScriptedTransport::new(|_| Ok(HttpResponse::new(201, "")));

        let (payload, meta): (Value, _) = make_request(
            &transport,
            &HttpRequest::post("https://api/v1/data", json!({})),
        )
        .unwrap();

        assert_eq!(payload, Value::Null);
        assert_eq!(meta.status, 201);
    }
}
