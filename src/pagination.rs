use std::iter::FusedIterator;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::content_range::ContentRange;
use crate::error::{Error, Result};
use crate::request::make_request;
use crate::transport::{HttpRequest, Transport};

/// Lazily pages through an offset-paginated collection.
///
/// Each page is requested with `limit` set to the smaller of the page size
/// and what is left of the caller's limit, and `offset` set to the number of
/// items already consumed. The response's `Content-Range` header drives the
/// cursor:
///
/// - `last == count` ends the traversal;
/// - otherwise the next request starts at `offset = last`;
/// - a header that is malformed, or missing on a non-empty page, or that does
///   not move the cursor forward fails with "Invalid content range".
///
/// An empty page without a `Content-Range` header ends the traversal.
///
/// Errors are yielded once, after which the iterator is finished.
pub struct Paginated<'a, T> {
    transport: &'a dyn Transport,
    url: String,
    token: Option<String>,
    filters: Vec<(String, String)>,
    limit: Option<u64>,
    offset: u64,
    page_size: u64,
    page: std::vec::IntoIter<T>,
    done: bool,
    _item: PhantomData<fn() -> T>,
}

impl<'a, T: DeserializeOwned> Paginated<'a, T> {
    pub fn new(transport: &'a dyn Transport, url: impl Into<String>, page_size: u64) -> Self {
        Self {
            transport,
            url: url.into(),
            token: None,
            filters: Vec::new(),
            limit: None,
            offset: 0,
            page_size: page_size.max(1),
            page: Vec::new().into_iter(),
            done: false,
            _item: PhantomData,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Query parameters sent with every page, besides `limit` and `offset`.
    pub fn with_filters(mut self, filters: Vec<(String, String)>) -> Self {
        self.filters = filters;
        self
    }

    /// Caps the total number of items. `None` or `0` means no cap.
    pub fn with_limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit.filter(|l| *l > 0);
        self
    }

    pub fn with_offset(mut self, offset: Option<u64>) -> Self {
        self.offset = offset.unwrap_or(0);
        self
    }

    fn fetch_page(&mut self) -> Result<Vec<T>> {
        let request_size = self
            .limit
            .map_or(self.page_size, |limit| limit.min(self.page_size));

        let mut query = self.filters.clone();
        query.push(("limit".to_string(), request_size.to_string()));
        query.push(("offset".to_string(), self.offset.to_string()));

        let mut request = HttpRequest::get(self.url.as_str()).with_query(query);
        request.token = self.token.clone();

        let (items, meta): (Vec<T>, _) = make_request(self.transport, &request)?;

        let range = match ContentRange::parse(meta.header("content-range")) {
            Ok(range) => range,
            Err(Error::MissingRange) if items.is_empty() => {
                self.done = true;
                return Ok(items);
            }
            Err(_) => return Err(Error::request("Invalid content range")),
        };

        tracing::debug!(
            url = %self.url,
            offset = self.offset,
            limit = request_size,
            received = items.len(),
            range = %range,
            "fetched page"
        );

        if range.is_last_page() {
            self.done = true;
            return Ok(items);
        }

        if let Some(limit) = self.limit.as_mut() {
            *limit = limit.saturating_sub(items.len() as u64);
            if *limit == 0 {
                self.done = true;
                return Ok(items);
            }
        }

        if range.last <= self.offset {
            return Err(Error::request("Invalid content range"));
        }
        self.offset = range.last;

        Ok(items)
    }
}

impl<T: DeserializeOwned> Iterator for Paginated<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.page.next() {
                return Some(Ok(item));
            }
            if self.done {
                return None;
            }

            match self.fetch_page() {
                Ok(items) => self.page = items.into_iter(),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<T: DeserializeOwned> FusedIterator for Paginated<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedTransport, json_response, paged_items, query_u64};
    use crate::transport::HttpResponse;
    use serde_json::{Value, json};

    const TEST_URL: &str = "https://api.grndwork.com/v1/test";

    fn ids(range: std::ops::RangeInclusive<u64>) -> Vec<Value> {
        range.map(|id| json!({"id": id})).collect()
    }

    fn limits_and_offsets(transport: &ScriptedTransport) -> Vec<(u64, u64)> {
        transport
            .requests()
            .iter()
            .map(|r| {
                (
                    query_u64(r, "limit").unwrap(),
                    query_u64(r, "offset").unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn makes_requests_until_last_page() {
        let transport = ScriptedTransport::new(|r| Ok(paged_items(r, 165)));

        let results: Vec<Value> = Paginated::new(&transport, TEST_URL, 100)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(results, ids(1..=165));
        assert_eq!(limits_and_offsets(&transport), vec![(100, 0), (100, 100)]);
    }

    #[test]
    fn makes_requests_with_limit() {
        let transport = ScriptedTransport::new(|r| Ok(paged_items(r, 165)));

        let results: Vec<Value> = Paginated::new(&transport, TEST_URL, 100)
            .with_limit(Some(155))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(results, ids(1..=155));
        assert_eq!(limits_and_offsets(&transport), vec![(100, 0), (55, 100)]);
    }

    #[test]
    fn makes_requests_with_offset() {
        let transport = ScriptedTransport::new(|r| Ok(paged_items(r, 165)));

        let results: Vec<Value> = Paginated::new(&transport, TEST_URL, 100)
            .with_limit(Some(155))
            .with_offset(Some(5))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(results, ids(6..=160));
        assert_eq!(limits_and_offsets(&transport), vec![(100, 5), (55, 105)]);
    }

    #[test]
    fn makes_requests_with_page_size() {
        let transport = ScriptedTransport::new(|r| Ok(paged_items(r, 165)));

        let results: Vec<Value> = Paginated::new(&transport, TEST_URL, 50)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(results, ids(1..=165));
        assert_eq!(
            limits_and_offsets(&transport),
            vec![(50, 0), (50, 50), (50, 100), (50, 150)]
        );
    }

    #[test]
    fn limit_smaller_than_page_size() {
        let transport = ScriptedTransport::new(|r| Ok(paged_items(r, 165)));

        let results: Vec<Value> = Paginated::new(&transport, TEST_URL, 100)
            .with_limit(Some(10))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(results, ids(1..=10));
        assert_eq!(limits_and_offsets(&transport), vec![(10, 0)]);
    }

    #[test]
    fn trusts_range_over_short_pages() {
        // Server hands out at most 30 items whatever the requested limit.
        let transport = ScriptedTransport::new(|r| {
            let offset = query_u64(r, "offset").unwrap();
            let last = (offset + 30).min(100);
            Ok(json_response(200, Value::Array(ids(offset + 1..=last)))
                .with_header("content-range", format!("items {}-{}/100", offset + 1, last)))
        });

        let results: Vec<Value> = Paginated::new(&transport, TEST_URL, 50)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(results, ids(1..=100));
        assert_eq!(
            limits_and_offsets(&transport),
            vec![(50, 0), (50, 30), (50, 60), (50, 90)]
        );
    }

    #[test]
    fn passes_filters_and_token() {
        let transport = ScriptedTransport::new(|r| Ok(paged_items(r, 3)));

        let results: Vec<Value> = Paginated::new(&transport, TEST_URL, 100)
            .with_token("access_token")
            .with_filters(vec![("station".to_string(), "s-1".to_string())])
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(results.len(), 3);
        let request = &transport.requests()[0];
        assert_eq!(request.query_param("station"), Some("s-1"));
        assert_eq!(request.token.as_deref(), Some("access_token"));
    }

    #[test]
    fn handles_empty_results() {
        let transport = ScriptedTransport::new(|_| Ok(json_response(200, json!([]))));

        let results: Vec<Value> = Paginated::new(&transport, TEST_URL, 100)
            .collect::<Result<_>>()
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn empty_collection_with_range() {
        let transport = ScriptedTransport::new(|_| {
            Ok(json_response(200, json!([])).with_header("content-range", "items 0-0/0"))
        });

        let results: Vec<Value> = Paginated::new(&transport, TEST_URL, 100)
            .collect::<Result<_>>()
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn raises_error_when_cursor_does_not_advance() {
        let transport = ScriptedTransport::new(|_| {
            Ok(json_response(200, Value::Array(ids(101..=165)))
                .with_header("content-range", "items 1-100/165"))
        });

        let mut pages = Paginated::<Value>::new(&transport, TEST_URL, 100)
            .with_limit(Some(100))
            .with_offset(Some(100));

        let err = pages.next().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Invalid content range");
        assert!(pages.next().is_none());
    }

    #[test]
    fn raises_error_when_range_missing_on_non_empty_page() {
        let transport =
            ScriptedTransport::new(|_| Ok(json_response(200, Value::Array(ids(1..=3)))));

        let err = Paginated::<Value>::new(&transport, TEST_URL, 100)
            .collect::<Result<Vec<_>>>()
            .unwrap_err();

        assert_eq!(err.to_string(), "Invalid content range");
    }

    #[test]
    fn raises_error_when_range_malformed() {
        let transport = ScriptedTransport::new(|_| {
            Ok(json_response(200, Value::Array(ids(1..=3))).with_header("content-range", "items a-b/c"))
        });

        let err = Paginated::<Value>::new(&transport, TEST_URL, 100)
            .collect::<Result<Vec<_>>>()
            .unwrap_err();

        assert!(matches!(err, Error::Request { .. }));
    }

    #[test]
    fn yields_earlier_pages_before_failing() {
        let transport = ScriptedTransport::new(|r| {
            if query_u64(r, "offset") == Some(0) {
                Ok(paged_items(r, 165))
            } else {
                Ok(HttpResponse::new(500, r#"{"message":"Internal error"}"#))
            }
        });

        let results: Vec<Result<Value>> = Paginated::new(&transport, TEST_URL, 100).collect();

        assert_eq!(results.len(), 101);
        assert!(results[..100].iter().all(|r| r.is_ok()));
        let err = results[100].as_ref().unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "Internal error");
    }

    #[test]
    fn is_lazy() {
        let transport = ScriptedTransport::new(|r| Ok(paged_items(r, 165)));

        let first: Vec<Value> = Paginated::new(&transport, TEST_URL, 100)
            .take(3)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(first, ids(1..=3));
        assert_eq!(transport.requests().len(), 1);
    }
}
