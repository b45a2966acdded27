use std::iter::FusedIterator;

use crate::error::Result;
use crate::models::{DataFileRecordsEnvelope, DataRecord, GetDataRecordsQuery, QCRecord, Timestamped};
use crate::request::make_request;
use crate::transport::{HttpRequest, Transport};

/// One request against a timestamp-windowed endpoint.
///
/// Implementations return records newest first, at most `limit` of them,
/// whose timestamps are `<= before` when a bound is given. The caller's
/// `after` bound is fixed for the whole traversal and held by the source.
pub trait WindowSource {
    type Item: Timestamped;

    fn fetch(&self, limit: u64, before: Option<&str>) -> Result<Vec<Self::Item>>;
}

/// Walks back through a file's records one window at a time.
///
/// The server's `before` bound is inclusive, so each window after the first
/// starts with the record the previous one ended on; that record is dropped
/// and the request asks for one extra record to make up for it. A window
/// shorter than requested means the records are exhausted.
///
/// Without a limit, and unless both `before` and `after` are given, only the
/// most recent record is fetched.
///
/// The page size is at least 2 so a follow-up window always has room for the
/// repeated boundary record plus one new record.
pub struct RecordWindow<S: WindowSource> {
    source: S,
    before: Option<String>,
    remaining: Option<u64>,
    request_size: u64,
    page_size: u64,
    last_timestamp: Option<String>,
    page: std::vec::IntoIter<S::Item>,
    done: bool,
}

impl<S: WindowSource> RecordWindow<S> {
    pub fn new(source: S, query: &GetDataRecordsQuery, page_size: u64) -> Self {
        let page_size = page_size.max(2);

        let mut remaining = query.limit.filter(|l| *l > 0);
        if remaining.is_none() && !(query.before.is_some() && query.after.is_some()) {
            remaining = Some(1);
        }

        Self {
            source,
            before: query.before.clone(),
            remaining,
            request_size: remaining.map_or(page_size, |r| r.min(page_size)),
            page_size,
            last_timestamp: None,
            page: Vec::new().into_iter(),
            done: false,
        }
    }

    fn fetch_window(&mut self) -> Result<Vec<S::Item>> {
        let before = self.last_timestamp.as_deref().or(self.before.as_deref());

        tracing::debug!(
            limit = self.request_size,
            before = before.unwrap_or(""),
            "fetching record window"
        );

        let mut records = self.source.fetch(self.request_size, before)?;
        let returned = records.len() as u64;

        if records.is_empty() {
            self.done = true;
            return Ok(records);
        }

        if let Some(last) = &self.last_timestamp {
            if records[0].timestamp() == last {
                records.remove(0);
            }
        }

        if let Some(remaining) = self.remaining.as_mut() {
            if records.len() as u64 > *remaining {
                records.truncate(*remaining as usize);
            }

            *remaining -= records.len() as u64;
            if *remaining == 0 {
                self.done = true;
                return Ok(records);
            }
        }

        match records.last() {
            Some(last) if returned == self.request_size => {
                self.request_size = self
                    .remaining
                    .map_or(self.page_size, |r| (r + 1).min(self.page_size));
                self.last_timestamp = Some(last.timestamp().to_string());
            }
            _ => self.done = true,
        }

        Ok(records)
    }
}

impl<S: WindowSource> Iterator for RecordWindow<S> {
    type Item = Result<S::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.page.next() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }

            match self.fetch_window() {
                Ok(records) => self.page = records.into_iter(),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

impl<S: WindowSource> FusedIterator for RecordWindow<S> {}

/// Records embedded in a single data file envelope from the data endpoint.
pub struct DataRecordsSource<'a> {
    transport: &'a dyn Transport,
    url: String,
    token: String,
    filename: String,
    after: Option<String>,
}

impl<'a> DataRecordsSource<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        url: impl Into<String>,
        token: impl Into<String>,
        query: &GetDataRecordsQuery,
    ) -> Self {
        Self {
            transport,
            url: url.into(),
            token: token.into(),
            filename: query.filename.clone(),
            after: query.after.clone(),
        }
    }
}

impl WindowSource for DataRecordsSource<'_> {
    type Item = DataRecord;

    fn fetch(&self, limit: u64, before: Option<&str>) -> Result<Vec<DataRecord>> {
        let mut query = vec![
            ("filename".to_string(), self.filename.clone()),
            ("limit".to_string(), "1".to_string()),
            ("records_limit".to_string(), limit.to_string()),
        ];
        if let Some(before) = before {
            query.push(("records_before".to_string(), before.to_string()));
        }
        if let Some(after) = &self.after {
            query.push(("records_after".to_string(), after.clone()));
        }

        let request = HttpRequest::get(self.url.as_str())
            .with_token(self.token.as_str())
            .with_query(query);
        let (files, _): (Vec<DataFileRecordsEnvelope>, _) = make_request(self.transport, &request)?;

        Ok(files
            .into_iter()
            .next()
            .and_then(|file| file.records)
            .unwrap_or_default())
    }
}

/// Quality-control records from the QC endpoint.
pub struct QcRecordsSource<'a> {
    transport: &'a dyn Transport,
    url: String,
    token: String,
    filename: String,
    after: Option<String>,
}

impl<'a> QcRecordsSource<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        url: impl Into<String>,
        token: impl Into<String>,
        query: &GetDataRecordsQuery,
    ) -> Self {
        Self {
            transport,
            url: url.into(),
            token: token.into(),
            filename: query.filename.clone(),
            after: query.after.clone(),
        }
    }
}

impl WindowSource for QcRecordsSource<'_> {
    type Item = QCRecord;

    fn fetch(&self, limit: u64, before: Option<&str>) -> Result<Vec<QCRecord>> {
        let mut query = vec![
            ("filename".to_string(), self.filename.clone()),
            ("limit".to_string(), limit.to_string()),
        ];
        if let Some(before) = before {
            query.push(("before".to_string(), before.to_string()));
        }
        if let Some(after) = &self.after {
            query.push(("after".to_string(), after.clone()));
        }

        let request = HttpRequest::get(self.url.as_str())
            .with_token(self.token.as_str())
            .with_query(query);
        let (records, _): (Vec<QCRecord>, _) = make_request(self.transport, &request)?;

        Ok(records)
    }
}

pub type DataRecordWindow<'a> = RecordWindow<DataRecordsSource<'a>>;
pub type QcRecords<'a> = RecordWindow<QcRecordsSource<'a>>;
