use std::fmt;
use std::iter::FusedIterator;

use serde_json::Value;

use crate::access_tokens::AccessTokenCache;
use crate::config::{ClientOptions, Endpoints, load_config};
use crate::error::Result;
use crate::merge::QcMerge;
use crate::models::{
    DataFile, DataRecord, GetDataFilesQuery, GetDataQCQuery, GetDataQuery, GetDataRecordsQuery,
    GetStationsQuery, PostDataPayload, RefreshToken, Station, query_pairs,
};
use crate::pagination::Paginated;
use crate::records::{DataRecordWindow, DataRecordsSource, QcRecords, QcRecordsSource, RecordWindow};
use crate::request::make_request;
use crate::transport::{HttpRequest, ReqwestTransport, Transport};

pub const LOGGERNET_PLATFORM: &str = "loggernet";
pub const TRACE_PLATFORM: &str = "trace";

const READ_STATIONS: &str = "read:stations";
const READ_DATA: &str = "read:data";
const READ_QC: &str = "read:qc";
const WRITE_DATA: &str = "write:data";

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const DEFAULT_RECORD_PAGE_SIZE: u64 = 1500;

/// Options for [`Client::get_data_records`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOptions {
    /// Merge QC flags into the records. Defaults to `true`.
    pub include_qc_flags: bool,
    pub page_size: u64,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            include_qc_flags: true,
            page_size: DEFAULT_RECORD_PAGE_SIZE,
        }
    }
}

impl RecordOptions {
    pub fn with_qc_flags(mut self, include: bool) -> Self {
        self.include_qc_flags = include;
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Options for [`Client::get_data_with_records`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataOptions {
    pub include_qc_flags: bool,
    pub file_page_size: u64,
    pub record_page_size: u64,
}

impl Default for DataOptions {
    fn default() -> Self {
        Self {
            include_qc_flags: true,
            file_page_size: DEFAULT_PAGE_SIZE,
            record_page_size: DEFAULT_RECORD_PAGE_SIZE,
        }
    }
}

/// Client for the Groundwork API.
///
/// Access tokens are exchanged on demand, one per scope, and cached for the
/// lifetime of the client.
pub struct Client {
    refresh_token: RefreshToken,
    platform: String,
    endpoints: Endpoints,
    transport: Box<dyn Transport>,
    tokens: AccessTokenCache,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("refresh_token", &self.refresh_token)
            .field("platform", &self.platform)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client from `GROUNDWORK_*` environment variables on the
    /// loggernet platform.
    pub fn from_env() -> Result<Self> {
        let cfg = load_config()?;
        Ok(Self::new(cfg.refresh_token, LOGGERNET_PLATFORM, ClientOptions::default())?
            .with_endpoints(cfg.endpoints))
    }

    pub fn new(
        refresh_token: RefreshToken,
        platform: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self> {
        let transport = ReqwestTransport::new(&options)?;
        Ok(Self::with_transport(refresh_token, platform, transport))
    }

    /// Creates a client that sends every request through `transport`.
    pub fn with_transport<T>(
        refresh_token: RefreshToken,
        platform: impl Into<String>,
        transport: T,
    ) -> Self
    where
        T: Transport + 'static,
    {
        Self {
            refresh_token,
            platform: platform.into(),
            endpoints: Endpoints::default(),
            transport: Box::new(transport),
            tokens: AccessTokenCache::new(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn access_tokens(&self) -> &AccessTokenCache {
        &self.tokens
    }

    fn access_token(&self, scope: &str) -> Result<String> {
        self.tokens.get(
            self.transport.as_ref(),
            &self.endpoints.tokens,
            &self.refresh_token,
            &self.platform,
            scope,
        )
    }

    /// Stations with their data files, paged `page_size` at a time (default 100).
    pub fn get_stations(
        &self,
        query: &GetStationsQuery,
        page_size: Option<u64>,
    ) -> Result<Paginated<'_, Station>> {
        let token = self.access_token(READ_STATIONS)?;

        Ok(
            Paginated::new(
                self.transport.as_ref(),
                self.endpoints.stations.as_str(),
                page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            )
            .with_token(token)
            .with_filters(query_pairs(query)?)
            .with_limit(query.limit)
            .with_offset(query.offset),
        )
    }

    /// Data files without records, paged `page_size` at a time (default 100).
    pub fn get_data_files(
        &self,
        query: &GetDataFilesQuery,
        page_size: Option<u64>,
    ) -> Result<Paginated<'_, DataFile>> {
        let token = self.access_token(READ_DATA)?;

        let mut filters = query_pairs(query)?;
        filters.push(("records_limit".to_string(), "0".to_string()));

        Ok(
            Paginated::new(
                self.transport.as_ref(),
                self.endpoints.data.as_str(),
                page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            )
            .with_token(token)
            .with_filters(filters)
            .with_limit(query.limit)
            .with_offset(query.offset),
        )
    }

    /// Records of one data file, newest first, optionally with QC flags.
    pub fn get_data_records(
        &self,
        query: &GetDataRecordsQuery,
        options: RecordOptions,
    ) -> Result<DataRecords<'_>> {
        let records = self.data_record_window(query, options.page_size)?;

        let inner = if options.include_qc_flags {
            let qc = self.get_data_qc(query, Some(options.page_size))?;
            DataRecordsInner::WithQc(QcMerge::new(records, qc))
        } else {
            DataRecordsInner::Plain(records)
        };

        Ok(DataRecords { inner })
    }

    /// QC flags of one data file, newest first (default page size 1500).
    pub fn get_data_qc(
        &self,
        query: &GetDataQCQuery,
        page_size: Option<u64>,
    ) -> Result<QcRecords<'_>> {
        let token = self.access_token(READ_QC)?;
        let source = QcRecordsSource::new(
            self.transport.as_ref(),
            self.endpoints.qc.as_str(),
            token,
            query,
        );

        Ok(RecordWindow::new(
            source,
            query,
            page_size.unwrap_or(DEFAULT_RECORD_PAGE_SIZE),
        ))
    }

    /// Data files, each paired with a lazily fetched stream of its records.
    ///
    /// The query's `records_*` fields set the window applied to every file.
    pub fn get_data_with_records(
        &self,
        query: &GetDataQuery,
        options: DataOptions,
    ) -> Result<DataFilesWithRecords<'_>> {
        let files = self.get_data_files(&query.files, Some(options.file_page_size))?;

        Ok(DataFilesWithRecords {
            client: self,
            files,
            query: query.clone(),
            options: RecordOptions {
                include_qc_flags: options.include_qc_flags,
                page_size: options.record_page_size,
            },
        })
    }

    /// Uploads data files and records.
    pub fn post_data(&self, payload: &PostDataPayload) -> Result<()> {
        let token = self.access_token(WRITE_DATA)?;
        let request = HttpRequest::post(self.endpoints.data.as_str(), serde_json::to_value(payload)?)
            .with_token(token);

        let _: (Value, _) = make_request(self.transport.as_ref(), &request)?;
        Ok(())
    }

    fn data_record_window(
        &self,
        query: &GetDataRecordsQuery,
        page_size: u64,
    ) -> Result<DataRecordWindow<'_>> {
        let token = self.access_token(READ_DATA)?;
        let source = DataRecordsSource::new(
            self.transport.as_ref(),
            self.endpoints.data.as_str(),
            token,
            query,
        );

        Ok(RecordWindow::new(source, query, page_size))
    }
}

/// Stream of data records returned by [`Client::get_data_records`].
pub struct DataRecords<'a> {
    inner: DataRecordsInner<'a>,
}

enum DataRecordsInner<'a> {
    Plain(DataRecordWindow<'a>),
    WithQc(QcMerge<DataRecordWindow<'a>, QcRecords<'a>>),
}

impl Iterator for DataRecords<'_> {
    type Item = Result<DataRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            DataRecordsInner::Plain(records) => records.next(),
            DataRecordsInner::WithQc(records) => records.next(),
        }
    }
}

impl FusedIterator for DataRecords<'_> {}

/// A data file and the stream of its records.
pub struct DataFileWithRecords<'a> {
    pub file: DataFile,
    pub records: DataRecords<'a>,
}

impl fmt::Debug for DataFileWithRecords<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFileWithRecords")
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

/// Stream of files returned by [`Client::get_data_with_records`].
pub struct DataFilesWithRecords<'a> {
    client: &'a Client,
    files: Paginated<'a, DataFile>,
    query: GetDataQuery,
    options: RecordOptions,
}

impl<'a> Iterator for DataFilesWithRecords<'a> {
    type Item = Result<DataFileWithRecords<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let file = match self.files.next()? {
            Ok(file) => file,
            Err(err) => return Some(Err(err)),
        };

        let records_query = GetDataRecordsQuery {
            filename: file.filename.clone(),
            limit: self.query.records_limit,
            before: self.query.records_before.clone(),
            after: self.query.records_after.clone(),
        };

        Some(
            self.client
                .get_data_records(&records_query, self.options)
                .map(|records| DataFileWithRecords { file, records }),
        )
    }
}
