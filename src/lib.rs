//! A Rust client for the Groundwork environmental monitoring API.
//!
//! The client exchanges a long-lived refresh token for short-lived, scoped
//! access tokens, then pages through stations, data files, records and QC
//! flags. Every listing is a lazy iterator of `Result<T>`: pages are fetched
//! as the iterator is consumed, and dropping it stops the traversal.
//!
//! ## Quick start
//! - Configure the refresh token with `GROUNDWORK_TOKEN_PATH`, or with
//!   `GROUNDWORK_SUBJECT` and `GROUNDWORK_TOKEN`.
//! - Optionally point `GROUNDWORK_API_URL` at another deployment.
//!
//! ```no_run
//! use grndwork_api_client::{Client, GetDataRecordsQuery, RecordOptions};
//!
//! fn main() -> grndwork_api_client::Result<()> {
//!     let client = Client::from_env()?;
//!
//!     let query = GetDataRecordsQuery::new("Station_OneMin.dat").with_limit(10);
//!     for record in client.get_data_records(&query, RecordOptions::default())? {
//!         let record = record?;
//!         println!("{} {:?}", record.timestamp, record.qc_flags);
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

mod access_tokens;
mod client;
mod config;
mod content_range;
mod download;
mod error;
mod merge;
mod models;
mod pagination;
mod records;
mod request;
#[cfg(test)]
mod testing;
mod transport;
mod util;

pub use access_tokens::{AccessTokenCache, has_expired};
pub use client::{
    Client, DEFAULT_PAGE_SIZE, DEFAULT_RECORD_PAGE_SIZE, DataFileWithRecords, DataFilesWithRecords,
    DataOptions, DataRecords, LOGGERNET_PLATFORM, RecordOptions, TRACE_PLATFORM,
};
pub use config::{
    ClientConfig, ClientOptions, DEFAULT_API_URL, Endpoints, load_config, load_config_with,
};
pub use content_range::ContentRange;
pub use download::{DownloadOptions, download_file};
pub use error::{Error, ErrorMessage, Result};
pub use merge::QcMerge;
pub use models::{
    DataFile, DataFileHeaders, DataRecord, DataValue, GetDataFilesQuery, GetDataQCQuery,
    GetDataQuery, GetDataRecordsQuery, GetStationsQuery, PostDataFile, PostDataPayload,
    PostDataRecord, ProjectManager, QCRecord, QCValue, RefreshToken, Station, StationDataFile,
    Timestamped,
};
pub use pagination::Paginated;
pub use records::{
    DataRecordWindow, DataRecordsSource, QcRecords, QcRecordsSource, RecordWindow, WindowSource,
};
pub use request::{ResponseMeta, make_request};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};

/// Builds a client from the environment for `platform` (loggernet by default).
pub fn create_client(platform: Option<&str>, options: Option<ClientOptions>) -> Result<Client> {
    let cfg = load_config()?;
    Ok(Client::new(
        cfg.refresh_token,
        platform.unwrap_or(LOGGERNET_PLATFORM),
        options.unwrap_or_default(),
    )?
    .with_endpoints(cfg.endpoints))
}
