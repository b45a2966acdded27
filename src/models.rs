use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Scalar cell value in a data record (`number | string | bool | null`).
pub type DataValue = Value;
/// Scalar quality-control flag value.
pub type QCValue = Value;

/// Long-lived credential exchanged for scoped access tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub subject: String,
    pub token: String,
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshToken")
            .field("subject", &self.subject)
            .field("token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccessTokenResponse {
    pub(crate) token: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AccessTokenRequest<'a> {
    pub(crate) subject: &'a str,
    pub(crate) platform: &'a str,
    pub(crate) scope: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    pub timestamp: String,
    pub record_num: u64,
    #[serde(default)]
    pub data: Map<String, DataValue>,
    /// Attached by the QC merge; absent when no flags matched this timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qc_flags: Option<Map<String, QCValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QCRecord {
    pub timestamp: String,
    #[serde(default)]
    pub qc_flags: Map<String, QCValue>,
}

/// Anything ordered by a record timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> &str;
}

impl Timestamped for DataRecord {
    fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

impl Timestamped for QCRecord {
    fn timestamp(&self) -> &str {
        &self.timestamp
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFileHeaders {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub units: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFile {
    pub source: String,
    #[serde(default)]
    pub source_start_timestamp: Option<String>,
    #[serde(default)]
    pub source_end_timestamp: Option<String>,
    pub filename: String,
    #[serde(default)]
    pub is_stale: bool,
    #[serde(default)]
    pub headers: DataFileHeaders,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// File envelope returned by the windowed records request.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DataFileRecordsEnvelope {
    #[serde(default)]
    pub(crate) records: Option<Vec<DataRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManager {
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationDataFile {
    pub filename: String,
    #[serde(default)]
    pub is_stale: bool,
    #[serde(default)]
    pub headers: DataFileHeaders,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

/// A monitoring station. Only the identifying fields are typed; the rest of
/// the station record is kept as-is in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub station_uuid: String,
    #[serde(default)]
    pub station_full_name: String,
    #[serde(default)]
    pub client_uuid: String,
    #[serde(default)]
    pub site_uuid: String,
    #[serde(default)]
    pub project_manager: Option<ProjectManager>,
    #[serde(default)]
    pub data_file_prefix: String,
    #[serde(default)]
    pub data_files: Vec<StationDataFile>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GetStationsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    /// Total number of stations to return; unbounded when unset.
    #[serde(skip)]
    pub limit: Option<u64>,
    /// Number of matching stations to skip.
    #[serde(skip)]
    pub offset: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GetDataFilesQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip)]
    pub limit: Option<u64>,
    #[serde(skip)]
    pub offset: Option<u64>,
}

/// File query plus the per-file record window used by
/// [`Client::get_data_with_records`](crate::Client::get_data_with_records).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetDataQuery {
    pub files: GetDataFilesQuery,
    pub records_limit: Option<u64>,
    pub records_before: Option<String>,
    pub records_after: Option<String>,
}

/// Time window over a single file's records.
///
/// Without a `limit`, and unless both `before` and `after` are given, only
/// the latest record is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDataRecordsQuery {
    pub filename: String,
    pub limit: Option<u64>,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl GetDataRecordsQuery {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            limit: None,
            before: None,
            after: None,
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_before(mut self, before: impl Into<String>) -> Self {
        self.before = Some(before.into());
        self
    }

    pub fn with_after(mut self, after: impl Into<String>) -> Self {
        self.after = Some(after.into());
        self
    }
}

pub type GetDataQCQuery = GetDataRecordsQuery;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDataRecord {
    pub timestamp: String,
    pub record_num: u64,
    pub data: Map<String, DataValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDataFile {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<DataFileHeaders>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<PostDataRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDataPayload {
    pub source: String,
    pub files: Vec<PostDataFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
}

/// Flattens a serializable query struct into string query parameters.
///
/// Nulls are dropped; strings are passed through unquoted.
pub(crate) fn query_pairs<T: Serialize>(query: &T) -> Result<Vec<(String, String)>> {
    let value = serde_json::to_value(query)?;
    let mut pairs = Vec::new();

    if let Value::Object(map) = value {
        for (key, value) in map {
            match value {
                Value::Null => {}
                Value::String(s) => pairs.push((key, s)),
                other => pairs.push((key, other.to_string())),
            }
        }
    }

    Ok(pairs)
}
