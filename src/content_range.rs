use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Pagination cursor carried in the `Content-Range` response header,
/// e.g. `items 6-25/65`.
///
/// `first` and `last` are 1-indexed positions of the page's items within
/// the `count` items matching the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRange {
    pub first: u64,
    pub last: u64,
    pub count: u64,
    pub unit: String,
}

impl ContentRange {
    /// Parses an optional header value.
    ///
    /// An absent or blank header is [`Error::MissingRange`]; anything that is
    /// not `{unit} {first}-{last}/{count}` is [`Error::Format`].
    pub fn parse(header: Option<&str>) -> Result<Self> {
        match header.map(str::trim) {
            None | Some("") => Err(Error::MissingRange),
            Some(value) => value.parse(),
        }
    }

    /// True when this page ends at the last matching item.
    pub fn is_last_page(&self) -> bool {
        self.last >= self.count
    }
}

impl FromStr for ContentRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::Format("Could not parse content range".to_string());

        let (unit, range) = s.trim().split_once(' ').ok_or_else(malformed)?;
        if unit.is_empty() || !unit.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(malformed());
        }

        let (span, count) = range.split_once('/').ok_or_else(malformed)?;
        let (first, last) = span.split_once('-').ok_or_else(malformed)?;

        Ok(Self {
            first: parse_position(first).ok_or_else(malformed)?,
            last: parse_position(last).ok_or_else(malformed)?,
            count: parse_position(count).ok_or_else(malformed)?,
            unit: unit.to_string(),
        })
    }
}

fn parse_position(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}-{}/{}", self.unit, self.first, self.last, self.count)
    }
}
