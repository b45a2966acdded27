use std::iter::FusedIterator;

use crate::error::Result;
use crate::models::{DataRecord, QCRecord};

/// Attaches QC flags to data records with the same timestamp.
///
/// Both inputs must be ordered newest first. Each side is pulled one record
/// at a time: a data record newer than the pending QC record passes through
/// without flags, and a QC record newer than the pending data record has no
/// match and is dropped. Leftover QC records are never read.
///
/// An error from either side is yielded and ends the merge.
pub struct QcMerge<D, Q> {
    data: D,
    qc: Q,
    pending_data: Option<DataRecord>,
    pending_qc: Option<QCRecord>,
    qc_exhausted: bool,
    done: bool,
}

impl<D, Q> QcMerge<D, Q>
where
    D: Iterator<Item = Result<DataRecord>>,
    Q: Iterator<Item = Result<QCRecord>>,
{
    pub fn new(data: D, qc: Q) -> Self {
        Self {
            data,
            qc,
            pending_data: None,
            pending_qc: None,
            qc_exhausted: false,
            done: false,
        }
    }

    fn step(&mut self) -> Result<Option<DataRecord>> {
        loop {
            let data = match self.pending_data.take() {
                Some(record) => record,
                None => match self.data.next().transpose()? {
                    Some(record) => record,
                    None => return Ok(None),
                },
            };

            if self.pending_qc.is_none() && !self.qc_exhausted {
                self.pending_qc = self.qc.next().transpose()?;
                self.qc_exhausted = self.pending_qc.is_none();
            }

            let Some(qc) = self.pending_qc.take() else {
                return Ok(Some(data));
            };

            if data.timestamp == qc.timestamp {
                return Ok(Some(DataRecord {
                    qc_flags: Some(qc.qc_flags),
                    ..data
                }));
            }

            if data.timestamp > qc.timestamp {
                self.pending_qc = Some(qc);
                return Ok(Some(data));
            }

            // QC record newer than any remaining data record.
            self.pending_data = Some(data);
        }
    }
}

impl<D, Q> Iterator for QcMerge<D, Q>
where
    D: Iterator<Item = Result<DataRecord>>,
    Q: Iterator<Item = Result<QCRecord>>,
{
    type Item = Result<DataRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.step() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<D, Q> FusedIterator for QcMerge<D, Q>
where
    D: Iterator<Item = Result<DataRecord>>,
    Q: Iterator<Item = Result<QCRecord>>,
{
}
