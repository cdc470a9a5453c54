use crate::error::{StorageError, StorageResult};
use crate::pool::BufferPool;
use crate::record_id::RecordId;
use crate::segment::SegmentWriter;
use slog::Logger;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const SEGMENT_SUFFIX: &str = ".log";

/// Largest `N` such that `NNNNNNNNNNNNNNNNNNNN.log` exists in `dir`, else `0`. Skips
/// sub-directories and names that do not parse.
fn latest_segment_number(dir: &Path) -> io::Result<u64> {
    let mut latest = 0u64;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }

        let name = entry.file_name();
        let name = match name.to_str() {
            Some(name) => name,
            None => continue,
        };

        let Some(base) = name.strip_suffix(SEGMENT_SUFFIX) else {
            continue;
        };

        if let Ok(number) = base.parse::<u64>() {
            latest = latest.max(number);
        }
    }

    Ok(latest)
}

struct Inner {
    segment_number: u64,
    segment: SegmentWriter,
    sequence: u64,
}

/// Owns the current segment for one stream, rotating to the next when it fills and producing
/// gap-free, strictly increasing record ids.
pub struct StreamWriter {
    dir: PathBuf,
    name: String,
    pool: Arc<BufferPool>,
    inner: Mutex<Inner>,
    log: Logger,
}

impl StreamWriter {
    pub fn open(data_dir: &Path, name: &str, pool: Arc<BufferPool>, log: Logger) -> StorageResult<Self> {
        let dir = data_dir.join(name);
        fs::create_dir_all(&dir)?;

        let segment_number = latest_segment_number(&dir)?;
        let segment = SegmentWriter::open(&dir, segment_number, pool.get())?;

        Ok(StreamWriter {
            dir,
            name: name.to_string(),
            pool,
            inner: Mutex::new(Inner {
                segment_number,
                segment,
                sequence: 0,
            }),
            log,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends `data`, rolling over to a fresh segment exactly once if the current one is full.
    pub fn write(&self, data: &[u8]) -> StorageResult<RecordId> {
        let mut inner = self.inner.lock().expect("stream writer mutex poisoned");
        inner.sequence += 1;

        let (_, ok) = inner.segment.write(data);
        if ok {
            return Ok(RecordId::new(inner.segment_number, inner.sequence));
        }

        self.rollover(&mut inner)?;

        let (_, ok) = inner.segment.write(data);
        if !ok {
            return Err(StorageError::MessageTooLarge);
        }

        Ok(RecordId::new(inner.segment_number, inner.sequence))
    }

    fn rollover(&self, inner: &mut Inner) -> StorageResult<()> {
        let next_number = inner.segment_number + 1;
        let next_segment = SegmentWriter::open(&self.dir, next_number, self.pool.get());

        let next_segment = match next_segment {
            Ok(segment) => segment,
            Err(StorageError::Io(err)) => {
                return Err(StorageError::Rollover {
                    open: Some(err),
                    close: None,
                })
            }
            Err(other) => return Err(other),
        };

        let old_segment = std::mem::replace(&mut inner.segment, next_segment);
        inner.segment_number = next_number;

        if let Err(close_err) = old_segment.close() {
            let close_io = match close_err {
                StorageError::Io(err) => Some(err),
                StorageError::Flush { flush, fsync } => flush.or(fsync),
                _ => None,
            };
            return Err(StorageError::Rollover {
                open: None,
                close: close_io,
            });
        }

        slog::debug!(self.log, "segment rollover";
            "stream" => &self.name, "segment" => next_number);

        Ok(())
    }

    /// Flushes the current segment. Errors are the caller's to log; they do not poison the
    /// writer.
    pub fn flush(&self) -> StorageResult<usize> {
        let mut inner = self.inner.lock().expect("stream writer mutex poisoned");
        inner.segment.flush()
    }
}
