use crate::error::{ManagerError, StorageError};
use crate::pool::BufferPool;
use crate::record_id::RecordId;
use crate::stream::StreamWriter;
use slog::Logger;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

type OpenResult = Result<Arc<StreamWriter>, Arc<StorageError>>;
type Slot = OnceLock<OpenResult>;

/// Maps stream name to stream writer, constructing each writer at most once even under
/// concurrent first-writes to the same name.
pub struct StreamManager {
    data_dir: PathBuf,
    segment_pool: Arc<BufferPool>,
    writers: Mutex<HashMap<String, Arc<Slot>>>,
    log: Logger,
}

impl StreamManager {
    pub fn new(data_dir: PathBuf, segment_pool: Arc<BufferPool>, log: Logger) -> Self {
        StreamManager {
            data_dir,
            segment_pool,
            writers: Mutex::new(HashMap::new()),
            log,
        }
    }

    fn get_or_create(&self, stream: &str) -> OpenResult {
        let slot = {
            let mut writers = self.writers.lock().expect("stream manager mutex poisoned");
            writers
                .entry(stream.to_string())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone()
        };

        // Construction runs under the slot's own once-guard: concurrent callers for the same
        // name block here, not on the outer map lock, so writes to other streams stay
        // independent.
        slot.get_or_init(|| {
            StreamWriter::open(
                &self.data_dir,
                stream,
                self.segment_pool.clone(),
                self.log.new(slog::o!("stream" => stream.to_string())),
            )
            .map(Arc::new)
            .map_err(Arc::new)
        })
        .clone()
    }

    /// Resolves (or lazily creates) the stream's writer and appends `data` to it.
    pub fn write(&self, stream: &str, data: &[u8]) -> Result<RecordId, ManagerError> {
        let writer = self.get_or_create(stream).map_err(ManagerError::Open)?;
        writer
            .write(data)
            .map_err(|err| ManagerError::Write(Arc::new(err)))
    }

    /// Flushes every writer constructed so far. Iteration order is unspecified; a failing
    /// writer does not halt iteration.
    pub fn sync(&self) {
        let writers: Vec<Arc<StreamWriter>> = {
            let writers = self.writers.lock().expect("stream manager mutex poisoned");
            writers
                .values()
                .filter_map(|slot| slot.get().and_then(|r| r.as_ref().ok()).cloned())
                .collect()
        };

        for writer in writers {
            if let Err(err) = writer.flush() {
                slog::warn!(self.log, "flush failed";
                    "stream" => writer.name(), "error" => %err);
            }
        }
    }
}
