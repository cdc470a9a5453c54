pub mod conn_ring;
pub mod error;
pub mod manager;
pub mod pool;
pub mod record_id;
pub mod ring;
pub mod segment;
pub mod stream;
pub mod wire;

pub use error::{ManagerError, StorageError, StorageResult};
pub use manager::StreamManager;
pub use pool::BufferPool;
pub use record_id::RecordId;
pub use stream::StreamWriter;
pub use wire::{FrameParser, PublishFrame, WireError, OPCODE_PUBLISH};
