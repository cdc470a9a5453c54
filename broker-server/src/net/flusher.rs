use broker_core::StreamManager;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Runs `stream_manager.sync()` on a single coalesced timer. A slow sync delays the next tick
/// rather than queueing a backlog of flushes.
pub fn spawn(manager: Arc<StreamManager>, interval: Duration) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        let tick_start = Instant::now();
        manager.sync();

        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    })
}
