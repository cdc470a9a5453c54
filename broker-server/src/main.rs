use broker_core::{BufferPool, StreamManager};
use broker_server::{config::Config, logging, net};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process;
use std::sync::Arc;

fn main() {
    let log = logging::init();
    let config = Config::from_args();

    if let Err(err) = std::fs::create_dir_all(&config.data_dir) {
        slog::error!(log, "failed to create data directory"; "path" => %config.data_dir.display(), "error" => %err);
        process::exit(1);
    }

    let segment_pool = Arc::new(BufferPool::new(config.segment_buf_size));
    let request_pool = Arc::new(BufferPool::new(config.request_buf_size));
    let manager = Arc::new(StreamManager::new(
        config.data_dir.clone(),
        segment_pool,
        log.new(slog::o!("component" => "stream_manager")),
    ));

    let flusher_manager = manager.clone();
    let _flusher = net::flusher::spawn(flusher_manager, config.flush_interval);

    let data_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.data_port);
    let control_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.control_port);

    let mut engine = match net::engine::Engine::new(
        data_addr,
        control_addr,
        request_pool,
        manager,
        log.new(slog::o!("component" => "engine")),
    ) {
        Ok(engine) => engine,
        Err(err) => {
            slog::error!(log, "failed to bind listeners"; "error" => %err);
            process::exit(1);
        }
    };

    slog::info!(log, "brokerd listening";
        "data_port" => config.data_port, "control_port" => config.control_port,
        "data_dir" => %config.data_dir.display());

    if let Err(err) = engine.run() {
        slog::error!(log, "engine loop terminated"; "error" => %err);
        process::exit(1);
    }
}
