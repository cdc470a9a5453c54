use std::path::PathBuf;
use std::time::Duration;

/// Typed server configuration. The CLI surface only honors the data directory positional
/// argument; the remaining fields are compiled-in defaults.
pub struct Config {
    pub data_dir: PathBuf,
    pub data_port: u16,
    pub control_port: u16,
    pub flush_interval: Duration,
    pub request_buf_size: usize,
    pub segment_buf_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("./data"),
            data_port: 9090,
            control_port: 9091,
            flush_interval: Duration::from_millis(100),
            request_buf_size: 4 * 1024,
            segment_buf_size: 4 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Parses the CLI surface: a single optional positional argument, the data directory.
    pub fn from_args() -> Self {
        let matches = clap::Command::new("brokerd")
            .version("0.1.0")
            .author("SleepingPills <tom.farnbauer@gmail.com>")
            .about("Ingest-path message broker server")
            .arg(
                clap::Arg::new("DATA_DIR")
                    .help("Directory records are stored under")
                    .required(false),
            )
            .get_matches();

        let mut config = Config::default();
        if let Some(dir) = matches.get_one::<String>("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config
    }
}
