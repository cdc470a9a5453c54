use sloggers::{Config, LoggerConfig};

/// Builds the process-wide logger: structured, leveled, terminal output on stderr.
pub fn init() -> slog::Logger {
    let config: LoggerConfig = serdeconv::from_toml_str(
        r#"
type = "terminal"
level = "debug"
destination = "stderr"
"#,
    )
    .expect("built-in logging config is valid toml");

    config.build_logger().expect("failed to build logger")
}
