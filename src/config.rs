use clap::Parser;
use std::{net::SocketAddr, path::PathBuf};

/// Default path to the `log4rs` YAML config, relative to the working
/// directory the binary is started from.
pub const LOG4RS_CONFIG_FILE_PATH: &str = "log4rs.yaml";

/// The SOCKS5 proxy worker's configuration. Every field mirrors an
/// environment variable of the same intent and can be overridden by the
/// matching CLI flag, in the teacher's `LurkConfig` pattern.
#[derive(Parser, Debug)]
#[clap(author, about = "SOCKS5 proxy worker with per-identity traffic accounting", version)]
pub struct WorkerConfig {
    /// TCP port to listen on.
    #[clap(long, env = "SOCKS_PORT", default_value_t = 9080)]
    pub port: u16,

    /// Comma-separated `user/pass` pairs. Empty disables user/pass
    /// authentication, falling back to no-auth only.
    #[clap(long, env = "CREDENTIALS", default_value = "")]
    pub credentials: String,

    /// Base path the traffic reporter rotates around.
    #[clap(long, env = "TRAFFICS_FILE", default_value = "traffics.log")]
    pub traffics_file: PathBuf,

    /// Fallback log level used if no `log4rs` config file is found on disk.
    #[clap(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Path to the `log4rs` YAML config.
    #[clap(long, env = "LOG_FILE", default_value = LOG4RS_CONFIG_FILE_PATH)]
    pub log_file: String,
}

impl WorkerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), self.port)
    }
}

/// The collector's configuration: it reads the same traffic file the worker
/// writes and exposes it over HTTP alongside the static dashboard bundle.
#[derive(Parser, Debug)]
#[clap(author, about = "Aggregates and serves per-identity traffic history", version)]
pub struct CollectorConfig {
    /// TCP port the HTTP surface listens on.
    #[clap(long, env = "HTTP_PORT", default_value_t = 80)]
    pub http_port: u16,

    /// Base path of the traffic log; must match the worker's `TRAFFICS_FILE`.
    #[clap(long, env = "TRAFFICS_FILE", default_value = "traffics.log")]
    pub traffics_file: PathBuf,

    /// Fallback log level used if no `log4rs` config file is found on disk.
    #[clap(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Path to the `log4rs` YAML config.
    #[clap(long, env = "LOG_FILE", default_value = LOG4RS_CONFIG_FILE_PATH)]
    pub log_file: String,

    /// Directory the static dashboard bundle is served from.
    #[clap(long, env = "DASHBOARD_DIR", default_value = "dashboard")]
    pub dashboard_dir: PathBuf,
}

impl CollectorConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), self.http_port)
    }
}
