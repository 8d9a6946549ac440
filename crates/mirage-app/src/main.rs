//! Mirage - content-rewriting forward proxy.
//!
//! Serves the landing page and proxies `/?url=<target>` requests, rewriting
//! HTML, CSS and JavaScript so the page keeps loading through the proxy.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use directories::ProjectDirs;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mirage_proxy::FetchConfig;
use mirage_server::{Server, ServerConfig, DEFAULT_HOST, DEFAULT_MAX_BODY_BYTES, DEFAULT_PORT};

/// Mirage - content-rewriting forward proxy
#[derive(Parser, Debug)]
#[command(name = "mirage", version, about)]
struct Args {
    /// Address to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Origin written into rewritten URLs (e.g. https://mirage.example).
    /// Derived from each request's Host header when omitted.
    #[arg(long)]
    public_origin: Option<String>,

    /// Upstream fetch timeout in seconds
    #[arg(long, default_value_t = 20)]
    timeout_secs: u64,

    /// Maximum redirects followed per upstream fetch
    #[arg(long, default_value_t = 10)]
    max_redirects: usize,

    /// Largest inbound request body forwarded upstream, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Log to the console only
    #[arg(long)]
    no_file_log: bool,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let fetch = FetchConfig::default()
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_max_redirects(self.max_redirects);

        let mut config = ServerConfig::default()
            .with_host(&self.host)
            .with_port(self.port)
            .with_max_body_bytes(self.max_body_bytes)
            .with_fetch(fetch);
        if let Some(ref origin) = self.public_origin {
            config = config.with_public_origin(origin);
        }
        config
    }

    fn log_filter(&self) -> String {
        let level = if self.debug { "debug" } else { &self.log_level };
        format!("mirage={level},warn")
    }
}

/// Get the logs directory path.
fn logs_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "mirage", "Mirage").map(|dirs| dirs.data_dir().join("logs"))
}

/// Initialize console logging, plus a daily log file when possible.
fn init_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Directive targets match by prefix, so `mirage` covers every workspace crate.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_filter()));

    if !args.no_file_log {
        let appender = logs_dir().and_then(|log_dir| {
            std::fs::create_dir_all(&log_dir).ok()?;
            RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(7)
                .filename_prefix("mirage")
                .filename_suffix("log")
                .build(&log_dir)
                .ok()
                .map(|appender| (log_dir, appender))
        });

        if let Some((log_dir, appender)) = appender {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stdout))
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .init();

            tracing::info!("Logging to {:?}", log_dir);
            return Some(guard);
        }
    }

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    if !args.no_file_log {
        tracing::warn!("File logging unavailable, using console only");
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(&args);

    tracing::info!("Mirage v{}", env!("CARGO_PKG_VERSION"));

    let server = Server::new(args.server_config()).context("failed to configure server")?;
    if let Some(ref origin) = args.public_origin {
        tracing::info!("Public origin pinned to {}", origin);
    }

    server.run().await.context("server stopped with an error")?;
    Ok(())
}
