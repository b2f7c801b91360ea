use std::{
    fs::File,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use axum::http::Method;
use staffdesk_server::{router, AppState, BackendClient};
use structopt::StructOpt;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::Layer as _;

#[derive(Debug, StructOpt)]
#[structopt(name = "staffdesk-server", about = "Staff operations dashboard server")]
struct Opt {
    /// Operations backend base URL
    #[structopt(long, env = "STAFFDESK_API_URL", default_value = "https://apiv2.shopybucks.com")]
    api_url: String,
    #[structopt(long, default_value = "127.0.0.1")]
    host: String,
    /// Port to listen on; 0 picks an ephemeral port
    #[structopt(long, default_value = "8000")]
    port: u16,
    /// Optional file path to write the selected listening URL as JSON {"url":"http://host:port"}
    #[structopt(long, name = "PORT_FILE")]
    port_file: Option<PathBuf>,
    /// Mark the session cookie `Secure` (serve behind TLS)
    #[structopt(long)]
    secure_cookies: bool,
    /// Where to append the trace-level log
    #[structopt(long, default_value = "debug.log")]
    log_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::from_args();
    init_logger(&opt.log_file)?;

    tracing::info!("using backend {}", opt.api_url);
    let state = Arc::new(AppState {
        backend: BackendClient::new(&opt.api_url),
        secure_cookies: opt.secure_cookies,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let app = router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors),
    );

    // Bind, supporting port 0 to request an ephemeral port
    let bind_host: IpAddr = opt.host.parse().unwrap_or_else(|_| {
        tracing::warn!("invalid host `{}`, falling back to localhost", opt.host);
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    });
    let addr = SocketAddr::from((bind_host, opt.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    let local_addr = listener.local_addr().context("local_addr")?;
    tracing::info!("listening on http://{}", local_addr);

    if let Some(port_file) = &opt.port_file {
        if let Some(parent) = port_file.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let url = format!("http://{}", local_addr);
        let body = serde_json::json!({ "url": url });
        if let Err(e) = std::fs::write(port_file, body.to_string()) {
            tracing::warn!("failed writing port file {:?}: {}", port_file, e);
        }
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}

fn init_logger(log_file: &Path) -> Result<()> {
    use tracing_subscriber::{
        filter::{LevelFilter, Targets},
        fmt,
        layer::SubscriberExt,
        util::SubscriberInitExt,
        EnvFilter,
    };

    let console_layer = fmt::layer()
        .with_ansi(true)
        .with_file(true)
        .with_line_number(true);

    // File layer: always TRACE, non-ANSI
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open {}", log_file.display()))?;
    let file_mw = LogFileMakeWriter(Arc::new(Mutex::new(file)));
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(file_mw);

    // Limit file logs to our crates
    let our_targets = Targets::new()
        .with_target("staffdesk_server", LevelFilter::TRACE)
        .with_target("staffdesk_engine", LevelFilter::TRACE)
        .with_target("tower_http", LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(console_layer.with_filter(EnvFilter::from_default_env()))
        .with(file_layer.with_filter(our_targets))
        .init();
    Ok(())
}

struct LogFileWriter(Arc<Mutex<File>>);

impl std::io::Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut file = self
            .0
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log file lock poisoned"))?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

struct LogFileMakeWriter(Arc<Mutex<File>>);

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFileMakeWriter {
    type Writer = LogFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogFileWriter(self.0.clone())
    }
}
