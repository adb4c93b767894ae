use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use contactbook::config::{self, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if config::has_flag(&args, "--help") || config::has_flag(&args, "-h") {
        println!("{}", config::USAGE);
        return Ok(());
    }

    // Init logging
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let cfg = ServerConfig::load();
    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "contactbook starting: RUST_LOG='{}', bind={}, http_port={}, data_file={:?}, page_size={}",
        rust_log, cfg.bind, cfg.http_port, cfg.data_file, cfg.default_page_size
    );

    contactbook::server::run(cfg).await
}
