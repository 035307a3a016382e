use anyhow::{bail, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};
use server::build_app;
use tokio::net::TcpListener;

/// Serves ranked search over a built alphadex index.
#[derive(Parser)]
struct Args {
    /// Directory written by `indexer build`
    #[arg(long, default_value = "./index")]
    index: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    if !Path::new(&args.index).is_dir() {
        bail!("index directory {} does not exist", args.index);
    }
    let app = build_app(args.index.clone())?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, index = %args.index, "search server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
