//! The nodestat daemon: starts the usage monitors, then serves their latest
//! values over mutually authenticated TLS until interrupted.

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use nodestat::args::Args;
use nodestat::monitor::cpu::CpuMonitor;
use nodestat::monitor::mem::MemMonitor;
use nodestat::monitor::Monitor;
use nodestat::utils::logging;
use nodestat::{log_info, server, tls};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let logger = logging::init_logger(log::LevelFilter::Info);

    let addr = args
        .addr
        .to_socket_addrs()
        .with_context(|| format!("unable to resolve address {}", args.addr))?
        .next()
        .with_context(|| format!("address {} did not resolve to anything", args.addr))?;

    let tls_config = tls::load_server_config(&args.ca_cert, &args.cert, &args.key)
        .context("unable to load the mTLS configuration")?;

    let cpu: Arc<dyn Monitor> = Arc::new(CpuMonitor::new(args.cpu_interval, logger.clone()));
    let mem: Arc<dyn Monitor> = Arc::new(MemMonitor::new(args.mem_interval, logger.clone()));
    cpu.start();
    mem.start();

    let app = server::router(cpu.clone(), mem.clone(), logger.clone());

    let handle = axum_server::Handle::new();
    tokio::spawn(shutdown_on_ctrl_c(handle.clone()));

    log_info!(logger, "serving stats on https://{addr}");

    let result = axum_server::bind_rustls(addr, RustlsConfig::from_config(Arc::new(tls_config)))
        .handle(handle)
        .serve(app.into_make_service())
        .await;

    cpu.stop();
    mem.stop();

    result.context("server error")
}

async fn shutdown_on_ctrl_c(handle: axum_server::Handle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        handle.graceful_shutdown(Some(Duration::from_secs(5)));
    }
}
