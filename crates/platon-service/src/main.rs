// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use platon_service::testing::MockMainProcessor;
use platon_service::{http, AppState, PlatonService};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "platon-service", version, about = "Platon mediation pipeline service")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8090")]
    bind: String,

    /// Enable verbose request/response debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("platon=debug")
    } else {
        EnvFilter::new("platon=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let service = Arc::new(PlatonService::new().await);
    let state = AppState {
        service,
        main_processor: Arc::new(MockMainProcessor),
    };
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(bind = %args.bind, "platon-service listening");

    axum::serve(listener, app).await.context("serve")
}
