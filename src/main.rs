// Copyright 2026 The Assist Gateway Authors
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;

use assist_gateway::proxy;
use assist_gateway::region;
use assist_gateway::upstream;

use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "assist-gateway", about = "Regional AI-chat gateway")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 8080, env = "ASSIST_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!(%addr, "assist-gateway starting");

    if std::env::var(region::REGION_MAP_VAR).is_err() {
        tracing::warn!(
            var = region::REGION_MAP_VAR,
            "region mapping is not set; every forwarded request will fail until it is"
        );
    }

    let http: Arc<dyn upstream::HttpSender> = Arc::new(upstream::ReqwestHttpSender::default());
    let regions: Arc<dyn region::RegionSource> = Arc::new(region::EnvSource);

    let app = proxy::build_router(http, regions);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind to address");

    tracing::info!(%addr, "assist-gateway listening");

    axum::serve(listener, app)
        .await
        .expect("server error");
}
