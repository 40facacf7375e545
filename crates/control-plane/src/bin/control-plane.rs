use std::sync::Arc;

use clap::Parser;
use control_plane::config::ControlPlaneConfig;
use control_plane::ControlPlane;
use message_queue::backends::InProcessMessageQueue;
use message_queue::MessageQueue;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ControlPlaneConfig::parse();

    let message_queue: Arc<dyn MessageQueue> = Arc::new(InProcessMessageQueue::new());
    let app = ControlPlane::new(config, message_queue, None)?;

    let cancellation = CancellationToken::new();
    let consumer = tokio::spawn(control_plane::run_consumer(app.clone(), cancellation.clone()));

    let router = control_plane::build_router(app.clone());
    let bind_addr = format!("{}:{}", app.config().bind_host(), app.config().bind_port());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(address = %bind_addr, "launching control plane server");

    let shutdown = {
        let cancellation = cancellation.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            cancellation.cancel();
        }
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    consumer.await.ok();
    app.message_queue().cleanup().await?;

    Ok(())
}
