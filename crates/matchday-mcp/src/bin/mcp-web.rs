use matchday::DailyScheduler;
use matchday_mcp::McpServer;
use rmcp::transport::{
    StreamableHttpServerConfig, StreamableHttpService,
    streamable_http_server::session::local::LocalSessionManager,
};
use tower_http::cors::CorsLayer;

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8055";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .target(env_logger::Target::Stderr)
        .write_style(env_logger::WriteStyle::Never)
        .init();

    let ct = tokio_util::sync::CancellationToken::new();

    let server = McpServer::from_env().await?;
    let schedule = server.ingestor().config().schedule.clone();
    let scheduler = DailyScheduler::new(server.ingestor().clone(), &schedule)?;
    let scheduler_task = scheduler.start();
    log::info!("Next scheduled ingestion at {}", scheduler.next_run());

    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig {
            cancellation_token: ct.child_token(),
            ..Default::default()
        },
    );

    let address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.into());
    let router = axum::Router::new()
        .nest_service("/sse", service)
        .layer(CorsLayer::permissive());
    let tcp_listener = tokio::net::TcpListener::bind(&address).await?;

    log::info!("Starting mcp server on address: {}", address);

    let served = axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for shutdown signal: {e}");
            }
            ct.cancel();
        })
        .await
        .inspect_err(|e| log::error!("Server error: {e}"));

    scheduler.stop();
    scheduler_task.await?;

    Ok(served?)
}
