use anyhow::Context as _;
use auto_watcher::config::Config;
use auto_watcher::db::Pool;
use auto_watcher::handlers::Context;
use auto_watcher::ones::OnesClient;
use clap::Parser;
use std::sync::Arc;

async fn run_server(config: Config) -> anyhow::Result<()> {
    let pool = Arc::new(
        Pool::open(config.database_url())
            .await
            .context("opening the database")?,
    );
    let ones = OnesClient::new(config.openapi_timeout());

    let addr = config.socket_addr();
    let ctx = Arc::new(Context {
        rules: pool.clone(),
        installations: pool,
        ones: Arc::new(ones),
        config: Arc::new(config),
    });

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(listener, auto_watcher::router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    dotenvy::dotenv().ok();
    auto_watcher::logger::init();

    let config = Config::parse();
    if let Err(e) = run_server(config).await {
        eprintln!("Failed to run server: {e:?}");
        std::process::exit(1);
    }
}
