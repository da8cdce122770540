use clap::Parser;
use dotenv::dotenv;
use metric_store::{
    api::{self, ApiConfig, ApiState},
    config::{ServerArgs, ServerConfig},
    storage,
};
use tracing::{error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

/// Targets are crate names, this binary logs as `metric_store_server`
fn log_filter() -> filter::Targets {
    filter::Targets::new().with_targets(vec![
        ("metric_store", LevelFilter::DEBUG),
        ("metric_store_server", LevelFilter::DEBUG),
        ("tower_http", LevelFilter::DEBUG),
    ])
}

fn init() {
    let filter = log_filter();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init();

    let args = ServerArgs::parse();
    trace!("started with args: {args:?}");

    let config = ServerConfig::resolve(args)?;
    info!(
        "store interval {:?}, restore {}",
        config.storage.interval, config.storage.restore
    );

    let storage = storage::open(&config.storage).await?;

    let served = api::serve(
        ApiConfig {
            bind_addr: config.address.clone(),
        },
        ApiState::new(storage.clone()),
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {e}");
            }
            info!("shutdown signal received");
        },
    )
    .await;

    // flush whatever the server accepted, even if serving failed
    if let Err(e) = storage.close().await {
        error!("failed to close storage: {e}");
    }

    served
}
