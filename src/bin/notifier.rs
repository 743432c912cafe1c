use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use horus::{
    alerts::AlertManager,
    config::{NotifierConfig, read_config_file},
    notifier::Notifier,
    queue::amqp::AmqpConnector,
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON); built-in defaults are used without one
    #[arg(short)]
    file: Option<String>,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("horus", LevelFilter::DEBUG),
        ("horus_notifier", LevelFilter::TRACE),
    ]);
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
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = match &args.file {
        Some(file) => read_config_file::<NotifierConfig>(file)?,
        None => NotifierConfig::default(),
    }
    .with_env_overrides();

    let alert = config
        .alert
        .clone()
        .context("no alert destination: set DISCORD_WEBHOOK_URL or `alert` in the config file")?;
    let alerts = AlertManager::new(alert)?;
    let connector = AmqpConnector::new(&config.broker.url, &config.broker.queue)
        .with_prefetch(config.broker.prefetch);

    let mut notifier = Notifier::new(
        Arc::new(connector),
        Arc::new(alerts),
        config.reconnect.clone().into(),
        config.dedup_capacity,
    )
    .with_alert_retry(config.alert_retry.clone().into());

    tokio::select! {
        result = notifier.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    info!("handled {:?}", notifier.stats());
    Ok(())
}
