use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use horus::{
    actors::{
        cycle::CycleRunner, publisher::Publisher, scheduler::SchedulerHandle, sink::ResultSink,
    },
    api::{ApiState, spawn_api_server},
    backoff::{self, ReconnectPolicy},
    config::{CheckerConfig, read_config_file},
    probe::HttpProbe,
    queue::amqp::AmqpProducer,
    storage,
};
use tracing::{info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON); built-in defaults are used without one
    #[arg(short)]
    file: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("horus", LevelFilter::DEBUG),
        ("horus_checker", LevelFilter::TRACE),
        ("tower_http", LevelFilter::DEBUG),
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
        Some(file) => read_config_file::<CheckerConfig>(file)?,
        None => CheckerConfig::default(),
    }
    .with_env_overrides();

    let storage = storage::open(&config.storage)
        .await
        .context("Failed to open storage")?;

    let policy = ReconnectPolicy::from(config.reconnect.clone());
    let producer = Arc::new(
        backoff::retry(&policy, "broker connection", || {
            AmqpProducer::connect(&config.broker.url, &config.broker.queue)
        })
        .await?,
    );

    let probe = HttpProbe::new(config.probe_timeout())?;
    let sink = ResultSink::new(
        storage.clone(),
        Publisher::new(producer.clone(), config.publish_timeout()),
    );
    let runner = CycleRunner::new(storage.clone(), Arc::new(probe), sink, config.workers);

    if args.once {
        let report = runner.run_cycle(1).await?;
        info!("single cycle finished: {report:?}");
    } else {
        spawn_api_server(&config.api, ApiState::new(storage.clone())).await?;

        let scheduler = SchedulerHandle::spawn(runner, config.interval());
        info!(
            "checking every {:?} with {} workers",
            config.interval(),
            config.workers
        );

        tokio::signal::ctrl_c().await?;
        info!("shutting down, waiting for the running cycle");
        scheduler.shutdown().await;
    }

    producer.close().await;
    storage.close().await?;

    Ok(())
}
