//! Sink binary: synthesizes the schema, then runs the backfill or the stream
//! consumer.

use clap::{Parser, Subcommand};
use solana_pg_sink::config::SinkConfig;
use solana_pg_sink::core::mapper::gum::register_defaults;
use solana_pg_sink::core::mapper::{HttpMetadataResolver, MapperRegistry, MetadataResolver};
use solana_pg_sink::telemetry::{TelemetryConfig, init_telemetry};
use solana_pg_sink::utils::logging::{LogLevel, log, log_error, log_section, log_startup};
use solana_pg_sink::utils::retry::RetryingRpcProvider;
use solana_pg_sink::utils::rpc::{DefaultRpcProvider, RpcProvider};
use solana_pg_sink::{
    ApplyEngine, BackfillReconciler, DecoderRegistry, PgStore, RedisStreamQueue, Result,
    SchemaCatalog, SchemaSynthesizer, StreamConsumer,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "solana-pg-sink", version, about = "Materializes Solana program state into Postgres")]
struct Cli {
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_filter: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Create or extend the record tables, then exit.
    Schema,
    /// Reconcile every on-chain account of the configured programs.
    Backfill,
    /// Consume webhook payloads from the queue until interrupted.
    Stream,
}

impl Command {
    fn name(self) -> &'static str {
        match self {
            Command::Schema => "schema",
            Command::Backfill => "backfill",
            Command::Stream => "stream",
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _telemetry = init_telemetry(TelemetryConfig {
        log_filter: cli.log_filter.clone(),
        ..TelemetryConfig::from_lookup(|key| std::env::var(key).ok())
    });

    if let Err(e) = run(cli.command).await {
        log_error(cli.command.name(), &e.to_string());
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<()> {
    let config = SinkConfig::from_env()?;
    let program_ids: Vec<String> = config
        .programs
        .iter()
        .map(|p| p.program_id.to_string())
        .collect();
    log_startup(
        command.name(),
        &program_ids,
        &config.rpc_url,
        &config.database_url,
    );

    log_section("Schema");
    let http = reqwest::Client::new();
    let synthesizer = SchemaSynthesizer::from_config(&config);
    let mut decoders = DecoderRegistry::new();
    let mut specs = Vec::new();
    for program in &config.programs {
        let idl = Arc::new(program.idl.load(&http).await?);
        specs.extend(synthesizer.plan(&idl));
        decoders.register(program.program_id, idl);
    }
    let catalog = Arc::new(SchemaCatalog::new(specs)?);

    let store = Arc::new(PgStore::new(&config.database_url, &config.store, &config.record_schema).await?);
    store.initialize().await?;
    let report = synthesizer.synthesize(store.as_ref(), catalog.tables()).await?;
    log(
        LogLevel::Success,
        &format!(
            "Schema ready: {} tables created, {} columns added",
            report.tables_created.len(),
            report.columns_added.len()
        ),
    );

    let engine = ApplyEngine::new(store.clone(), Arc::clone(&catalog), config.retry.clone());
    let resolver: Arc<dyn MetadataResolver> = Arc::new(HttpMetadataResolver::new(&config.resolver)?);
    let decoders = Arc::new(decoders);
    let cancellation_token = CancellationToken::new();

    let shutdown = cancellation_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log(LogLevel::Warning, "Interrupt received, finishing current unit");
            shutdown.cancel();
        }
    });

    let result = match command {
        Command::Schema => Ok(()),
        Command::Backfill => {
            log_section("Backfill");
            let rpc: Arc<dyn RpcProvider> = Arc::new(RetryingRpcProvider::new(
                DefaultRpcProvider::new(&config.rpc_url),
                config.retry.clone(),
            ));
            let reconciler = BackfillReconciler::new(
                rpc,
                decoders,
                engine,
                resolver,
                config.backfill.clone(),
                cancellation_token,
            );
            reconciler.run().await.map(|_| ())
        }
        Command::Stream => {
            log_section("Stream");
            let queue = Arc::new(RedisStreamQueue::connect(config.queue.clone()).await?);
            let mut mappers = MapperRegistry::new();
            register_defaults(&mut mappers);
            let mut consumer = StreamConsumer::new(
                queue,
                decoders,
                Arc::new(mappers),
                engine,
                resolver,
                cancellation_token,
            );
            consumer.run().await.map(|stats| {
                log(
                    LogLevel::Info,
                    &format!(
                        "Consumed {} entries, {} applied, {} skipped",
                        stats.entries, stats.applied, stats.skipped
                    ),
                );
            })
        }
    };

    store.close().await;
    result
}
