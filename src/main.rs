use anyhow::Context;
use clap::{Parser, Subcommand};
use forge_search::{
    api::{build_router, AppState},
    config::Config,
    indexer::{IndexPipeline, TaskConsumer},
    models::ObjectType,
    search::StorageManager,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "forge-search")]
#[command(about = "Faceted search service for repositories, issues and code", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway and the indexer in one process
    Serve,

    /// Run only the HTTP gateway
    Gateway,

    /// Run only the indexer
    Indexer,

    /// Wipe the index and taxonomy of one object type
    Reset {
        #[arg(short, long, value_name = "TYPE")]
        r#type: ObjectType,
    },

    /// Merge the index segments of one object type
    Optimize {
        #[arg(short, long, value_name = "TYPE")]
        r#type: ObjectType,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_tracing(&config);

    tracing::info!(
        "Starting {} v{}",
        config.observability.service_name,
        env!("CARGO_PKG_VERSION")
    );

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run(config, true, true).await,
        Commands::Gateway => run(config, true, false).await,
        Commands::Indexer => run(config, false, true).await,
        Commands::Reset { r#type } => {
            let storage = StorageManager::new(&config.storage)?;
            storage.reset(r#type)?;
            tracing::info!(object_type = %r#type, "✅ Index reset");
            Ok(())
        }
        Commands::Optimize { r#type } => {
            let storage = StorageManager::new(&config.storage)?;
            let stats = storage.optimize(r#type)?;
            tracing::info!(
                object_type = %r#type,
                documents = stats.total_documents,
                "✅ Index optimized"
            );
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "forge_search={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run(config: Config, gateway: bool, indexer: bool) -> anyhow::Result<()> {
    tracing::info!(path = ?config.storage.path, "Storage root");
    let state = AppState::from_config(config).await?;
    tracing::info!(provider = state.queue.name(), "✅ Queue provider initialized");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    if indexer {
        let consumer = TaskConsumer::new(
            state.queue.clone(),
            IndexPipeline::new(Arc::clone(&state.storage)),
            &state.config.indexer,
        );
        tasks.push(tokio::spawn(consumer.run(shutdown_rx.clone())));
    }

    if gateway {
        let addr = format!(
            "{}:{}",
            state.config.server.host, state.config.server.http_port
        );
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let app = build_router(state.clone());

        tracing::info!("🚀 HTTP gateway listening on http://{}", addr);
        tracing::info!("   Search: http://{}/search/index?type=repo&q=...", addr);
        tracing::info!("   Metrics: http://{}/index/metrics", addr);

        let mut server_shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stop| *stop).await;
            });
            if let Err(e) = serve.await {
                tracing::error!("HTTP server error: {}", e);
            }
        }));
    }

    tracing::info!("Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    tracing::info!("Shutting down gracefully...");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("Background task failed: {}", e);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
