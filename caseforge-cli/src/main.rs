// caseforge-cli/src/main.rs
// ============================================================================
// Module: CaseForge CLI Entry Point
// Description: Process entrypoint wiring configuration, storage, queue, AI
//              clients, and the worker framework to the HTTP API.
// Purpose: Provide the single `serve` command that boots the whole system.
// Dependencies: clap, caseforge-config, caseforge-core, caseforge-clients,
//               caseforge-queue, caseforge-store-sqlite, caseforge-worker,
//               caseforge-api, thiserror, tokio, tracing-subscriber.
// ============================================================================

//! ## Overview
//! There is exactly one operational mode: `caseforge serve` loads
//! configuration from the environment, assembles the `SQLite` store, the
//! in-memory queue, the mock AI client registry, and the eight worker
//! pipelines, starts the worker framework, then serves the HTTP API until
//! the process is terminated.

use std::process::ExitCode;
use std::sync::Arc;

use caseforge_api::AppState;
use caseforge_clients::ClientRegistry;
use caseforge_config::Config;
use caseforge_queue::InMemoryQueue;
use caseforge_store_sqlite::SqliteStore;
use caseforge_worker::Framework;
use caseforge_worker::Worker;
use caseforge_worker::pipelines::asset3d::Asset3dPipeline;
use caseforge_worker::pipelines::export::ExportPipeline;
use caseforge_worker::pipelines::imagegen::ImagegenPipeline;
use caseforge_worker::pipelines::profile::ProfilePipeline;
use caseforge_worker::pipelines::reasoning::ReasoningPipeline;
use caseforge_worker::pipelines::reconstruction::ReconstructionPipeline;
use caseforge_worker::pipelines::replay::ReplayPipeline;
use caseforge_worker::pipelines::scene_analysis::SceneAnalysisPipeline;
use clap::Parser;
use clap::Subcommand;
use thiserror::Error;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "caseforge", arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the CaseForge control plane: worker framework plus HTTP API.
    Serve,
}

/// Errors the CLI surfaces as a failure exit code.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] caseforge_config::ConfigError),
    /// The `SQLite` store could not be opened.
    #[error("store error: {0}")]
    Store(#[from] caseforge_store_sqlite::SqliteStoreError),
    /// The HTTP server exited with an error.
    #[error("server error: {0}")]
    Serve(#[from] caseforge_api::ServeError),
}

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve => match command_serve().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                tracing::error!(error = %err, "caseforge exited with an error");
                ExitCode::FAILURE
            }
        },
    }
}

/// Executes the `serve` command: wires every component and runs until the
/// process is terminated.
async fn command_serve() -> Result<(), CliError> {
    let config = Config::from_env()?;

    let store: Arc<dyn caseforge_core::PersistenceStore> =
        Arc::new(SqliteStore::new(config.sqlite_store_config())?);
    // No networked `Queue` implementation ships in this workspace yet;
    // `config.queue_url` is validated but otherwise unused until one does.
    let queue: Arc<dyn caseforge_core::Queue> = Arc::new(InMemoryQueue::with_default_topics());
    let clients = ClientRegistry::with_mock_clients();

    let mut framework = Framework::new(Arc::clone(&store), Arc::clone(&queue))
        .with_retry_policy(config.retry.to_retry_policy())
        .with_telemetry(Arc::new(caseforge_worker::telemetry::TracingTelemetry));

    let workers: Vec<Arc<dyn Worker>> = vec![
        Arc::new(ReconstructionPipeline::new(Arc::clone(&clients.reconstruction))),
        Arc::new(SceneAnalysisPipeline::new(Arc::clone(&clients.scene_analysis))),
        Arc::new(ReasoningPipeline::new(Arc::clone(&clients.reasoning))),
        Arc::new(ProfilePipeline::new(Arc::clone(&clients.profile))),
        Arc::new(ImagegenPipeline::new(Arc::clone(&clients.imagegen))),
        Arc::new(Asset3dPipeline::new(Arc::clone(&clients.asset3d))),
        Arc::new(ReplayPipeline::new(Arc::clone(&clients.replay))),
        Arc::new(ExportPipeline::new(Arc::clone(&clients.storage))),
    ];
    for worker in workers {
        framework.register(worker);
    }

    let framework_handle = Arc::new(framework).start();

    let state = Arc::new(AppState::new(store, queue, clients.storage));
    let serve_result = caseforge_api::serve(state, &config.bind_addr, &config.cors_origins).await;

    framework_handle.stop().await;
    serve_result.map_err(CliError::from)
}
