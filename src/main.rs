mod api;
mod gateway;

use clap::{Parser, Subcommand};
use leadflow_core::{bus::EventBus, config, shellexpand, traits::{Messenger, Responder}};
use leadflow_memory::Store;
use leadflow_providers::GeminiResponder;
use leadflow_zapi::ZapiClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[derive(Parser)]
#[command(
    name = "leadflow",
    version,
    about = "Leadflow — WhatsApp lead qualification bot"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server and gateway.
    Start,
    /// Check configuration and component readiness.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            let cfg = config::load(&cli.config)?;
            let _log_guard = init_tracing(&cfg);

            if cfg.zapi.instance_id.is_empty() || cfg.zapi.instance_token.is_empty() {
                anyhow::bail!(
                    "Z-API instance is not configured. \
                     Set [zapi] instance_id and instance_token in {}.",
                    cli.config
                );
            }

            let store = Store::new(&cfg.memory).await?;
            let messenger: Arc<dyn Messenger> = Arc::new(ZapiClient::from_config(&cfg.zapi));
            let responder: Arc<dyn Responder> = Arc::new(GeminiResponder::from_config(&cfg.ai));
            let bus = EventBus::default();

            let (tx, rx) = mpsc::channel(256);

            let state = api::ApiState {
                tx,
                store: store.clone(),
                messenger: messenger.clone(),
                bus: bus.clone(),
                api_key: (!cfg.api.api_key.is_empty()).then(|| cfg.api.api_key.clone()),
                service_numbers: Arc::new(cfg.zapi.service_numbers.clone()),
                uptime: Instant::now(),
            };
            let api_cfg = cfg.api.clone();
            tokio::spawn(async move {
                api::serve(state, &api_cfg).await;
            });

            println!("Leadflow — starting bot...");
            let gw = Arc::new(gateway::Gateway::new(
                store,
                messenger,
                responder,
                bus,
                cfg.memory.history_limit,
                cfg.notify.admin_phone.clone(),
            ));
            gw.run(rx).await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            println!("Leadflow — Status Check\n");
            println!("Config: {}", cli.config);
            println!();

            println!(
                "  zapi: {}",
                if !cfg.zapi.instance_id.is_empty() && !cfg.zapi.instance_token.is_empty() {
                    "configured"
                } else {
                    "missing instance_id or instance_token"
                }
            );
            println!(
                "  ai: {}",
                if cfg.ai.api_key.is_empty() {
                    "disabled (no api key)".to_string()
                } else {
                    format!("enabled ({} models)", cfg.ai.models.len())
                }
            );
            println!(
                "  notify: {}",
                if cfg.notify.admin_phone.is_empty() {
                    "no admin phone"
                } else {
                    "configured"
                }
            );
            println!("  db: {}", cfg.memory.db_path);
            println!("  api: {}:{}", cfg.api.host, cfg.api.port);
        }
    }

    Ok(())
}

/// Console + daily-rolling file logging. The returned guard must stay alive
/// for the file writer to flush.
fn init_tracing(cfg: &config::Config) -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = PathBuf::from(shellexpand(&cfg.app.data_dir)).join("logs");
    let _ = std::fs::create_dir_all(&log_dir);

    let file_appender = tracing_appender::rolling::daily(&log_dir, "leadflow.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.app.log_level)),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .init();

    guard
}
