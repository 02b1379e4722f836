use anyhow::Context;
use clap::Parser;
use rift_imposter::config::{Cli, ImpostersFile, LogFormat};
use rift_imposter::{ImposterManager, ViewOptions};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(cli: &Cli) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    match cli.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let manager = ImposterManager::new(cli.record_requests);

    if let Some(ref path) = cli.configfile {
        let mut file = ImpostersFile::from_file(path)
            .with_context(|| format!("failed to load imposters from {}", path.display()))?;
        file.apply_default_host(&cli.host);

        for request in file.imposters {
            let imposter = manager
                .create_imposter(request)
                .await
                .context("failed to create imposter")?;
            info!(port = imposter.port(), "Imposter ready at {}", imposter.url());
        }
    }

    info!(
        imposters = manager.count(),
        record_requests = cli.record_requests,
        "rift-imposter running, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    if let Some(ref path) = cli.save_file {
        let options = ViewOptions {
            remove_proxies: cli.remove_proxies,
            ..ViewOptions::replayable()
        };
        let saved = serde_json::to_string_pretty(&manager.to_json(&options))?;
        std::fs::write(path, saved)
            .with_context(|| format!("failed to save imposters to {}", path.display()))?;
        info!("Saved imposters to {}", path.display());
    }

    let closed = manager.delete_all(&ViewOptions::default());
    if closed.is_empty() {
        warn!("No imposters were running");
    }
    info!(count = closed.len(), "Shut down");
    Ok(())
}
