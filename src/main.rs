use clap::Parser;
use formatkit::utils::{logger, validation::Validate};
use formatkit::{server, CliConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();
    let config = cli.resolve()?;

    logger::init_logger(config.verbose, config.log_json, config.log_level.as_deref());

    tracing::info!("Starting formatkit");
    if config.verbose {
        tracing::debug!("Service config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        return Err(e.into());
    }

    server::serve(config).await?;
    Ok(())
}
