use clap::Parser;
use tracing::{error, info};
use webshot::{setup_logging, Cli, CliRunner, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    setup_logging(args.verbose);

    info!("Starting webshot v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args).await?;
    let runner = CliRunner::new(config);

    let result = tokio::select! {
        result = runner.run(args.command) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
    };

    runner.shutdown().await;

    if let Err(e) = result {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn load_config(args: &Cli) -> anyhow::Result<Config> {
    let mut config = if let Some(config_path) = &args.config {
        let content = tokio::fs::read_to_string(config_path).await?;
        serde_json::from_str(&content)?
    } else {
        Config::default()
    };

    if let Some(pool_size) = args.pool_size {
        config.pool_size = pool_size;
    }
    if let Some(chrome_path) = &args.chrome_path {
        config.chrome_path = Some(chrome_path.clone());
    }

    if config.pool_size == 0 {
        anyhow::bail!("pool size must be greater than 0");
    }

    info!(
        "Pool size: {}, batch concurrency: {}",
        config.pool_size, config.batch_concurrency
    );
    Ok(config)
}
