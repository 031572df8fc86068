use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spacetraveling::{config, server};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spacetraveling=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = config::Args::parse();
    let config = match config::Config::load(&args) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!("{:#?}", config);

    if let Err(err) = server::serve(config).await {
        tracing::error!("{}", err);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
