use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shelly::cli::{self, Cli};
use shelly::config::{default_config_dir, Config};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);
    let config = match Config::load(&config_dir) {
        Ok(config) => config,
        Err(err) => {
            cli::shell::say_error(format!("{err:#}"));
            return ExitCode::FAILURE;
        }
    };

    // RUST_LOG wins over --log-level, which wins over --debug and the config file
    let log_level = cli.log_level.clone().unwrap_or_else(|| {
        if cli.debug {
            "debug".to_string()
        } else {
            config.logging.level.clone()
        }
    });

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("shelly v{}", env!("CARGO_PKG_VERSION"));

    match cli::run(cli, config_dir, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = cli::report(&err);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
