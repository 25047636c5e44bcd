use clap::Parser;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spinup::pipeline::Cli;
use spinup::{CancelToken, Config, Pipeline};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spinup=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.env_file.as_deref())?;

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        if on_interrupt.is_cancelled() {
            std::process::exit(130);
        }
        warn!("interrupted, cancelling and cleaning up (press again to quit now)");
        on_interrupt.cancel();
    })?;

    Pipeline::from_config(config)?
        .cancel_token(cancel)
        .dispatch(&cli.command)?;
    Ok(())
}
