use std::process::{ExitCode, exit};

use clap::Parser;
use cli::Cli;
use config::Config;
use dekho_live_view_lib::PollerHandle;
use env_logger::Env;
use surface::{Finished, HeadlessSurface};

#[cfg(feature = "viewer")]
mod app;
mod cli;
mod config;
#[cfg(feature = "viewer")]
mod image;
mod surface;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let config = Config::new(&cli.config).with_overrides(&cli);
    let poller_config = match config.poller_config() {
        Ok(poller_config) => poller_config,
        Err(err) => {
            log::error!("unable to set up frame poller: {err}");
            exit(1);
        }
    };
    let poller = match dekho_live_view_lib::start(poller_config) {
        Ok(poller) => poller,
        Err(err) => {
            log::error!("unable to start frame poller: {err}");
            exit(1);
        }
    };

    #[cfg(feature = "viewer")]
    if !cli.headless {
        let poller = std::sync::Arc::new(poller);
        let code = app::App::build(cli.inspect, config, poller.clone()).run();
        poller.stop();
        return ExitCode::from(u8::try_from(code.value()).unwrap_or(1));
    }

    run_headless(&config, poller).await
}

async fn run_headless(config: &Config, poller: PollerHandle) -> ExitCode {
    let surface = HeadlessSurface::new(config.snapshot_path());
    let finished = tokio::select! {
        finished = surface.follow(&poller) => finished,
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                log::error!("unable to listen for ctrl-c: {err}");
            }
            Finished::Closed
        }
    };
    poller.stop();

    match finished {
        Finished::Degraded => ExitCode::from(2),
        Finished::Closed => ExitCode::SUCCESS,
    }
}
