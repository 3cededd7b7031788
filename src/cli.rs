use std::path::Path;

use clap::Parser;

const CONFIG_PATH: &str = ".config/dekho-live-view/config.toml";

#[derive(Parser)]
#[command(version = env!("GIT_VERSION"), about)]
pub struct Cli {
    #[arg(long, short, default_value_t = get_default_config_path())]
    /// Alternative path to a config file
    pub config: String,

    #[arg(long, short)]
    /// Address of the frame source, overrides the config file
    pub endpoint: Option<String>,

    #[arg(long)]
    /// Milliseconds between two frame requests
    pub interval_ms: Option<u64>,

    #[arg(long)]
    /// Give up after this many failed requests in a row
    pub max_failures: Option<u32>,

    #[arg(long, short)]
    /// Keep the most recent frame in this file
    pub snapshot: Option<String>,

    #[arg(long, short)]
    /// Log every request instead of lifecycle changes only
    pub verbose: bool,

    #[cfg(feature = "viewer")]
    #[arg(long)]
    /// Write snapshots instead of opening the viewer window
    pub headless: bool,

    #[cfg(feature = "viewer")]
    #[arg(long, short)]
    /// Start the gtk inspector on application launch
    pub inspect: bool,
}

fn get_default_config_path() -> String {
    let home_dir = dirs::home_dir().unwrap_or_default();
    let path = home_dir.join(Path::new(CONFIG_PATH));
    String::from(path.to_str().unwrap_or_default())
}
