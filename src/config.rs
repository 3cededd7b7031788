use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use dekho_live_view_lib::{Backoff, PollerConfig};
use log::{error, warn};
use serde::Deserialize;

use crate::cli::Cli;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    #[serde(skip_deserializing)]
    path: PathBuf,
    /// all config related to fetching frames
    pub poller: PollerSection,
    /// where the headless surface keeps the current frame
    pub snapshot: SnapshotConfig,
    /// all config related to the viewer window
    #[cfg_attr(not(feature = "viewer"), allow(dead_code))]
    pub window: WindowConfig,
    /// all config related to displayed images
    #[cfg_attr(not(feature = "viewer"), allow(dead_code))]
    pub image: ImageConfig,
}

impl Config {
    pub fn new(path_str: &String) -> Self {
        match Self::load(Path::new(path_str)) {
            Ok(Some(config)) => config,
            Ok(None) => {
                warn!("missing config file at {path_str}, using default instead!");
                Self::default()
            }
            Err(err) => {
                error!("invalid config file at {path_str}: {err}");
                std::process::exit(1)
            }
        }
    }

    /// read the config file at `path`, `None` if there is no such file
    pub fn load(path: &Path) -> Result<Option<Self>, String> {
        if !path.exists() {
            return Ok(None);
        }
        let str = std::fs::read_to_string(path).map_err(|err| err.to_string())?;
        let config: Self = toml::from_str(str.as_str()).map_err(|err| err.to_string())?;
        Ok(Some(Self { path: path.to_path_buf(), ..config }))
    }

    /// apply the command line flags on top of the config file
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(endpoint) = &cli.endpoint {
            self.poller.endpoint = endpoint.clone();
        }
        if let Some(interval_ms) = cli.interval_ms {
            self.poller.interval_ms = interval_ms;
        }
        if let Some(max_failures) = cli.max_failures {
            self.poller.max_consecutive_failures = Some(max_failures);
        }
        if let Some(snapshot) = &cli.snapshot {
            self.snapshot.path = Some(snapshot.clone());
        }
        self
    }

    /// settings for the frame poller
    pub fn poller_config(&self) -> Result<PollerConfig, dekho_live_view_lib::Error> {
        let section = &self.poller;
        let mut config = PollerConfig::new(&section.endpoint)?
            .with_interval(Duration::from_millis(section.interval_ms))
            .with_backoff(section.backoff.into());
        if let Some(max) = section.max_consecutive_failures {
            config = config.with_max_consecutive_failures(max);
        }
        if let Some(timeout_ms) = section.request_timeout_ms {
            config = config.with_request_timeout(Duration::from_millis(timeout_ms));
        }
        config.validate()?;
        Ok(config)
    }

    /// resolved location of the snapshot file, if one is configured
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.snapshot.path.as_ref().map(|path| self.resolve_path(path))
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or(self.path().as_path())
    }

    /// Expand `$HOME` and `~` at beginning of a path to
    /// current user home directory if resolvable
    fn expand_path(path_str: &String) -> Option<PathBuf> {
        if !path_str.starts_with("~") && !path_str.starts_with("$HOME") {
            Some(Path::new(path_str).to_path_buf())
        } else if path_str == "~" || path_str == "$HOME" {
            dirs::home_dir()
        } else {
            dirs::home_dir().map(|home| {
                let rest = path_str.trim_start_matches("$HOME").trim_start_matches('~').trim_start_matches('/');
                home.join(rest)
            })
        }
    }

    /// Resolve relative paths to position of config file
    /// and expand `$HOME` and `~` to user home directory
    pub fn resolve_path(&self, path_str: &String) -> PathBuf {
        let path = match Self::expand_path(path_str) {
            Some(path) => path,
            None => {
                warn!("unable to resolve user home directory");
                Path::new(path_str).to_path_buf()
            }
        };

        if path.is_relative() { self.directory().join(path) } else { path }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: dirs::home_dir().unwrap_or(Path::new("/").to_path_buf()).join("config.toml"),
            poller: PollerSection::default(),
            snapshot: SnapshotConfig::default(),
            window: WindowConfig::default(),
            image: ImageConfig::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PollerSection {
    /// address answering `GET` with a single still image
    pub endpoint: String,
    /// milliseconds between two requests
    pub interval_ms: u64,
    /// give up after this many failed requests in a row, never give up when unset
    pub max_consecutive_failures: Option<u32>,
    /// upper bound for a single request in milliseconds
    pub request_timeout_ms: Option<u64>,
    /// how to space out requests after a failure
    pub backoff: BackoffConfig,
}

impl Default for PollerSection {
    fn default() -> Self {
        Self {
            endpoint: String::from("http://127.0.0.1:8000/video_feed"),
            interval_ms: 1000,
            max_consecutive_failures: None,
            request_timeout_ms: None,
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackoffConfig {
    #[default]
    None,
    Exponential {
        base_ms: u64,
        cap_ms: u64,
    },
}

impl From<BackoffConfig> for Backoff {
    fn from(value: BackoffConfig) -> Self {
        match value {
            BackoffConfig::None => Backoff::None,
            BackoffConfig::Exponential { base_ms, cap_ms } => {
                Backoff::exponential(Duration::from_millis(base_ms), Duration::from_millis(cap_ms))
            }
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SnapshotConfig {
    /// file which always holds the most recent frame
    ///
    /// relative paths are resolved against the location of the config file
    pub path: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
#[cfg_attr(not(feature = "viewer"), allow(dead_code))]
pub struct WindowConfig {
    /// target width of the viewer window
    pub width: i32,
    /// target height of the viewer window
    pub height: i32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { width: 960, height: 600 }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
#[cfg_attr(not(feature = "viewer"), allow(dead_code))]
pub struct ImageConfig {
    /// internally downscale every frame so its bigger side is at most this long
    pub resize_size: u32,
    /// minimal height of the widget showing the frame
    pub widget_size: i32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self { resize_size: 1280, widget_size: 360 }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    fn parse(str: &str) -> Config {
        toml::from_str(str).expect("config should parse")
    }

    #[test]
    fn empty_file_keeps_polling_forever() {
        let config = parse("");
        let poller = config.poller_config().unwrap();
        assert_eq!(poller.interval, Duration::from_secs(1));
        assert_eq!(poller.max_consecutive_failures, None);
        assert_eq!(poller.backoff, Backoff::None);
        assert_eq!(poller.endpoint.as_str(), "http://127.0.0.1:8000/video_feed");
    }

    #[test]
    fn reads_poller_section() {
        let config = parse(
            r#"
            [poller]
            endpoint = "http://10.0.0.7:8000/camera/2"
            interval_ms = 250
            max_consecutive_failures = 5
            request_timeout_ms = 800

            [poller.backoff]
            kind = "exponential"
            base_ms = 500
            cap_ms = 8000
            "#,
        );
        let poller = config.poller_config().unwrap();
        assert_eq!(poller.endpoint.as_str(), "http://10.0.0.7:8000/camera/2");
        assert_eq!(poller.interval, Duration::from_millis(250));
        assert_eq!(poller.max_consecutive_failures, Some(5));
        assert_eq!(poller.request_timeout, Some(Duration::from_millis(800)));
        assert_eq!(poller.backoff, Backoff::exponential(Duration::from_millis(500), Duration::from_secs(8)));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = parse("[poller]\ninterval_ms = 0\n");
        assert!(config.poller_config().is_err());
    }

    #[test]
    fn unknown_backoff_kind_fails_to_parse() {
        assert!(toml::from_str::<Config>("[poller.backoff]\nkind = \"linear\"\n").is_err());
    }

    #[test]
    fn flags_override_file() {
        let cli = Cli::parse_from([
            "dekho-live-view",
            "--endpoint",
            "http://192.168.1.20/frame.jpg",
            "--interval-ms",
            "2000",
            "--max-failures",
            "3",
        ]);
        let poller = parse("[poller]\ninterval_ms = 100\n").with_overrides(&cli).poller_config().unwrap();
        assert_eq!(poller.endpoint.as_str(), "http://192.168.1.20/frame.jpg");
        assert_eq!(poller.interval, Duration::from_secs(2));
        assert_eq!(poller.max_consecutive_failures, Some(3));
    }

    #[test]
    fn snapshot_path_is_relative_to_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        std::fs::write(&file, "[snapshot]\npath = \"frames/live.jpg\"\n").unwrap();

        let config = Config::load(&file).unwrap().unwrap();
        assert_eq!(config.snapshot_path(), Some(dir.path().join("frames/live.jpg")));
    }

    #[test]
    fn missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(&dir.path().join("absent.toml")).unwrap().is_none());
    }

    #[test]
    fn absolute_snapshot_path_is_kept() {
        let config = parse("[snapshot]\npath = \"/var/lib/dekho/live.png\"\n");
        assert_eq!(config.snapshot_path(), Some(PathBuf::from("/var/lib/dekho/live.png")));
    }
}
