use std::time::Duration;

use reqwest::Url;

use crate::{backoff::Backoff, error::Error};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// settings for a single frame poller instance
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// address answering `GET` with a single still image
    pub endpoint: Url,
    /// time between two ticks
    pub interval: Duration,
    /// failures in a row after which the poller degrades, `None` polls forever
    pub max_consecutive_failures: Option<u32>,
    /// delay policy for the tick following a failure
    pub backoff: Backoff,
    /// upper bound for a single request, `None` leaves it to the transport
    pub request_timeout: Option<Duration>,
}

impl PollerConfig {
    /// create a config with default settings polling the given endpoint
    pub fn new(endpoint: &str) -> Result<Self, Error> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| Error::InvalidConfig(format!("endpoint '{endpoint}' is not a valid url: {err}")))?;
        Ok(Self {
            endpoint,
            interval: DEFAULT_INTERVAL,
            max_consecutive_failures: None,
            backoff: Backoff::None,
            request_timeout: None,
        })
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = Some(max);
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// check the settings before any tick is scheduled
    pub fn validate(&self) -> Result<(), Error> {
        if self.interval.is_zero() {
            return Err(Error::InvalidConfig(String::from("interval has to be above zero")));
        }
        if !matches!(self.endpoint.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "endpoint scheme '{}' is not supported, expected http or https",
                self.endpoint.scheme()
            )));
        }
        if self.request_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(Error::InvalidConfig(String::from("request timeout has to be above zero")));
        }
        self.backoff.validate().map_err(Error::InvalidConfig)
    }
}
