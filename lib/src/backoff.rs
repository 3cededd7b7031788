use std::time::Duration;

/// delay policy applied to the next tick after a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// keep the regular interval regardless of failures
    #[default]
    None,
    /// `min(base * 2^consecutive_failures, cap)`
    Exponential { base: Duration, cap: Duration },
}

impl Backoff {
    pub fn exponential(base: Duration, cap: Duration) -> Self {
        Backoff::Exponential { base, cap }
    }

    /// delay to hold off the next tick for after `consecutive_failures` failures in a row
    pub fn delay(&self, consecutive_failures: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Exponential { base, cap } => 2u32
                .checked_pow(consecutive_failures)
                .and_then(|factor| base.checked_mul(factor))
                .map_or(cap, |delay| delay.min(cap)),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        match *self {
            Backoff::None => Ok(()),
            Backoff::Exponential { base, .. } if base.is_zero() => {
                Err(String::from("exponential backoff needs a base above zero"))
            }
            Backoff::Exponential { base, cap } if cap < base => {
                Err(format!("exponential backoff cap {cap:?} is below its base {base:?}"))
            }
            Backoff::Exponential { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_never_delays() {
        assert_eq!(Backoff::None.delay(0), Duration::ZERO);
        assert_eq!(Backoff::None.delay(40), Duration::ZERO);
    }

    #[test]
    fn exponential_doubles_per_failure() {
        let backoff = Backoff::exponential(Duration::from_millis(250), Duration::from_secs(30));
        assert_eq!(backoff.delay(0), Duration::from_millis(250));
        assert_eq!(backoff.delay(1), Duration::from_millis(500));
        assert_eq!(backoff.delay(3), Duration::from_secs(2));
    }

    #[test]
    fn exponential_stops_at_cap() {
        let backoff = Backoff::exponential(Duration::from_millis(250), Duration::from_secs(3));
        assert_eq!(backoff.delay(4), Duration::from_secs(3));
        assert_eq!(backoff.delay(31), Duration::from_secs(3));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(3));
    }

    #[test]
    fn rejects_unusable_exponential_settings() {
        assert!(Backoff::exponential(Duration::ZERO, Duration::from_secs(1)).validate().is_err());
        assert!(Backoff::exponential(Duration::from_secs(2), Duration::from_secs(1)).validate().is_err());
        assert!(Backoff::exponential(Duration::from_secs(1), Duration::from_secs(1)).validate().is_ok());
        assert!(Backoff::None.validate().is_ok());
    }
}
