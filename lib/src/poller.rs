use std::{
    future::Future,
    pin::Pin,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use tokio::{
    sync::{Notify, broadcast},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    config::PollerConfig,
    error::{Error, ErrorKind},
    frame::{FrameRequest, FrameSource, HttpFrameSource},
    image::DisplayResource,
};

const EVENT_CAPACITY: usize = 64;

/// lifecycle of a poller instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerStatus {
    Running,
    /// too many failures in a row, no more ticks until a new poller is started
    Degraded,
    Stopped,
}

/// progress of the current tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    InFlight,
    Success,
    Failed,
}

/// notifications for display surfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerEvent {
    /// a new frame replaced the current one
    FrameUpdated { sequence: u64, len: usize },
    /// a single fetch failed, the poller keeps going
    FetchFailed { sequence: u64, kind: ErrorKind, consecutive_failures: u32 },
    /// the failure threshold was reached, the last good frame stays visible
    Degraded { consecutive_failures: u32 },
}

/// what happened to a completed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Published,
    Failed(u32),
    Degraded,
    Discarded,
}

struct Slot {
    status: PollerStatus,
    poll_state: PollState,
    current: Option<DisplayResource>,
    /// highest sequence number handed to the frame source
    issued: u64,
    /// sequence number of the currently published frame
    published: u64,
    consecutive_failures: u32,
}

struct Shared {
    slot: Mutex<Slot>,
    live: Arc<AtomicUsize>,
    events: broadcast::Sender<PollerEvent>,
    stop: Notify,
    max_consecutive_failures: Option<u32>,
}

impl Shared {
    fn new(max_consecutive_failures: Option<u32>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let slot = Slot {
            status: PollerStatus::Running,
            poll_state: PollState::Idle,
            current: None,
            issued: 0,
            published: 0,
            consecutive_failures: 0,
        };
        Self { slot: Mutex::new(slot), live: Arc::new(AtomicUsize::new(0)), events, stop: Notify::new(), max_consecutive_failures }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slot> {
        self.slot.lock().expect("lock should not be poisoned")
    }

    /// tag a new request with the next sequence number, `None` once the poller stopped running
    fn issue(&self, config: &PollerConfig) -> Option<FrameRequest> {
        let mut slot = self.lock();
        if slot.status != PollerStatus::Running {
            return None;
        }
        slot.issued += 1;
        slot.poll_state = PollState::InFlight;
        Some(FrameRequest::new(config.endpoint.clone(), slot.issued))
    }

    /// fold the result of a fetch into the published state
    fn complete(&self, sequence: u64, result: Result<Bytes, Error>) -> Completion {
        let mut slot = self.lock();
        if slot.status != PollerStatus::Running {
            log::debug!("dropping frame {sequence}: poller is no longer running");
            return Completion::Discarded;
        }
        if sequence != slot.issued || sequence <= slot.published {
            log::debug!("dropping stale frame {sequence}: latest issued {} published {}", slot.issued, slot.published);
            return Completion::Discarded;
        }

        let resource = result.and_then(|bytes| DisplayResource::tracked(bytes, sequence, self.live.clone()));
        match resource {
            Ok(resource) => {
                let len = resource.bytes().map_or(0, |bytes| bytes.len());
                if let Some(previous) = slot.current.replace(resource) {
                    previous.release();
                }
                slot.published = sequence;
                slot.consecutive_failures = 0;
                slot.poll_state = PollState::Success;
                log::debug!("published frame {sequence} ({len} bytes)");
                let _ = self.events.send(PollerEvent::FrameUpdated { sequence, len });
                Completion::Published
            }
            Err(err) => {
                slot.consecutive_failures = slot.consecutive_failures.saturating_add(1);
                slot.poll_state = PollState::Failed;
                let consecutive_failures = slot.consecutive_failures;
                let kind = err.kind().unwrap_or(ErrorKind::Transport);
                log::warn!("unable to fetch frame {sequence} ({consecutive_failures} failures in a row): {err}");
                let _ = self.events.send(PollerEvent::FetchFailed { sequence, kind, consecutive_failures });

                if self.max_consecutive_failures.is_some_and(|max| consecutive_failures >= max) {
                    slot.status = PollerStatus::Degraded;
                    log::error!("frame source failed {consecutive_failures} times in a row, keeping the last frame");
                    let _ = self.events.send(PollerEvent::Degraded { consecutive_failures });
                    Completion::Degraded
                } else {
                    Completion::Failed(consecutive_failures)
                }
            }
        }
    }

    fn stop(&self) {
        {
            let mut slot = self.lock();
            if slot.status == PollerStatus::Stopped {
                return;
            }
            slot.status = PollerStatus::Stopped;
            slot.poll_state = PollState::Idle;
            if let Some(current) = slot.current.take() {
                current.release();
            }
        }
        self.stop.notify_one();
    }
}

/// Handle to a running frame poller
///
/// Dropping the handle stops the poller.
pub struct PollerHandle {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
    config: PollerConfig,
}

impl PollerHandle {
    /// stop issuing requests and release the current frame
    ///
    /// a fetch which is still in flight is discarded when it arrives. calling this more than once does nothing
    pub fn stop(&self) {
        self.shared.stop();
        if let Some(task) = self.task.lock().expect("lock should not be poisoned").take() {
            task.abort();
            log::info!("stopped polling {}", self.config.endpoint);
        }
    }

    /// the frame which should currently be displayed
    pub fn current_frame(&self) -> Option<DisplayResource> {
        self.shared.lock().current.clone()
    }

    /// receive notifications about updated frames, failures and degradation
    pub fn subscribe(&self) -> broadcast::Receiver<PollerEvent> {
        self.shared.events.subscribe()
    }

    pub fn status(&self) -> PollerStatus {
        self.shared.lock().status
    }

    pub fn poll_state(&self) -> PollState {
        self.shared.lock().poll_state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.shared.lock().consecutive_failures
    }

    /// number of requests handed to the frame source so far
    pub fn issued_requests(&self) -> u64 {
        self.shared.lock().issued
    }

    /// number of frames which were created and not yet released
    pub fn live_resources(&self) -> usize {
        let _slot = self.shared.lock();
        self.shared.live.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// start polling the configured endpoint over http
pub fn start(config: PollerConfig) -> Result<PollerHandle, Error> {
    config.validate()?;
    let source = HttpFrameSource::new(config.request_timeout)?;
    start_with_source(config, source)
}

/// start polling with a custom frame source
///
/// has to be called from within a tokio runtime
pub fn start_with_source<S: FrameSource>(config: PollerConfig, source: S) -> Result<PollerHandle, Error> {
    config.validate()?;
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| Error::NoRuntime)?;

    let shared = Arc::new(Shared::new(config.max_consecutive_failures));
    log::info!("polling {} every {:?}", config.endpoint, config.interval);
    let task = runtime.spawn(run(shared.clone(), config.clone(), source));

    Ok(PollerHandle { shared, task: Mutex::new(Some(task)), config })
}

type InFlight<'a> = Pin<Box<dyn Future<Output = (u64, Result<Bytes, Error>)> + Send + 'a>>;

async fn run<S: FrameSource>(shared: Arc<Shared>, config: PollerConfig, source: S) {
    let mut ticker = time::interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: Option<InFlight<'_>> = None;
    let mut issued_at = Instant::now();

    loop {
        tokio::select! {
            _ = shared.stop.notified() => break,
            tick = ticker.tick() => {
                if in_flight.is_some() {
                    log::debug!("skipping tick, previous frame is still outstanding");
                    continue;
                }
                let Some(request) = shared.issue(&config) else { break };
                issued_at = tick;
                let source = &source;
                in_flight = Some(Box::pin(async move {
                    let result = source.fetch(&request).await;
                    (request.sequence(), result)
                }));
            }
            (sequence, result) = async { in_flight.as_mut().expect("guarded by the branch condition").await }, if in_flight.is_some() => {
                in_flight = None;
                match shared.complete(sequence, result) {
                    Completion::Published | Completion::Discarded => {}
                    Completion::Failed(consecutive_failures) => {
                        let delay = config.backoff.delay(consecutive_failures);
                        if !delay.is_zero() {
                            let now = Instant::now();
                            let next = next_tick(issued_at, config.interval, now).max(now + delay);
                            log::debug!("backing off for {:?}", next - now);
                            ticker.reset_at(next);
                        }
                    }
                    Completion::Degraded => break,
                }
            }
        }
    }
    log::debug!("poll loop for {} finished", config.endpoint);
}

/// first tick of the regular schedule starting at `issued_at` which lies after `now`
fn next_tick(issued_at: Instant, interval: Duration, now: Instant) -> Instant {
    let elapsed = now.saturating_duration_since(issued_at);
    let periods = (elapsed.as_nanos() / interval.as_nanos().max(1)) + 1;
    let periods = u32::try_from(periods).unwrap_or(u32::MAX);
    interval.checked_mul(periods).map_or(now + interval, |offset| issued_at + offset)
}
