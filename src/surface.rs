use std::path::PathBuf;

use dekho_live_view_lib::{DisplayResource, PollerEvent, PollerHandle};
use tokio::sync::broadcast::error::RecvError;

/// why a surface stopped following its poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finished {
    /// the poller gave up, the last frame is still on disk
    Degraded,
    /// the poller was stopped
    Closed,
}

/// Display surface without a window
///
/// Keeps the most recent frame in a file when a path is configured and logs every frame otherwise.
pub struct HeadlessSurface {
    path: Option<PathBuf>,
}

impl HeadlessSurface {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// show a single frame
    ///
    /// the file is replaced in one step so readers never see a partially written frame
    pub fn render(&self, frame: &DisplayResource) -> std::io::Result<()> {
        let Some(bytes) = frame.bytes() else {
            log::debug!("frame {} was superseded before it could be written", frame.sequence());
            return Ok(());
        };
        let Some(path) = &self.path else {
            log::info!("frame {}: {}x{} {:?}", frame.sequence(), frame.width(), frame.height(), frame.format());
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut partial = path.clone().into_os_string();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        std::fs::write(&partial, &bytes)?;
        std::fs::rename(&partial, path)?;
        log::debug!("wrote frame {} to {}", frame.sequence(), path.display());
        Ok(())
    }

    /// render every frame the poller publishes until it degrades or stops
    pub async fn follow(&self, poller: &PollerHandle) -> Finished {
        let mut events = poller.subscribe();
        loop {
            match events.recv().await {
                Ok(PollerEvent::FrameUpdated { .. }) | Err(RecvError::Lagged(_)) => {
                    if let Some(frame) = poller.current_frame() {
                        if let Err(err) = self.render(&frame) {
                            log::error!("unable to write frame {}: {err}", frame.sequence());
                        }
                    }
                }
                Ok(PollerEvent::FetchFailed { .. }) => {}
                Ok(PollerEvent::Degraded { consecutive_failures }) => {
                    log::error!("frame source is unavailable after {consecutive_failures} failed requests");
                    return Finished::Degraded;
                }
                Err(RecvError::Closed) => return Finished::Closed,
            }
        }
    }
}
