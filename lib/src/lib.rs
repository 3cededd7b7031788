pub mod backoff;
pub mod config;
pub mod error;
pub mod frame;
pub mod image;
pub mod poller;

pub use backoff::Backoff;
pub use config::PollerConfig;
pub use error::{Error, ErrorKind};
pub use frame::{FrameRequest, FrameSource, HttpFrameSource, PayloadKind};
pub use self::image::DisplayResource;
pub use poller::{PollState, PollerEvent, PollerHandle, PollerStatus, start, start_with_source};
