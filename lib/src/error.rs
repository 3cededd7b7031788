use reqwest::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unable to reach frame source: {0}")]
    Transport(reqwest::Error),
    #[error("frame source answered with status {0}")]
    Server(StatusCode),
    #[error("payload is not a usable image: {0}")]
    Decode(String),
    #[error("invalid poller config: {0}")]
    InvalidConfig(String),
    #[error("a poller can only be started from within a tokio runtime")]
    NoRuntime,
}

/// coarse category of a failed fetch, carried by poller notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Server,
    Decode,
}

impl Error {
    /// category of a fetch failure, `None` for errors which never come out of a fetch
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Transport(_) => Some(ErrorKind::Transport),
            Error::Server(_) => Some(ErrorKind::Server),
            Error::Decode(_) => Some(ErrorKind::Decode),
            Error::InvalidConfig(_) | Error::NoRuntime => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Transport => f.write_str("transport"),
            ErrorKind::Server => f.write_str("server"),
            ErrorKind::Decode => f.write_str("decode"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_errors_carry_a_kind() {
        assert_eq!(Error::Server(StatusCode::BAD_GATEWAY).kind(), Some(ErrorKind::Server));
        assert_eq!(Error::Decode(String::from("empty")).kind(), Some(ErrorKind::Decode));
        assert_eq!(Error::InvalidConfig(String::from("interval")).kind(), None);
    }

    #[test]
    fn server_error_mentions_status() {
        let err = Error::Server(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "frame source answered with status 503 Service Unavailable");
    }
}
