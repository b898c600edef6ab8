use protocol::{ArenaError, FrameError};
use thiserror::Error;

/// Everything that can go wrong on the agent side.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The arena could not be reached at all.
    #[error("cannot reach the arena at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },
    /// The callback endpoint could not be opened.
    #[error("cannot bind the callback endpoint {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// The derived callback port does not fit.
    #[error("no callback port left for reference {0}")]
    PortOverflow(u32),
    /// The arena refused the registration.
    #[error("registration refused")]
    RegistrationRefused,
    /// The connection to the arena broke.
    #[error("transport failed: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("illegal frame: {0}")]
    Frame(#[from] FrameError),
    /// The arena closed the connection, with its reason.
    #[error("arena closed the connection: {0}")]
    Closed(String),
    /// The arena refused a single call. The game goes on.
    #[error("arena refused the call: {0}")]
    Rejected(#[from] ArenaError),
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),
}

impl AgentError {
    /// Anything but a refused call ends the agent.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AgentError::Rejected(_))
    }
}
