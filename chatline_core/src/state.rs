use std::fmt;

/// Turn-taking state of the controller. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// User message appended, its persistence not yet confirmed.
    Sending,
    AwaitingResponse,
    /// Terminal for the failed turn; the controller moves straight back to `Idle`.
    Error(String),
}

impl SessionState {
    /// True exactly while a turn is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Sending | Self::AwaitingResponse)
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Sending => f.write_str("sending"),
            Self::AwaitingResponse => f.write_str("awaiting response"),
            Self::Error(reason) => write!(f, "error: {reason}"),
        }
    }
}
