use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    /// The hub task has exited; no further events can be delivered.
    #[error("broadcast hub is not running")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, HubError>;
