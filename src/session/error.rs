use std::sync::PoisonError;

use crate::core::GameError;

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("client connection failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("client did not answer within {secs}s")]
    ReadTimeout { secs: u64 },
    #[error("both player slots are taken")]
    NoSlotAvailable,
    #[error("failed to lock inner mutex: {reason}")]
    MutexPoison { reason: String },
    #[error(transparent)]
    Game(#[from] GameError),
}

impl<T> From<PoisonError<T>> for SessionError {
    fn from(value: PoisonError<T>) -> Self {
        Self::MutexPoison {
            reason: value.to_string(),
        }
    }
}

impl SessionError {
    /// `true` for failures that mean the client is gone.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ReadTimeout { .. })
    }
}
