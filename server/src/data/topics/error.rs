//! Topic error types

use thiserror::Error;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Error type for topic operations
#[derive(Debug, Error)]
pub enum TopicError {
    #[error("channel closed")]
    ChannelClosed,

    /// Byte budget exhausted (backpressure)
    #[error("buffer full")]
    BufferFull,

    #[error("receiver lagged by {0} messages")]
    Lagged(u64),

    #[error("topic '{0}' already exists with different type")]
    TypeMismatch(String),
}

impl From<RecvError> for TopicError {
    fn from(err: RecvError) -> Self {
        match err {
            RecvError::Closed => TopicError::ChannelClosed,
            RecvError::Lagged(n) => TopicError::Lagged(n),
        }
    }
}

/// `Empty` is not an error and is handled by `Subscriber::try_recv`
impl From<TryRecvError> for TopicError {
    fn from(err: TryRecvError) -> Self {
        match err {
            TryRecvError::Empty | TryRecvError::Closed => TopicError::ChannelClosed,
            TryRecvError::Lagged(n) => TopicError::Lagged(n),
        }
    }
}
