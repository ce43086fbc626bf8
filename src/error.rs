use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no legal actions available")]
    NoLegalActions,

    #[error("illegal action: {0}")]
    IllegalAction(String),

    #[error("invalid board: {0}")]
    InvalidBoard(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("game has not started yet")]
    GameNotStarted,

    #[error("action channel closed")]
    ChannelClosed,

    #[error("no action delivered within {0:?}")]
    NoActionInTime(Duration),

    #[error(transparent)]
    Logger(#[from] log::SetLoggerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
