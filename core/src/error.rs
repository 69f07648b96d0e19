use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModemError {
    #[error("Channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Modem channel closed")]
    ChannelClosed,

    #[error("Call was not acknowledged after answer and line seize")]
    AnswerFailed,

    #[error("Caller hung up during answer: {0}")]
    CallDropped(String),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Invalid DLE escape at byte {0}")]
    InvalidEscape(usize),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<hound::Error> for ModemError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(io) => ModemError::Io(io),
            other => ModemError::Audio(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModemError>;
