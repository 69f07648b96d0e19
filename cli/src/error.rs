use callscreen_core::ModemError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot open serial port {path}: {source}")]
    Serial {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error(transparent)]
    Modem(#[from] ModemError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("call loop task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
