use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Input errors (dropped and logged, never fatal)
    #[error("Invalid UID: {0}")]
    InvalidUid(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Invalid balance: {0}")]
    InvalidBalance(String),

    // Transport errors (logged, the bridge keeps running)
    #[error("Transport error: {0}")]
    Transport(String),

    // Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for errors that must abort startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::MissingConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
