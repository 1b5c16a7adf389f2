use std::{error, fmt, io};

/// Error type for `taskpool`
#[derive(Debug)]
pub enum Error {
    /// std::io::Error raised while spawning a worker thread
    Spawn(io::Error),
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::Spawn(value)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "unable to spawn a worker thread: {}", e),
        }
    }
}

impl error::Error for Error {
    // benefit from default implementations
}
