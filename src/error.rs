//! Error types shared by the library and both binaries.

use thiserror::Error;

/// Catch-all error for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A bad or inconsistent command-line configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A problem with an input file: missing, truncated, or malformed.
    #[error("input error: {0}")]
    Input(String),

    /// A dimension, plan, or index invariant was violated by the caller.
    #[error("logic error: {0}")]
    Logic(String),

    /// An FFT plan could not be created or executed.
    #[error("fft error: {0}")]
    Fft(String),

    /// An MPI call returned a non-success code.
    #[error("mpi error in {function}")]
    Mpi {
        /// Name of the MPI wrapper function that failed.
        function: &'static str,
    },

    /// Any other error, wrapped without copying its message.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Error::Input(msg.into())
    }

    pub fn logic(msg: impl Into<String>) -> Self {
        Error::Logic(msg.into())
    }
}
