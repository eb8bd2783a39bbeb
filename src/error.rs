//! Typed error kinds for the detection pipeline (spec §7).
//!
//! All four kinds are fatal: the driver prints the error (and, for
//! `Config`, clap's usage string) and exits with a non-zero code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HapIbdError {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Input(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("worker failed: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, HapIbdError>;
