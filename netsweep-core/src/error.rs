//! Error types.

use std::io;

pub type Result<T> = core::result::Result<T, Error>;

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}

/// Crate-wide error type.
///
/// Covers everything that can go wrong before or around a sweep run.
/// Failures of individual tasks are not errors at this level, see
/// [`InvokeError`] instead.
///
/// [`InvokeError`]: ../invoker/enum.InvokeError.html
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IoError(String),

    #[error("toml deserialization error: {0}")]
    TomlDeserError(#[from] toml::de::Error),
    #[error("toml serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error("invalid routing protocol: {0} (expected one of: aodv, dsr, olsr, dsdv)")]
    InvalidRoutingProtocol(String),
    #[error("invalid topology: {0} (expected one of: grid, disc)")]
    InvalidTopology(String),

    #[error("invalid sweep configuration: {0}")]
    InvalidConfig(String),
    #[error("argument can't be quoted: {0:?}")]
    UnquotableArgument(String),
    #[error("config file already exists: {0}")]
    ConfigExists(String),
}
