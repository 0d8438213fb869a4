//! Error types for the core library.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("identifier {0:?} is not a valid hex value for this ring")]
    InvalidIdentifier(String),
}
