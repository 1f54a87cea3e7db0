use std::{io, result};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("corruption: {0}")]
    Corruption(String),

    #[error("io error: {source}")]
    IOError {
        #[from]
        source: io::Error,
    },
}

impl Error {
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Error::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

pub type Result<T> = result::Result<T, Error>;
