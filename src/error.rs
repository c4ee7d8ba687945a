use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid address or mask: {0}")]
    BadAddress(String),

    #[error("filter list is full ({0} entries)")]
    Full(usize),

    #[error("no filter matches {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FilterError>;
