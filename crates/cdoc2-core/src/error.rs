use thiserror::Error;

pub type Cdoc2Result<T> = Result<T, Cdoc2Error>;

#[derive(Debug, Error)]
pub enum Cdoc2Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
