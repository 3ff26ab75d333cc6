use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub(crate) enum Error {
    #[error("Config Error - {0}")]
    ParseConfig(String),

    #[error("Pipeline Error - {0}")]
    Pipeline(#[from] seqops::Error),
}
