use crate::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("no final answer after {0} iterations")]
    MaxIterations(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
