//! Application-wide error types.

use thiserror::Error;

use crate::chart::ChartError;
use crate::dataset::DatasetError;
use crate::llm::ProviderError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("comms error: {0}")]
    Comms(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("llm error: {0}")]
    Llm(#[from] ProviderError),

    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("chart error: {0}")]
    Chart(#[from] ChartError),
}
