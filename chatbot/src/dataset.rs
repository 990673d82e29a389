use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream::BoxStream};
use serde::Serialize;

use crate::model::BoxError;

/// Number of records requested from a dataset.
pub const DATASET_SAMPLE_SIZE: usize = 1000;
/// Number of records shown in a preview.
pub const PREVIEW_LEN: usize = 3;

pub type Record = serde_json::Value;
pub type RecordStream = BoxStream<'static, Result<Record, DatasetError>>;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Dataset identifier must not be empty")]
    EmptyIdentifier,
    #[error("Dataset {0} was not found")]
    NotFound(String),
    #[error("Dataset {0} has no train split")]
    NoTrainSplit(String),
    #[error("Invalid dataset record: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Failed to load dataset {dataset}: {source}")]
    Backend {
        dataset: String,
        #[source]
        source: BoxError,
    },
}

#[async_trait]
pub trait DatasetProvider: Send + Sync {
    /// Opens a lazy stream over at most `limit` records of the train split.
    async fn stream(&self, dataset_id: &str, limit: usize) -> Result<RecordStream, DatasetError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetPreview {
    pub dataset: String,
    pub sample_size: usize,
    pub records: Vec<Record>,
}

pub async fn load_preview(
    provider: &dyn DatasetProvider,
    dataset_id: &str,
) -> Result<DatasetPreview, DatasetError> {
    let dataset_id = dataset_id.trim();
    if dataset_id.is_empty() {
        return Err(DatasetError::EmptyIdentifier);
    }

    log::info!("Loading dataset {dataset_id}");
    let records = provider
        .stream(dataset_id, DATASET_SAMPLE_SIZE)
        .await?
        .take(PREVIEW_LEN)
        .try_collect::<Vec<_>>()
        .await
        .inspect_err(|err| log::warn!("Failed to load dataset {dataset_id}: {err}"))?;

    Ok(DatasetPreview {
        dataset: dataset_id.to_string(),
        sample_size: DATASET_SAMPLE_SIZE,
        records,
    })
}
