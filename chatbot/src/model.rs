use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

pub const AVAILABLE_MODELS: [&str; 3] = ["distilgpt2", "gpt2", "EleutherAI/gpt-neo-125M"];
pub const DEFAULT_MODEL: &str = AVAILABLE_MODELS[0];

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Identifier of a pretrained model, also the key of the [`ModelCache`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelSelection(String);

impl ModelSelection {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self(model_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the model is one of the selectable [`AVAILABLE_MODELS`].
    pub fn is_listed(&self) -> bool {
        AVAILABLE_MODELS.contains(&self.0.as_str())
    }
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelSelection {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationParams {
    pub max_length: usize,
    pub num_return_sequences: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_length: 150,
            num_return_sequences: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub generated_text: String,
}

impl Candidate {
    pub fn new(generated_text: impl Into<String>) -> Self {
        Self {
            generated_text: generated_text.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("Model {0} was not found")]
    NotFound(String),
    #[error("Model {0} is not one of the selectable models")]
    NotSelectable(String),
    #[error("Model {model} does not support text generation (task: {task})")]
    UnsupportedTask { model: String, task: String },
    #[error("Failed to load model {model}: {source}")]
    Backend {
        model: String,
        #[source]
        source: BoxError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Model returned no output")]
    Empty,
    #[error("Generation failed: {0}")]
    Backend(#[source] BoxError),
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn model_id(&self) -> &str;

    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<Vec<Candidate>, GenerationError>;
}

pub type ModelHandle = Arc<dyn TextGenerator>;

#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn load(&self, selection: &ModelSelection) -> Result<ModelHandle, ModelLoadError>;
}

/// Process-wide cache of loaded models.
///
/// Every model id maps to its own lazily initialized cell, so concurrent
/// acquisitions of one id share a single load while different ids load
/// independently. A failed load leaves the cell empty and the next
/// acquisition tries again.
pub struct ModelCache {
    provider: Box<dyn ModelProvider>,
    entries: Mutex<HashMap<ModelSelection, Arc<OnceCell<ModelHandle>>>>,
}

impl ModelCache {
    pub fn new(provider: impl ModelProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, selection: &ModelSelection) -> Result<ModelHandle, ModelLoadError> {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.entry(selection.clone()).or_default().clone()
        };

        let handle = cell
            .get_or_try_init(|| async {
                log::info!("Loading model {selection}");
                let handle = self.provider.load(selection).await;
                match &handle {
                    Ok(_) => log::info!("Model {selection} loaded"),
                    Err(err) => log::warn!("Failed to load model {selection}: {err}"),
                }
                handle
            })
            .await
            .map(Arc::clone);

        if handle.is_err() {
            self.forget(selection, cell);
        }
        handle
    }

    /// Drops the empty cell of a failed load unless another caller still holds
    /// it. `cell` must be released before the lock, otherwise the last two
    /// failing callers can both see a second holder.
    fn forget(&self, selection: &ModelSelection, cell: Arc<OnceCell<ModelHandle>>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let unused = entries.get(selection).is_some_and(|entry| {
            Arc::ptr_eq(entry, &cell) && Arc::strong_count(&cell) == 2 && !cell.initialized()
        });
        if unused {
            entries.remove(selection);
        }
        drop(cell);
        drop(entries);
    }

    /// Models that have been loaded successfully so far.
    pub fn loaded(&self) -> Vec<ModelSelection> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut loaded = entries
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(selection, _)| selection.clone())
            .collect::<Vec<_>>();
        loaded.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        loaded
    }
}
