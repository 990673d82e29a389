mod dataset;
pub mod huggingface;
mod message;
mod model;
mod session;

pub use dataset::{
    DATASET_SAMPLE_SIZE, DatasetError, DatasetPreview, DatasetProvider, PREVIEW_LEN, Record,
    RecordStream, load_preview,
};
pub use message::{Message, Role, Transcript};
pub use model::{
    AVAILABLE_MODELS, BoxError, Candidate, DEFAULT_MODEL, GenerationError, GenerationParams,
    ModelCache, ModelHandle, ModelLoadError, ModelProvider, ModelSelection, TextGenerator,
};
pub use session::{ChatError, ChatSession, SessionState};
