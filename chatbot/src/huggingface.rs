use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

pub mod datasets;
pub mod models;

pub use datasets::HuggingFaceDatasets;
pub use models::{HuggingFaceGenerator, HuggingFaceModels};

pub const HUB_BASE_URL: &str = "https://huggingface.co";
pub const INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co";
pub const DATASETS_BASE_URL: &str = "https://datasets-server.huggingface.co";

/// Base urls of the Hugging Face services, overridable for self-hosted mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub hub: String,
    pub inference: String,
    pub datasets: String,
}

impl Endpoints {
    /// Points every service at the same base url.
    pub fn single(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            hub: base_url.clone(),
            inference: base_url.clone(),
            datasets: base_url,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            hub: HUB_BASE_URL.to_string(),
            inference: INFERENCE_BASE_URL.to_string(),
            datasets: DATASETS_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HuggingFaceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Hugging Face API error {status}: {body}")]
    Api { status: StatusCode, body: String },
}

/// Shared http plumbing of the Hugging Face collaborators.
#[derive(Debug, Clone)]
pub(crate) struct Client {
    http: reqwest::Client,
    token: Option<String>,
}

impl Client {
    pub(crate) fn new(token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
        }
    }

    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.authorize(self.http.get(url))
    }

    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.authorize(self.http.post(url))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

/// Reads the body of a successful response as json, or turns it into an api error.
pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, HuggingFaceError> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        return Err(HuggingFaceError::Api { status, body });
    }

    Ok(serde_json::from_str(&body)?)
}
