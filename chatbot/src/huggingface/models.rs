use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{
    Candidate, GenerationError, GenerationParams, ModelHandle, ModelLoadError, ModelProvider,
    ModelSelection, TextGenerator,
    huggingface::{Client, Endpoints, HuggingFaceError, read_json},
};

const TEXT_GENERATION: &str = "text-generation";

/// Resolves model ids against the Hugging Face hub and hands out generators
/// backed by the hosted inference api.
pub struct HuggingFaceModels {
    client: Client,
    endpoints: Endpoints,
}

impl HuggingFaceModels {
    pub fn new(endpoints: Endpoints, token: Option<String>) -> Self {
        Self {
            client: Client::new(token),
            endpoints,
        }
    }
}

#[async_trait]
impl ModelProvider for HuggingFaceModels {
    async fn load(&self, selection: &ModelSelection) -> Result<ModelHandle, ModelLoadError> {
        let model = selection.as_str();
        let backend = |err: HuggingFaceError| ModelLoadError::Backend {
            model: model.to_string(),
            source: Box::new(err),
        };

        let url = format!("{}/api/models/{}", self.endpoints.hub, model);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| backend(err.into()))?;

        // the hub answers 401 for repos that do not exist or are gated
        if matches!(resp.status(), StatusCode::NOT_FOUND | StatusCode::UNAUTHORIZED) {
            return Err(ModelLoadError::NotFound(model.to_string()));
        }

        let info: json_model::ModelInfo = read_json(resp).await.map_err(backend)?;
        match info.pipeline_tag.as_deref() {
            None | Some(TEXT_GENERATION) => {}
            Some(task) => {
                return Err(ModelLoadError::UnsupportedTask {
                    model: model.to_string(),
                    task: task.to_string(),
                });
            }
        }

        Ok(Arc::new(HuggingFaceGenerator {
            client: self.client.clone(),
            url: format!("{}/models/{}", self.endpoints.inference, model),
            model: model.to_string(),
        }))
    }
}

pub struct HuggingFaceGenerator {
    client: Client,
    url: String,
    model: String,
}

#[async_trait]
impl TextGenerator for HuggingFaceGenerator {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<Vec<Candidate>, GenerationError> {
        use json_model::*;

        let req_body = GenerateRequest {
            inputs: prompt,
            parameters: Parameters {
                max_length: params.max_length,
                num_return_sequences: params.num_return_sequences,
            },
            options: Options {
                wait_for_model: true,
            },
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&req_body)
            .send()
            .await
            .map_err(|err| GenerationError::Backend(Box::new(HuggingFaceError::from(err))))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|err| GenerationError::Backend(Box::new(HuggingFaceError::from(err))))?;

        if !status.is_success() {
            // prefer the api's own message over the raw body
            let body = serde_json::from_str::<ErrorResponse>(&body)
                .map(|err| err.error)
                .unwrap_or(body);
            return Err(GenerationError::Backend(Box::new(HuggingFaceError::Api {
                status,
                body,
            })));
        }

        serde_json::from_str::<Vec<Candidate>>(&body)
            .map_err(|err| GenerationError::Backend(Box::new(HuggingFaceError::from(err))))
    }
}

mod json_model {
    use serde::{Deserialize, Serialize};

    #[derive(Deserialize)]
    pub struct ModelInfo {
        #[serde(default)]
        pub pipeline_tag: Option<String>,
    }

    #[derive(Serialize)]
    pub struct GenerateRequest<'a> {
        pub inputs: &'a str,
        pub parameters: Parameters,
        pub options: Options,
    }

    #[derive(Serialize)]
    pub struct Parameters {
        pub max_length: usize,
        pub num_return_sequences: usize,
    }

    #[derive(Serialize)]
    pub struct Options {
        pub wait_for_model: bool,
    }

    #[derive(Deserialize)]
    pub struct ErrorResponse {
        pub error: String,
    }
}
