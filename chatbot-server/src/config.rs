use std::time::Duration;

use anyhow::Context;
use chatbot::{
    DEFAULT_MODEL, ModelSelection,
    huggingface::{DATASETS_BASE_URL, Endpoints, HUB_BASE_URL, INFERENCE_BASE_URL},
};

use crate::{
    session_store::DEFAULT_IDLE_TIMEOUT,
    utils::{get_env, get_env_or},
};

pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub hugging_face: HuggingFaceConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            model: ModelConfig::from_env()?,
            hugging_face: HuggingFaceConfig::from_env(),
        })
    }
}

pub struct ServerConfig {
    pub addr: String,
    /// Sessions idle for longer than this are dropped.
    pub session_idle_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let session_idle_timeout = match get_env("CHATBOT_SESSION_IDLE_SECS") {
            Ok(secs) => Duration::from_secs(
                secs.parse()
                    .context("CHATBOT_SESSION_IDLE_SECS must be a number of seconds")?,
            ),
            Err(_) => DEFAULT_IDLE_TIMEOUT,
        };

        Ok(Self {
            addr: get_env_or("CHATBOT_SERVER_ADDRESS", "127.0.0.1:8080"),
            session_idle_timeout,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct ModelConfig {
    pub default_model: ModelSelection,
}

impl ModelConfig {
    pub fn new(default_model: impl Into<String>) -> anyhow::Result<Self> {
        let default_model = ModelSelection::new(default_model);
        if !default_model.is_listed() {
            anyhow::bail!("Default model {default_model} is not one of the selectable models");
        }
        Ok(Self { default_model })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(get_env_or("CHATBOT_DEFAULT_MODEL", DEFAULT_MODEL))
    }
}

pub struct HuggingFaceConfig {
    pub token: Option<String>,
    pub endpoints: Endpoints,
}

impl HuggingFaceConfig {
    pub fn from_env() -> Self {
        Self {
            token: get_env("HF_API_TOKEN").ok(),
            endpoints: Endpoints {
                hub: get_env_or("HF_HUB_BASE_URL", HUB_BASE_URL),
                inference: get_env_or("HF_INFERENCE_BASE_URL", INFERENCE_BASE_URL),
                datasets: get_env_or("HF_DATASETS_BASE_URL", DATASETS_BASE_URL),
            },
        }
    }
}
