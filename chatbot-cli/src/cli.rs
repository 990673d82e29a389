use chatbot::DEFAULT_MODEL;

#[derive(clap::Parser)]
#[command(about = "Chat with a small text-generation model from the terminal")]
pub struct Cli {
    /// Model to chat with
    #[arg(long, env = "CHATBOT_DEFAULT_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,
    /// Hugging Face dataset name or url to preview before chatting
    #[arg(long)]
    pub dataset: Option<String>,
    #[arg(long, env = "HF_API_TOKEN", hide_env_values = true)]
    pub hf_api_token: Option<String>,
    #[arg(long, env = "HF_HUB_BASE_URL")]
    pub hub_url: Option<String>,
    #[arg(long, env = "HF_INFERENCE_BASE_URL")]
    pub inference_url: Option<String>,
    #[arg(long, env = "HF_DATASETS_BASE_URL")]
    pub datasets_url: Option<String>,
}
