use std::env;

pub fn get_env(name: &str) -> anyhow::Result<String> {
    env::var(name).map_err(|_| anyhow::anyhow!("Environment variable {name} not found"))
}

pub fn get_env_or(name: &str, default: &str) -> String {
    get_env(name).unwrap_or_else(|_| default.to_string())
}
