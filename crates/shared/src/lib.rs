pub mod config;
mod config_env;
pub mod conversation;
pub mod llm;
pub mod preferences;
pub mod settings;
pub mod spicyness;
pub mod transcript;
