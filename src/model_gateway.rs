use anyhow::{Context, Result};
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::config::Config;
use crate::model::Message;
use crate::providers::openrouter;

pub struct CompletionRequest {
    pub messages: Vec<Message>,
}

pub type CompletionFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + 'a>>;

/// Seam between a chat session and whatever produces completions.
pub trait CompletionGateway {
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a>;
}

/// Sends completions to the configured OpenRouter-compatible endpoint.
pub struct OpenRouterGateway {
    client: Client,
    cfg: Config,
}

impl OpenRouterGateway {
    pub fn new(cfg: Config) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = cfg.model_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .context("Failed to initialize HTTP client")?;
        Ok(Self::with_client(client, cfg))
    }

    pub fn with_client(client: Client, cfg: Config) -> Self {
        Self { client, cfg }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }
}

impl CompletionGateway for OpenRouterGateway {
    fn complete<'a>(&'a self, request: CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(async move { openrouter::chat(&self.client, &self.cfg, &request.messages).await })
    }
}
