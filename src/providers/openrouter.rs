use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::model::Message;
use crate::providers::http_errors::completion_request_error;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

fn request_body<'a>(cfg: &'a Config, messages: &'a [Message]) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model: &cfg.model,
        messages,
        max_tokens: cfg.max_tokens,
    }
}

fn extract_reply(body: &str) -> Result<String> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).context("Failed to parse chat completion response")?;

    if let Some(error) = parsed.error {
        return Err(anyhow!(
            "Completion endpoint returned an error: {}",
            error.message
        ));
    }

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Chat completion response contained no choices"))?;
    choice
        .message
        .content
        .ok_or_else(|| anyhow!("Chat completion choice had no message content"))
}

fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ChatCompletionResponse>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .map(|error| error.message)
}

/// Posts the full message list and returns `choices[0].message.content`.
pub async fn chat(client: &Client, cfg: &Config, messages: &[Message]) -> Result<String> {
    let body = request_body(cfg, messages);
    debug!(
        api_url = %cfg.api_url,
        model = %cfg.model,
        message_count = messages.len(),
        max_tokens = cfg.max_tokens,
        "sending chat completion request"
    );

    let mut request = client
        .post(&cfg.api_url)
        .header("HTTP-Referer", &cfg.site_url)
        .header("X-Title", &cfg.site_name)
        .json(&body);
    match cfg.api_key.as_deref() {
        Some(key) => request = request.bearer_auth(key),
        None => warn!("OPENROUTER_API_KEY is not set; sending unauthenticated request"),
    }

    let response = request.send().await.map_err(|err| {
        warn!(
            api_url = %cfg.api_url,
            model = %cfg.model,
            error = %err,
            "chat completion request failed"
        );
        completion_request_error(err, &cfg.api_url, cfg.model_timeout_secs)
    })?;

    let status = response.status();
    let response_body = response
        .text()
        .await
        .context("Failed to read chat completion response body")?;

    if !status.is_success() {
        warn!(
            api_url = %cfg.api_url,
            model = %cfg.model,
            status = %status,
            response_body_len = response_body.len(),
            "completion endpoint returned non-success status"
        );
        let detail = api_error_message(&response_body).unwrap_or(response_body);
        return Err(anyhow!(
            "Completion request failed with status {}: {}",
            status,
            detail
        ));
    }

    let reply = extract_reply(&response_body)?;
    debug!(
        model = %cfg.model,
        response_len = reply.len(),
        "received chat completion response"
    );
    Ok(reply)
}
