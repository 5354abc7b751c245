use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::core::error::ProviderError;
use crate::core::provider::{CompletionProvider, CompletionRequest};

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiProvider {
    pub fn new(
        base_url: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            temperature,
            max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": convert_messages(request),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError> {
        let body = self.build_body(request);
        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            "sending chat completion"
        );

        let resp = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", request.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        parse_openai_response(&json)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// System instruction first, then the conversation in order.
fn convert_messages(request: &CompletionRequest) -> Vec<serde_json::Value> {
    let mut result = vec![serde_json::json!({
        "role": "system",
        "content": request.system_prompt,
    })];
    result.extend(request.messages.iter().map(|turn| {
        serde_json::json!({
            "role": turn.role.as_str(),
            "content": turn.content,
        })
    }));
    result
}

fn parse_openai_response(json: &serde_json::Value) -> Result<String, ProviderError> {
    let choice = json["choices"]
        .as_array()
        .and_then(|c| c.first())
        .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

    choice["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidResponse("No message content in response".into()))
}
