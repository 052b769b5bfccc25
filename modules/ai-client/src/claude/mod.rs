mod client;
pub(crate) mod types;

use anyhow::{anyhow, Result};

use crate::schema::StructuredOutput;
use client::ClaudeClient;
use types::*;

/// Claude agent configured for structured extraction.
#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    base_url: Option<String>,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> ClaudeClient {
        let client = ClaudeClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    /// Extract a typed value by forcing a tool call whose input schema is
    /// derived from `T`.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<T> {
        let value = self
            .extract_value(T::tool_schema(), system_prompt, user_prompt)
            .await?;
        serde_json::from_value(value).map_err(|e| anyhow!("Failed to deserialize response: {}", e))
    }

    /// Extract against an explicit JSON schema, returning the raw tool input.
    /// Used when the output schema is assembled at runtime rather than derived
    /// from a Rust type.
    pub async fn extract_value(
        &self,
        schema: serde_json::Value,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<serde_json::Value> {
        let tool_name = "structured_response";
        let mut request = ChatRequest::new(&self.model)
            .system(system_prompt)
            .message(WireMessage::user(user_prompt))
            .temperature(0.0)
            .tool(ToolDefinitionWire {
                name: tool_name.to_string(),
                description: "Extract structured data from the input.".to_string(),
                input_schema: schema,
            });
        request.tool_choice = Some(serde_json::json!({
            "type": "tool",
            "name": tool_name,
        }));

        let response = self.client().chat(&request).await?;

        response
            .tool_input()
            .cloned()
            .ok_or_else(|| anyhow!("No structured output in Claude response"))
    }

    /// Plain text completion. Used for ad hoc prompts outside the extraction path.
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .system(system)
            .message(WireMessage::user(user))
            .temperature(0.0);

        let response = self.client().chat(&request).await?;

        response
            .text()
            .ok_or_else(|| anyhow!("No response from Claude"))
    }
}
