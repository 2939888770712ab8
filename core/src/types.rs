use serde::{Deserialize, Serialize};

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role/content pair, as exchanged with the relay and the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Body of `POST /api/ocean-chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayChatRequest {
    pub messages: Vec<ChatMessage>,
}

/// Body of `POST /api/generate-query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateQueryRequest {
    pub prompt: String,
}

/// Response of `POST /api/generate-query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateQueryResponse {
    pub result: String,
}

/// Request to the provider's chat-completions endpoint
#[derive(Serialize, Debug)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Non-streaming completion response
#[derive(Deserialize, Debug)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// One `data:` payload of a streamed completion
#[derive(Deserialize, Debug)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub error: Option<ProviderErrorDetail>,
}

#[derive(Deserialize, Debug)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental content carried by a chunk
#[derive(Deserialize, Debug, Default)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Error envelope returned by OpenAI-compatible providers
#[derive(Deserialize, Debug)]
pub struct ProviderErrorBody {
    pub error: ProviderErrorDetail,
}

#[derive(Deserialize, Debug)]
pub struct ProviderErrorDetail {
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_value(ChatMessage::user("What data is available?")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "user", "content": "What data is available?"})
        );
    }

    #[test]
    fn test_completion_request_omits_unset_temperature() {
        let request = ChatCompletionRequest {
            model: "openai/gpt-oss-120b".into(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            stream: true,
            temperature: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_chunk_tolerates_missing_fields() {
        let chunk: ChatCompletionChunk =
            serde_json::from_str(r#"{"id":"x","choices":[{"index":0,"delta":{}}]}"#).unwrap();
        assert_eq!(chunk.choices.len(), 1);
        assert!(chunk.choices[0].delta.content.is_none());
        assert!(chunk.error.is_none());
    }
}
