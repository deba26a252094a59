//! Chat Completion API
//!
//! Request and response shapes for the Azure OpenAI chat-completion endpoint,
//! including the "on your data" search extension. The client itself is
//! generic; these are provided for callers that don't bring their own.

use serde::{Deserialize, Serialize};

/// A message in a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user" or "assistant"
    pub role: String,

    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Chat completion request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,

    pub temperature: f32,

    pub top_p: f32,

    pub max_tokens: u32,

    /// Stop sequence(s); a string or an array
    pub stop: Option<serde_json::Value>,

    pub stream: bool,

    /// Search sources for grounded answers; omitted when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_sources: Vec<DataSource>,
}

impl ChatRequest {
    /// Create a request with sampling defaults of temperature 0.7, top_p 0.95
    /// and 800 max tokens
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: 0.7,
            top_p: 0.95,
            max_tokens: 800,
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_data_source(mut self, source: DataSource) -> Self {
        self.data_sources.push(source);
        self
    }
}

/// A search data source attached to a request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSource {
    /// e.g. "azure_search"
    #[serde(rename = "type")]
    pub source_type: String,

    pub parameters: SearchParameters,
}

impl DataSource {
    pub fn azure_search(parameters: SearchParameters) -> Self {
        Self {
            source_type: "azure_search".to_string(),
            parameters,
        }
    }
}

/// Search index parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParameters {
    #[serde(rename = "endpoint")]
    pub search_endpoint: String,

    pub index_name: String,

    pub semantic_configuration: String,

    pub query_type: String,

    pub fields_mapping: FieldsMapping,

    pub in_scope: bool,

    pub role_information: String,

    pub filter: Option<serde_json::Value>,

    pub strictness: u8,

    pub top_n_documents: u32,

    pub authentication: SearchAuthentication,
}

impl Default for SearchParameters {
    fn default() -> Self {
        Self {
            search_endpoint: String::new(),
            index_name: String::new(),
            semantic_configuration: String::new(),
            query_type: String::new(),
            fields_mapping: FieldsMapping::default(),
            in_scope: false,
            role_information: String::new(),
            filter: None,
            strictness: 3,
            top_n_documents: 0,
            authentication: SearchAuthentication::default(),
        }
    }
}

/// Maps index fields onto citation fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldsMapping {
    pub content_fields_separator: String,

    pub content_fields: Vec<String>,

    #[serde(rename = "filepath_field")]
    pub file_path_field: String,

    pub title_field: String,

    pub url_field: String,

    pub vector_fields: Vec<String>,
}

/// Search service credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchAuthentication {
    /// e.g. "api_key"
    #[serde(rename = "type")]
    pub auth_type: String,

    #[serde(rename = "key")]
    pub search_key: String,
}

/// Chat completion response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatResponse {
    pub id: String,

    pub model: String,

    pub created: u64,

    pub object: String,

    pub usage: Option<Usage>,

    pub system_fingerprint: Option<String>,

    pub choices: Vec<Choice>,
}

/// A choice in the completion response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Choice {
    pub index: u32,

    pub finish_reason: Option<String>,

    pub message: ResponseMessage,
}

/// Assistant message, with grounding context when data sources were used
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseMessage {
    pub role: String,

    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_turn: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<MessageContext>,
}

/// Retrieval context attached to an extension response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageContext {
    pub citations: Vec<Citation>,

    pub intent: Option<String>,
}

/// A document cited by the answer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Citation {
    pub content: String,

    pub title: Option<String>,

    pub url: Option<String>,

    #[serde(rename = "filepath")]
    pub file_path: Option<String>,

    pub chunk_id: Option<String>,
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u32,

    pub completion_tokens: u32,

    pub total_tokens: u32,
}

impl ChatResponse {
    /// Content of the first choice
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }

    /// Citations of the first choice, empty when there is no context
    pub fn citations(&self) -> &[Citation] {
        self.choices
            .first()
            .and_then(|c| c.message.context.as_ref())
            .map(|ctx| ctx.citations.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("You are terse."),
            ChatMessage::user("Hello"),
        ])
        .with_temperature(0.5)
        .with_max_tokens(100);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["max_tokens"], 100);
        assert_eq!(json["stream"], false);
        assert!(json["stop"].is_null());
        assert!(json.get("data_sources").is_none());
    }

    #[test]
    fn test_request_with_data_source() {
        let parameters = SearchParameters {
            search_endpoint: "https://search.example.net".to_string(),
            index_name: "docs".to_string(),
            fields_mapping: FieldsMapping {
                content_fields: vec!["content".to_string()],
                file_path_field: "path".to_string(),
                ..Default::default()
            },
            authentication: SearchAuthentication {
                auth_type: "api_key".to_string(),
                search_key: "k".to_string(),
            },
            ..Default::default()
        };
        let request = ChatRequest::new(vec![ChatMessage::user("q")])
            .with_data_source(DataSource::azure_search(parameters));

        let json = serde_json::to_value(&request).unwrap();
        let source = &json["data_sources"][0];
        assert_eq!(source["type"], "azure_search");
        assert_eq!(source["parameters"]["endpoint"], "https://search.example.net");
        assert_eq!(source["parameters"]["strictness"], 3);
        assert_eq!(source["parameters"]["fields_mapping"]["filepath_field"], "path");
        assert_eq!(source["parameters"]["authentication"]["key"], "k");
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1677652288,
            "model": "gpt-4",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "Hello!"
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": 5,
                "total_tokens": 15
            }
        }"#;

        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.id, "chatcmpl-123");
        assert_eq!(response.content(), Some("Hello!"));
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_extension_response_citations() {
        let json = r#"{
            "id": "x",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "See [doc1].",
                    "end_turn": true,
                    "context": {
                        "citations": [{"content": "body", "title": "Guide", "filepath": "guide.md", "chunk_id": "0"}],
                        "intent": "[\"guide\"]"
                    }
                }
            }]
        }"#;

        let response: ChatResponse = serde_json::from_str(json).unwrap();
        let citations = response.citations();
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].file_path.as_deref(), Some("guide.md"));
        assert_eq!(response.choices[0].message.end_turn, Some(true));
    }
}
