//! OpenAI Responses API client
//!
//! SECURITY: the API key is only sent to the configured base URL, which
//! defaults to the official OpenAI endpoint.

use super::streaming::SseDecoder;
use super::{LlmError, RawResponseEvent, UploadedFile};
use crate::core::upload::FileStorage;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Official OpenAI API root
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Abort the turn if the server goes quiet for this long between chunks
const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(120);

/// Body of a streamed `/responses` call
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub instructions: String,
    pub input: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<super::HostedTool>,
    pub stream: bool,
}

#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    stream_timeout: Duration,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Start a streamed response and decode it into raw events
    ///
    /// Payloads that are not valid event JSON are logged and skipped. The
    /// stream yields `LlmError::Network` if no bytes arrive within the
    /// configured timeout.
    pub async fn stream_response(
        &self,
        request: &ResponsesRequest,
    ) -> Result<BoxStream<'static, Result<RawResponseEvent, LlmError>>, LlmError> {
        tracing::debug!(
            model = %request.model,
            input_items = request.input.len(),
            tools = request.tools.len(),
            "Sending streamed request to Responses API"
        );

        let response = self
            .client
            .post(self.url("responses"))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(LlmError::from_network_error)?;
        let response = check_status(response).await?;

        let mut bytes = Box::pin(response.bytes_stream());
        let timeout = self.stream_timeout;

        let stream = async_stream::try_stream! {
            let mut decoder = SseDecoder::new();
            loop {
                let next = tokio::time::timeout(timeout, bytes.next())
                    .await
                    .map_err(|_| {
                        LlmError::Network(format!(
                            "Stream timeout - no data for {} seconds",
                            timeout.as_secs()
                        ))
                    })?;

                let (frames, ended) = match next {
                    Some(chunk) => {
                        let chunk = chunk.map_err(LlmError::from_network_error)?;
                        (decoder.push(&chunk), false)
                    }
                    None => (decoder.finish(), true),
                };

                for frame in frames {
                    if frame.data == "[DONE]" {
                        continue;
                    }
                    match serde_json::from_str::<RawResponseEvent>(&frame.data) {
                        Ok(event) => {
                            yield event;
                        }
                        Err(e) => tracing::debug!(
                            event = ?frame.event,
                            "Skipping undecodable stream payload: {}",
                            e
                        ),
                    }
                }

                if ended {
                    break;
                }
            }
        };

        Ok(stream.boxed())
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(LlmError::from_network_error)?;
        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    tracing::error!("OpenAI API request failed ({}): {}", status, error_text);
    Err(LlmError::from_http_status(status, error_text))
}

#[async_trait]
impl FileStorage for OpenAiClient {
    async fn create_file(
        &self,
        name: &str,
        bytes: Vec<u8>,
        purpose: &str,
    ) -> Result<UploadedFile, LlmError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("purpose", purpose.to_string())
            .part("file", part);

        let response = self
            .client
            .post(self.url("files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(LlmError::from_network_error)?;
        let response = check_status(response).await?;

        response
            .json::<UploadedFile>()
            .await
            .map_err(|e| LlmError::Decode(format!("file upload response: {}", e)))
    }

    async fn attach_to_vector_store(
        &self,
        vector_store_id: &str,
        file_id: &str,
    ) -> Result<(), LlmError> {
        let path = format!("vector_stores/{}/files", vector_store_id);
        self.post_json(&path, &serde_json::json!({ "file_id": file_id }))
            .await?;
        Ok(())
    }

    async fn delete_file(&self, file_id: &str) -> Result<(), LlmError> {
        let response = self
            .client
            .delete(self.url(&format!("files/{}", file_id)))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(LlmError::from_network_error)?;
        check_status(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::HostedTool;
    use serde_json::json;

    #[test]
    fn test_url_joining() {
        let client = OpenAiClient::new("sk-test").with_base_url("http://127.0.0.1:9/v1/");
        assert_eq!(client.base_url(), "http://127.0.0.1:9/v1");
        assert_eq!(client.url("responses"), "http://127.0.0.1:9/v1/responses");
        assert_eq!(client.url("/files/f_1"), "http://127.0.0.1:9/v1/files/f_1");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = OpenAiClient::new("sk-secret");
        assert!(!format!("{:?}", client).contains("sk-secret"));
    }

    #[test]
    fn test_request_serialization() {
        let request = ResponsesRequest {
            model: "gpt-4.1".to_string(),
            instructions: "be nice".to_string(),
            input: vec![json!({"role": "user", "content": "hi"})],
            tools: vec![HostedTool::WebSearch],
            stream: true,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "gpt-4.1",
                "instructions": "be nice",
                "input": [{"role": "user", "content": "hi"}],
                "tools": [{"type": "web_search"}],
                "stream": true
            })
        );
    }

    #[test]
    fn test_request_without_tools_omits_field() {
        let request = ResponsesRequest {
            model: "m".to_string(),
            instructions: String::new(),
            input: Vec::new(),
            tools: Vec::new(),
            stream: true,
        };
        assert!(serde_json::to_value(&request).unwrap().get("tools").is_none());
    }
}
