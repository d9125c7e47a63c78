//! Gemini Files API client.
//!
//! Implements [`ExtractionClient`] against the Gemini REST API:
//! - resumable upload to `upload/v1beta/files`
//! - `models/{model}:countTokens`
//! - `models/{model}:generateContent` with a JSON response type
//! - `DELETE v1beta/files/{name}`

use crate::{ExtractionClient, FileHandle};
use async_trait::async_trait;
use bylaw_error::{GeminiError, GeminiErrorKind, GeminiResult, StorageError, StorageErrorKind};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const PDF_MIME_TYPE: &str = "application/pdf";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// The `[gemini]` configuration table.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct GeminiConfig {
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// API root, without a trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sampling temperature for extraction
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Prompt text and optional response schema sent with every extraction.
///
/// Both are passed through to the API without interpretation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractionPrompt {
    text: String,
    schema: Option<Value>,
}

impl ExtractionPrompt {
    /// Build a prompt from in-memory parts.
    pub fn new(text: impl Into<String>, schema: Option<Value>) -> Self {
        Self {
            text: text.into(),
            schema,
        }
    }

    /// Read the prompt text and, if given, a JSON response schema from disk.
    #[instrument(skip_all, fields(prompt = %prompt.display()))]
    pub fn from_files(prompt: &Path, schema: Option<&Path>) -> Result<Self, StorageError> {
        let text = std::fs::read_to_string(prompt).map_err(|e| {
            StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                prompt.display(),
                e
            )))
        })?;

        let schema = schema
            .map(|path| {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    StorageError::new(StorageErrorKind::FileRead(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                })?;
                serde_json::from_str::<Value>(&raw).map_err(|e| {
                    StorageError::new(StorageErrorKind::Serialization(format!(
                        "Schema {} is not valid JSON: {}",
                        path.display(),
                        e
                    )))
                })
            })
            .transpose()?;

        debug!(has_schema = schema.is_some(), "Loaded extraction prompt");
        Ok(Self { text, schema })
    }

    /// Prompt text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Response schema, if any.
    pub fn schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: Option<UploadedFile>,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    total_tokens: Option<u64>,
}

/// Gemini Files API client.
#[derive(Debug, Clone)]
pub struct GeminiFilesClient {
    client: Client,
    api_key: String,
    config: GeminiConfig,
    prompt: ExtractionPrompt,
}

impl GeminiFilesClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns [`GeminiErrorKind::MissingApiKey`] for an empty key and
    /// [`GeminiErrorKind::ClientCreation`] if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        config: GeminiConfig,
        prompt: ExtractionPrompt,
    ) -> GeminiResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GeminiError::new(GeminiErrorKind::MissingApiKey));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GeminiError::new(GeminiErrorKind::ClientCreation(e.to_string())))?;

        debug!(model = %config.model, base_url = %config.base_url, "Creating Gemini Files client");
        Ok(Self {
            client,
            api_key,
            config,
            prompt,
        })
    }

    /// Model used for counting and extraction.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn model_url(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.base_url, self.config.model, method
        )
    }

    fn contents(&self, file: &FileHandle) -> Value {
        json!([{
            "parts": [
                { "text": self.prompt.text() },
                { "file_data": { "mime_type": PDF_MIME_TYPE, "file_uri": file.uri() } }
            ]
        }])
    }

    async fn post_json(&self, url: &str, body: &Value) -> GeminiResult<Response> {
        let response = self
            .client
            .post(url)
            .query(&[("key", &self.api_key)])
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await
    }
}

#[async_trait]
impl ExtractionClient for GeminiFilesClient {
    #[instrument(skip(self, path), fields(path = %path.display()))]
    async fn upload(&self, path: &Path) -> GeminiResult<FileHandle> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            GeminiError::new(GeminiErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
        })?;
        let display_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.config.base_url))
            .query(&[("key", &self.api_key)])
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", PDF_MIME_TYPE)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(transport)?;
        let start = check_status(start).await?;

        let upload_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                GeminiError::new(GeminiErrorKind::MalformedResponse(
                    "Failed to get upload URL from response headers".to_string(),
                ))
            })?;
        debug!(size = bytes.len(), "Resumable upload session opened");

        let finish = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(transport)?;
        let finish = check_status(finish).await?;

        let uploaded: UploadResponse = finish.json().await.map_err(malformed)?;
        let uri = uploaded.file.and_then(|file| file.uri).ok_or_else(|| {
            GeminiError::new(GeminiErrorKind::MalformedResponse(
                "Failed to get file URI from response".to_string(),
            ))
        })?;

        info!(uri = %uri, "File uploaded");
        Ok(FileHandle::new(uri))
    }

    #[instrument(skip(self, file), fields(uri = %file.uri()))]
    async fn count_tokens(&self, file: &FileHandle) -> GeminiResult<u64> {
        let body = json!({ "contents": self.contents(file) });
        let response = self.post_json(&self.model_url("countTokens"), &body).await?;
        let counted: CountTokensResponse = response.json().await.map_err(malformed)?;

        counted.total_tokens.ok_or_else(|| {
            GeminiError::new(GeminiErrorKind::MalformedResponse(
                "countTokens response has no totalTokens".to_string(),
            ))
        })
    }

    #[instrument(skip(self, file), fields(uri = %file.uri(), model = %self.config.model))]
    async fn generate_content(&self, file: &FileHandle, token_count: u64) -> GeminiResult<Value> {
        let mut generation_config = json!({
            "temperature": self.config.temperature,
            "responseMimeType": "application/json",
        });
        if let Some(schema) = self.prompt.schema() {
            generation_config["responseSchema"] = schema.clone();
        }
        let body = json!({
            "contents": self.contents(file),
            "generationConfig": generation_config,
        });

        let response = self.post_json(&self.model_url("generateContent"), &body).await?;
        let result: Value = response.json().await.map_err(malformed)?;

        if let Some(usage) = result.get("usageMetadata") {
            info!(token_count, usage = %usage, "Usage metadata");
        }

        Ok(extract_json(&result).unwrap_or(result))
    }

    #[instrument(skip(self, file), fields(uri = %file.uri()))]
    async fn delete(&self, file: &FileHandle) -> GeminiResult<()> {
        let name = file.name()?;
        let response = self
            .client
            .delete(format!("{}/v1beta/files/{}", self.config.base_url, name))
            .query(&[("key", &self.api_key)])
            .send()
            .await
            .map_err(transport)?;
        check_status(response).await?;

        info!(name, "File deleted successfully");
        Ok(())
    }
}

/// First `{...}` span in a candidate text part that parses as JSON.
pub fn extract_json(result: &Value) -> Option<Value> {
    let candidates = result.get("candidates")?.as_array()?;
    candidates
        .iter()
        .filter_map(|candidate| candidate.pointer("/content/parts")?.as_array())
        .flatten()
        .filter_map(|part| part.get("text")?.as_str())
        .find_map(|text| {
            let start = text.find('{')?;
            let end = text.rfind('}')?;
            if end < start {
                return None;
            }
            serde_json::from_str(&text[start..=end]).ok()
        })
}

async fn check_status(response: Response) -> GeminiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    error!(status = %status, body = %message, "Gemini API returned error");
    Err(GeminiError::new(GeminiErrorKind::HttpError {
        status_code: status.as_u16(),
        message,
    }))
}

fn transport(e: reqwest::Error) -> GeminiError {
    GeminiError::new(GeminiErrorKind::Transport(e.to_string()))
}

fn malformed(e: reqwest::Error) -> GeminiError {
    GeminiError::new(GeminiErrorKind::MalformedResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_embedded_in_text() {
        let result = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Here you go:\n{\"bylawNumber\": \"12-34\"}\nDone." }] }
            }]
        });
        assert_eq!(extract_json(&result), Some(json!({ "bylawNumber": "12-34" })));
    }

    #[test]
    fn skips_parts_without_valid_json() {
        let result = json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "no braces here" },
                    { "text": "} backwards {" },
                    { "text": "{\"ok\": true}" }
                ] }
            }]
        });
        assert_eq!(extract_json(&result), Some(json!({ "ok": true })));
    }

    #[test]
    fn no_candidates_yields_none() {
        assert_eq!(extract_json(&json!({ "promptFeedback": {} })), None);
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = GeminiFilesClient::new("  ", GeminiConfig::default(), ExtractionPrompt::default())
            .unwrap_err();
        assert_eq!(err.kind(), &GeminiErrorKind::MissingApiKey);
    }
}
