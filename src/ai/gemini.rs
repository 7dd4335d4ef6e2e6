//! Implements the `GenAi` trait against the Gemini REST API using `reqwest`.

use crate::ai::{GenAi, ImageRequest, TextRequest};
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

/// Failures of the Gemini REST API.
#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    #[error("Gemini API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Generation was blocked: {0}")]
    Blocked(String),

    #[error("The response contained no text")]
    EmptyResponse,
}

impl From<reqwest::Error> for GeminiError {
    /// Drops the request URL so the error text never carries credentials.
    fn from(e: reqwest::Error) -> Self {
        GeminiError::Network(e.without_url())
    }
}

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Talks to `{api_base}/models/{model}:{method}`. The API key is sent in a header, never in the
/// URL.
pub struct GeminiClient {
    api_key: String,
    api_base: Url,
    text_model: String,
    image_model: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Url,
        text_model: impl Into<String>,
        image_model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_base,
            text_model: text_model.into(),
            image_model: image_model.into(),
            client: Client::new(),
        }
    }

    fn api_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}",
            self.api_base.as_str().trim_end_matches('/'),
            model,
            method
        )
    }

    async fn post<Req, Resp>(&self, url: &str, body: &Req) -> std::result::Result<Resp, GeminiError>
    where
        Req: Serialize + Sync,
        Resp: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl GenAi for GeminiClient {
    async fn generate_content(&self, request: &TextRequest) -> Result<String> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(request.prompt.clone()),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: request.response_schema.clone(),
            },
        };
        debug!(
            model = %self.text_model,
            prompt_len = request.prompt.len(),
            "Sending generateContent request"
        );
        let url = self.api_url(&self.text_model, "generateContent");
        let response: GenerateContentResponse = self.post(&url, &body).await?;
        if let Some(reason) = response
            .prompt_feedback
            .and_then(|feedback| feedback.block_reason)
        {
            return Err(GeminiError::Blocked(reason).into());
        }
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or(GeminiError::EmptyResponse)?;
        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(GeminiError::Blocked("SAFETY".to_string()).into());
        }
        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        if text.trim().is_empty() {
            return Err(GeminiError::EmptyResponse.into());
        }
        trace!("generateContent returned {} bytes", text.len());
        Ok(text)
    }

    async fn generate_images(&self, request: &ImageRequest) -> Result<Vec<String>> {
        let body = PredictRequest {
            instances: vec![PredictInstance {
                prompt: request.prompt.clone(),
            }],
            parameters: PredictParameters {
                sample_count: request.count,
                aspect_ratio: request.aspect_ratio.clone(),
                output_options: OutputOptions {
                    mime_type: request.mime_type.clone(),
                },
            },
        };
        debug!(model = %self.image_model, "Sending predict request");
        let url = self.api_url(&self.image_model, "predict");
        let response: PredictResponse = self.post(&url, &body).await?;
        Ok(response
            .predictions
            .into_iter()
            .filter_map(|p| p.bytes_base64_encoded)
            .collect())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

/// Only text parts are used; other part kinds deserialize with `text: None`.
#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: Vec<PredictInstance>,
    parameters: PredictParameters,
}

#[derive(Debug, Serialize)]
struct PredictInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
    aspect_ratio: String,
    output_options: OutputOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputOptions {
    mime_type: String,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base: &str) -> GeminiClient {
        GeminiClient::new(
            "k3y",
            Url::parse(base).unwrap(),
            "gemini-2.5-flash",
            "imagen-3.0-generate-002",
        )
    }

    #[test]
    fn test_api_url() {
        let c = client("https://generativelanguage.googleapis.com/v1beta");
        assert_eq!(
            c.api_url("gemini-2.5-flash", "generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
        let c = client("http://localhost:8080/v1beta/");
        assert_eq!(
            c.api_url("imagen-3.0-generate-002", "predict"),
            "http://localhost:8080/v1beta/models/imagen-3.0-generate-002:predict"
        );
    }

    #[tokio::test]
    async fn test_network_error_does_not_reveal_api_key() {
        let c = GeminiClient::new(
            "SECRET-KEY-123",
            Url::parse("http://127.0.0.1:1/v1beta").unwrap(),
            "m",
            "i",
        );
        let request = TextRequest {
            prompt: "hi".to_string(),
            response_schema: json!({}),
        };
        let err = c.generate_content(&request).await.unwrap_err();
        let text = format!("{err:#} {err:?}");
        assert!(text.contains("Network error"), "{text}");
        assert!(!text.contains("SECRET-KEY-123"), "{text}");

        let request = ImageRequest {
            prompt: "sig".to_string(),
            count: 1,
            aspect_ratio: "16:9".to_string(),
            mime_type: "image/png".to_string(),
        };
        let err = c.generate_images(&request).await.unwrap_err();
        assert!(!format!("{err:#} {err:?}").contains("SECRET-KEY-123"));
    }

    #[test]
    fn test_generate_content_request_shape() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some("hi".to_string()),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: json!({"type": "ARRAY"}),
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": {"type": "ARRAY"}
                }
            })
        );
    }

    #[test]
    fn test_predict_request_shape() {
        let body = PredictRequest {
            instances: vec![PredictInstance {
                prompt: "sig".to_string(),
            }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio: "16:9".to_string(),
                output_options: OutputOptions {
                    mime_type: "image/png".to_string(),
                },
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "instances": [{"prompt": "sig"}],
                "parameters": {
                    "sampleCount": 1,
                    "aspectRatio": "16:9",
                    "outputOptions": {"mimeType": "image/png"}
                }
            })
        );
    }

    #[test]
    fn test_parse_responses() {
        let text: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "[1,"}, {"text": "2]"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"totalTokenCount": 10}
        }))
        .unwrap();
        let parts = &text.candidates[0].content.as_ref().unwrap().parts;
        assert_eq!(parts.len(), 2);

        let images: PredictResponse = serde_json::from_value(json!({
            "predictions": [{"bytesBase64Encoded": "AQID", "mimeType": "image/png"}]
        }))
        .unwrap();
        assert_eq!(
            images.predictions[0].bytes_base64_encoded.as_deref(),
            Some("AQID")
        );
    }
}
