//! HTTP client for the generation provider
//!
//! One call = one prompt (optionally with inlined image bytes) against one
//! credential. Authentication depends on the credential kind: standard keys
//! ride in a `key` query parameter, privileged tokens in an
//! `Authorization: Bearer` header.
//!
//! Model fallback is local to a call: the primary model is tried first and
//! *any* failure retries the identical request on the fallback model with
//! the same credential before the error surfaces to the rotation layer.

use serde_json::{Value, json};
use tracing::debug;

use crate::credential::{Credential, CredentialKind};
use crate::image::{ImageData, to_data_uri};
use crate::{ProviderError, Result};

/// A single generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    /// Inlined source image, when the operation transforms an upload.
    pub image: Option<ImageData>,
    /// Whether the response should include generated image bytes
    /// (text-only analysis operations leave this false).
    pub want_image: bool,
}

impl GenerateRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
            want_image: false,
        }
    }

    pub fn image(prompt: impl Into<String>, image: Option<ImageData>) -> Self {
        Self {
            prompt: prompt.into(),
            image,
            want_image: true,
        }
    }
}

/// Parsed generation result: any text parts plus any images as data URIs.
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    pub text: Option<String>,
    pub images: Vec<String>,
}

impl GenerateResponse {
    /// First generated image, if any.
    pub fn first_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Client for the generation provider.
pub struct GenClient {
    http: reqwest::Client,
    base_url: String,
    primary_model: String,
    fallback_model: String,
}

impl GenClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        primary_model: impl Into<String>,
        fallback_model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            primary_model: primary_model.into(),
            fallback_model: fallback_model.into(),
        }
    }

    /// Run a generation request with model fallback on the given credential.
    pub async fn generate(
        &self,
        credential: &Credential,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        match self
            .generate_with_model(&self.primary_model, credential, request)
            .await
        {
            Ok(response) => Ok(response),
            Err(e) => {
                debug!(
                    model = %self.primary_model,
                    fallback = %self.fallback_model,
                    error = %e,
                    "primary model failed, retrying on fallback model"
                );
                self.generate_with_model(&self.fallback_model, credential, request)
                    .await
            }
        }
    }

    async fn generate_with_model(
        &self,
        model: &str,
        credential: &Credential,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        let url = format!(
            "{}/v1/models/{model}:generateContent",
            self.base_url.trim_end_matches('/')
        );

        let mut req = self.http.post(&url).json(&build_payload(request));
        req = match credential.kind() {
            CredentialKind::StandardKey => req.query(&[("key", credential.token())]),
            CredentialKind::PrivilegedToken => req.bearer_auth(credential.token()),
        };

        let response = req.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if !(200..300).contains(&status) {
            return Err(ProviderError::Http { status, body });
        }
        parse_response(&body)
    }
}

/// Build the provider wire payload for a request.
fn build_payload(request: &GenerateRequest) -> Value {
    let mut parts = vec![json!({ "text": request.prompt })];
    if let Some(image) = &request.image {
        parts.push(json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": image.base64,
            }
        }));
    }

    let modalities = if request.want_image {
        json!(["TEXT", "IMAGE"])
    } else {
        json!(["TEXT"])
    };

    json!({
        "contents": [{ "parts": parts }],
        "generationConfig": { "responseModalities": modalities },
    })
}

/// Extract text and image parts from a provider response body.
fn parse_response(body: &str) -> Result<GenerateResponse> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("not JSON: {e}")))?;

    let parts = value
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| ProviderError::InvalidResponse("no candidate parts".into()))?;

    let mut texts: Vec<&str> = Vec::new();
    let mut images = Vec::new();
    for part in parts {
        if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
            texts.push(text);
        }
        if let Some(inline) = part.get("inlineData") {
            let mime = inline
                .get("mimeType")
                .and_then(|m| m.as_str())
                .unwrap_or("image/png");
            if let Some(data) = inline.get("data").and_then(|d| d.as_str()) {
                images.push(to_data_uri(mime, data));
            }
        }
    }

    if texts.is_empty() && images.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "candidate contained neither text nor image parts".into(),
        ));
    }

    let text = if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    };
    Ok(GenerateResponse { text, images })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_text_only() {
        let payload = build_payload(&GenerateRequest::text("describe this design"));
        assert_eq!(
            payload["contents"][0]["parts"][0]["text"],
            "describe this design"
        );
        assert_eq!(payload["contents"][0]["parts"].as_array().unwrap().len(), 1);
        assert_eq!(
            payload["generationConfig"]["responseModalities"],
            json!(["TEXT"])
        );
    }

    #[test]
    fn payload_with_inline_image() {
        let request = GenerateRequest::image(
            "remove the background",
            Some(ImageData {
                mime_type: "image/png".into(),
                base64: "aGk=".into(),
            }),
        );
        let payload = build_payload(&request);
        let parts = payload["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "aGk=");
        assert_eq!(
            payload["generationConfig"]["responseModalities"],
            json!(["TEXT", "IMAGE"])
        );
    }

    #[test]
    fn parse_text_response() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"a minimalist bottle"}]}}]}"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.text.as_deref(), Some("a minimalist bottle"));
        assert!(response.images.is_empty());
    }

    #[test]
    fn parse_image_response_as_data_uri() {
        let body = r#"{"candidates":[{"content":{"parts":[
            {"inlineData":{"mimeType":"image/png","data":"aGk="}}
        ]}}]}"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.first_image(), Some("data:image/png;base64,aGk="));
        assert!(response.text.is_none());
    }

    #[test]
    fn parse_mixed_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[
            {"text":"variant one"},
            {"inlineData":{"mimeType":"image/jpeg","data":"aGk="}},
            {"text":"notes"}
        ]}}]}"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.text.as_deref(), Some("variant one\nnotes"));
        assert_eq!(response.images.len(), 1);
    }

    #[test]
    fn parse_missing_mime_defaults_to_png() {
        let body = r#"{"candidates":[{"content":{"parts":[
            {"inlineData":{"data":"aGk="}}
        ]}}]}"#;
        let response = parse_response(body).unwrap();
        assert_eq!(response.first_image(), Some("data:image/png;base64,aGk="));
    }

    #[test]
    fn parse_no_candidates_is_invalid() {
        let err = parse_response(r#"{"candidates":[]}"#).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn parse_empty_parts_is_invalid() {
        let body = r#"{"candidates":[{"content":{"parts":[]}}]}"#;
        let err = parse_response(body).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn parse_non_json_is_invalid() {
        let err = parse_response("<html>502</html>").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}
