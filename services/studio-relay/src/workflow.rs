//! Studio workflows
//!
//! Each action is a prompt template plus a call path through the rotation
//! executor. Image-producing actions demand an image back from the provider
//! and treat a text-only reply as an invalid response, so a failed slot in a
//! batch is omitted rather than surfaced as a blank card.
//!
//! A request may carry its own key. That key bypasses the pools entirely:
//! one attempt, no rotation, no pacing, and the provider's verdict comes
//! back unchanged.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use credential_pool::Executor;
use provider::{Credential, GenClient, GenerateRequest, GenerateResponse, ImageData, ProviderError};
use tracing::warn;

use crate::config::CleanupPolicy;
use crate::error::ApiError;

const REDESIGN_VARIANTS: usize = 6;
const SPLIT_COMPONENTS: usize = 4;

const CLEANUP_PROMPT: &str = "Remove the background from this product photo. \
     Return the product alone on a clean neutral background, keeping edges, \
     reflections and natural shadows intact.";

const ANALYZE_PROMPT: &str = "Analyze this product's design. Describe its form, \
     materials, color palette, typography and overall brand impression in a \
     short structured summary.";

const REDESIGN_DIRECTIVES: [&str; REDESIGN_VARIANTS] = [
    "Use a bold, saturated color palette.",
    "Use a minimalist monochrome treatment.",
    "Give it a premium, luxury finish.",
    "Give it a playful, youthful look.",
    "Use an eco-friendly, natural-materials aesthetic.",
    "Give it a retro, vintage-inspired styling.",
];

const SPLIT_TARGETS: [&str; SPLIT_COMPONENTS] = [
    "the cap or closure",
    "the label or printed artwork",
    "the main body",
    "the outer packaging",
];

const MOCKUP_PROMPT_PREFIX: &str = "Place this product into the following scene: ";

/// The studio's operations, bound to a rotation executor and provider client.
pub struct Studio {
    executor: Executor,
    client: GenClient,
    cleanup_policy: CleanupPolicy,
}

impl Studio {
    pub fn new(executor: Executor, client: GenClient, cleanup_policy: CleanupPolicy) -> Self {
        Self {
            executor,
            client,
            cleanup_policy,
        }
    }

    /// Strip the background from a product photo. Returns a data URI.
    ///
    /// Failure handling follows the configured policy: propagate the error,
    /// or degrade by returning the untouched input.
    pub async fn cleanup(
        &self,
        image: &str,
        user_key: Option<&str>,
    ) -> Result<String, ApiError> {
        let parsed = parse_image(image)?;
        let request = GenerateRequest::image(CLEANUP_PROMPT, Some(parsed));
        match self.run_image(&request, user_key).await {
            Ok(uri) => Ok(uri),
            Err(e) if self.cleanup_policy == CleanupPolicy::ReturnOriginal => {
                warn!(error = %e, "cleanup failed, returning original image");
                Ok(image.to_string())
            }
            Err(e) => Err(e),
        }
    }

    /// Describe the product's design. Returns prose.
    pub async fn analyze(&self, image: &str, user_key: Option<&str>) -> Result<String, ApiError> {
        let parsed = parse_image(image)?;
        let request = GenerateRequest {
            prompt: ANALYZE_PROMPT.into(),
            image: Some(parsed),
            want_image: false,
        };
        let response = self.run(&request, user_key).await?;
        response.text.ok_or_else(|| {
            ApiError::Rotation(
                ProviderError::InvalidResponse("analysis returned no text".into()).into(),
            )
        })
    }

    /// Produce up to six styled redesign variants. Partial results are fine.
    pub async fn redesign(
        &self,
        image: &str,
        style: Option<&str>,
        user_key: Option<&str>,
    ) -> Result<Vec<String>, ApiError> {
        let parsed = parse_image(image)?;
        let requests: Vec<GenerateRequest> = REDESIGN_DIRECTIVES
            .iter()
            .map(|directive| {
                let prompt = match style {
                    Some(style) => format!(
                        "Redesign this product in the following style: {style}. {directive} \
                         Keep the product category recognizable. \
                         Return a single photorealistic image."
                    ),
                    None => format!(
                        "Redesign this product. {directive} Keep the product category \
                         recognizable. Return a single photorealistic image."
                    ),
                };
                GenerateRequest::image(&prompt, Some(parsed.clone()))
            })
            .collect();
        self.run_image_set(requests, user_key).await
    }

    /// Rework the design following a free-form instruction. Returns a data URI.
    pub async fn remix(
        &self,
        image: &str,
        instruction: &str,
        user_key: Option<&str>,
    ) -> Result<String, ApiError> {
        if instruction.trim().is_empty() {
            return Err(ApiError::BadRequest("instruction must not be empty".into()));
        }
        let parsed = parse_image(image)?;
        let prompt = format!(
            "Rework this product design following this instruction: {instruction}. \
             Return a single photorealistic image."
        );
        let request = GenerateRequest::image(&prompt, Some(parsed));
        self.run_image(&request, user_key).await
    }

    /// Isolate up to four distinct components of the product.
    pub async fn split(
        &self,
        image: &str,
        user_key: Option<&str>,
    ) -> Result<Vec<String>, ApiError> {
        let parsed = parse_image(image)?;
        let requests: Vec<GenerateRequest> = SPLIT_TARGETS
            .iter()
            .map(|target| {
                let prompt = format!(
                    "Isolate {target} of this product on a neutral background. \
                     Return a single image of just that component."
                );
                GenerateRequest::image(&prompt, Some(parsed.clone()))
            })
            .collect();
        self.run_image_set(requests, user_key).await
    }

    /// Drop the product into a described scene. Returns a data URI.
    pub async fn mockup(
        &self,
        image: &str,
        scene: &str,
        user_key: Option<&str>,
    ) -> Result<String, ApiError> {
        if scene.trim().is_empty() {
            return Err(ApiError::BadRequest("scene must not be empty".into()));
        }
        let parsed = parse_image(image)?;
        let prompt = format!(
            "{MOCKUP_PROMPT_PREFIX}{scene}. Match the scene's lighting and \
             perspective. Return a single photorealistic image."
        );
        let request = GenerateRequest::image(&prompt, Some(parsed));
        self.run_image(&request, user_key).await
    }

    /// One provider call through the rotation path, or a single direct
    /// attempt when the request carries its own key.
    async fn run(
        &self,
        request: &GenerateRequest,
        user_key: Option<&str>,
    ) -> Result<GenerateResponse, ApiError> {
        match user_key {
            Some(key) => {
                let credential = Credential::new(key);
                self.client
                    .generate(&credential, request)
                    .await
                    .map_err(|e| ApiError::Rotation(e.into()))
            }
            None => {
                let client = &self.client;
                self.executor
                    .execute_with_retry(|attempt| async move {
                        client.generate(&attempt.credential, request).await
                    })
                    .await
                    .map_err(ApiError::from)
            }
        }
    }

    async fn run_image(
        &self,
        request: &GenerateRequest,
        user_key: Option<&str>,
    ) -> Result<String, ApiError> {
        let response = self.run(request, user_key).await?;
        extract_image(response).map_err(|e| ApiError::Rotation(e.into()))
    }

    /// Run one request per prepared prompt, collecting whichever slots
    /// succeed. Each invocation of the batch op picks the next prompt.
    async fn run_image_set(
        &self,
        requests: Vec<GenerateRequest>,
        user_key: Option<&str>,
    ) -> Result<Vec<String>, ApiError> {
        match user_key {
            Some(key) => {
                let credential = Credential::new(key);
                let mut images = Vec::with_capacity(requests.len());
                for request in &requests {
                    match self.client.generate(&credential, request).await {
                        Ok(response) => match extract_image(response) {
                            Ok(uri) => images.push(uri),
                            Err(e) => warn!(error = %e, "batch slot returned no image"),
                        },
                        Err(e) => warn!(error = %e, "batch slot failed with user key"),
                    }
                }
                Ok(images)
            }
            None => {
                let client = &self.client;
                let cursor = Arc::new(AtomicUsize::new(0));
                let requests = &requests;
                let images = self
                    .executor
                    .generate_set(requests.len(), move |attempt| {
                        let slot = cursor.fetch_add(1, Ordering::Relaxed) % requests.len();
                        async move {
                            let response =
                                client.generate(&attempt.credential, &requests[slot]).await?;
                            extract_image(response)
                        }
                    })
                    .await;
                Ok(images)
            }
        }
    }
}

fn parse_image(image: &str) -> Result<ImageData, ApiError> {
    provider::parse_data_uri(image).ok_or_else(|| {
        ApiError::BadRequest("invalid image: expected a base64 data URI".into())
    })
}

fn extract_image(response: GenerateResponse) -> provider::Result<String> {
    response
        .first_image()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidResponse("provider returned no image".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redesign_directives_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for d in REDESIGN_DIRECTIVES {
            assert!(seen.insert(d), "duplicate directive: {d}");
        }
        assert_eq!(seen.len(), REDESIGN_VARIANTS);
    }

    #[test]
    fn split_targets_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for t in SPLIT_TARGETS {
            assert!(seen.insert(t), "duplicate target: {t}");
        }
        assert_eq!(seen.len(), SPLIT_COMPONENTS);
    }

    #[test]
    fn parse_image_rejects_plain_base64() {
        let err = parse_image("aGVsbG8=").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn extract_image_prefers_first() {
        let response = GenerateResponse {
            text: None,
            images: vec!["data:image/png;base64,YQ==".into(), "second".into()],
        };
        assert_eq!(
            extract_image(response).unwrap(),
            "data:image/png;base64,YQ=="
        );
    }

    #[test]
    fn extract_image_without_image_is_invalid_response() {
        let response = GenerateResponse {
            text: Some("only words".into()),
            images: vec![],
        };
        assert!(matches!(
            extract_image(response),
            Err(ProviderError::InvalidResponse(_))
        ));
    }
}
