use base64::Engine;
use garde::Validate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::analysis::VisionAnalysis;
use crate::models::asset::{MediaKind, MediaSource};
use crate::models::brand::BrandGuidelines;
use crate::services::extract::{self, ExtractError};
use crate::services::retry::{with_retry, FailureKind, RetryError, RetryPolicy, Retryable};
use crate::services::upstream::{check_response, UpstreamError};

const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp", "image/gif"];
const SUPPORTED_VIDEO_TYPES: &[&str] = &["video/mp4", "video/quicktime", "video/webm"];

/// Client for the multimodal vision/video understanding service (Gemini API).
pub struct VisionClient {
    http: Client,
    api_base: String,
    model: String,
    api_key: String,
    inline_limit_bytes: u64,
    retry: RetryPolicy,
}

/// Extracted verdicts plus the raw JSON kept for audit.
#[derive(Debug, Clone, Serialize)]
pub struct VisionReport {
    pub analysis: VisionAnalysis,
    pub raw: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl VisionClient {
    pub fn new(
        api_base: &str,
        model: &str,
        api_key: &str,
        inline_limit_bytes: u64,
        retry: RetryPolicy,
    ) -> Result<Self, VisionError> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(180))
            .build()
            .map_err(UpstreamError::Http)?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            inline_limit_bytes,
            retry,
        })
    }

    /// Fetch the asset, validate it, and ask the model for per-dimension verdicts.
    pub async fn analyze(
        &self,
        media: &MediaSource,
        guidelines: &BrandGuidelines,
    ) -> Result<VisionReport, RetryError<VisionError>> {
        let kind = self.preflight(media).map_err(RetryError::Permanent)?;
        self.analyze_checked(media, kind, guidelines).await
    }

    /// `analyze` for media that already passed `preflight`.
    pub async fn analyze_checked(
        &self,
        media: &MediaSource,
        kind: MediaKind,
        guidelines: &BrandGuidelines,
    ) -> Result<VisionReport, RetryError<VisionError>> {
        let bytes = with_retry(&self.retry, "asset download", || self.fetch_media(&media.url)).await?;
        validate_container(&bytes, &media.mime_type, kind).map_err(RetryError::Permanent)?;

        tracing::debug!(
            mime_type = %media.mime_type,
            size_bytes = bytes.len(),
            "Submitting asset to vision service"
        );

        let request_body = build_request(&bytes, &media.mime_type, guidelines);
        with_retry(&self.retry, "vision analysis", || self.generate(&request_body)).await
    }

    /// Checks that need no network: declared type and known size.
    pub fn preflight(&self, media: &MediaSource) -> Result<MediaKind, VisionError> {
        let kind = validate_declared_type(&media.mime_type)?;
        if let Some(size) = media.size_bytes {
            self.check_size(size)?;
        }
        Ok(kind)
    }

    async fn fetch_media(&self, url: &str) -> Result<Vec<u8>, VisionError> {
        let response = self.http.get(url).send().await.map_err(|e| VisionError::Download(e.into()))?;
        let mut response = check_response("asset storage", response)
            .await
            .map_err(VisionError::Download)?;

        if let Some(len) = response.content_length() {
            self.check_size(len)?;
        }

        // Without a Content-Length the ceiling is enforced while streaming.
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| VisionError::Download(e.into()))? {
            bytes.extend_from_slice(&chunk);
            self.check_size(bytes.len() as u64)?;
        }
        Ok(bytes)
    }

    async fn generate(&self, request_body: &serde_json::Value) -> Result<VisionReport, VisionError> {
        let url = format!("{}/models/{}:generateContent", self.api_base, self.model);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request_body)
            .send()
            .await
            .map_err(UpstreamError::Http)?;
        let response = check_response("vision service", response).await?;
        let body: GenerateResponse = response.json().await.map_err(UpstreamError::Http)?;

        let candidate = body
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| VisionError::EmptyResponse("no candidates".to_string()))?;
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(VisionError::EmptyResponse(format!(
                "finish reason {}",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        let raw = extract::extract_value(&text)?;
        let analysis: VisionAnalysis = extract::from_extracted(raw.clone(), &text)?;
        analysis.validate()?;

        Ok(VisionReport { analysis, raw })
    }

    fn check_size(&self, size: u64) -> Result<(), VisionError> {
        if size >= self.inline_limit_bytes {
            return Err(VisionError::TooLarge {
                size,
                limit: self.inline_limit_bytes,
            });
        }
        Ok(())
    }
}

/// Reject MIME types the vision service cannot decode before fetching anything.
pub fn validate_declared_type(mime_type: &str) -> Result<MediaKind, VisionError> {
    let mime = mime_type.trim().to_ascii_lowercase();
    if SUPPORTED_IMAGE_TYPES.contains(&mime.as_str()) {
        return Ok(MediaKind::Image);
    }
    if SUPPORTED_VIDEO_TYPES.contains(&mime.as_str()) {
        return Ok(MediaKind::Video);
    }

    let advice = match mime.as_str() {
        "image/heic" | "image/heif" => "convert HEIC to JPEG or PNG and re-upload",
        "video/x-matroska" | "video/avi" | "video/x-msvideo" => "re-export as MP4 (H.264) and re-upload",
        m if m.starts_with("image/") => "use JPEG, PNG, WebP or GIF",
        m if m.starts_with("video/") => "use MP4 (H.264), MOV or WebM",
        _ => "only images and videos can be analyzed",
    };
    Err(VisionError::Unsupported(format!("{mime_type} is not supported: {advice}")))
}

/// Check that the bytes match the declared container and codec.
pub fn validate_container(bytes: &[u8], mime_type: &str, kind: MediaKind) -> Result<(), VisionError> {
    match kind {
        MediaKind::Image => {
            image::guess_format(bytes).map_err(|_| {
                VisionError::Unsupported(
                    "file content is not a recognised image; re-export as JPEG, PNG or WebP".to_string(),
                )
            })?;
        }
        MediaKind::Video if mime_type.eq_ignore_ascii_case("video/webm") => {
            if !bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
                return Err(VisionError::Unsupported(
                    "file content is not a valid WebM container; re-export as MP4 (H.264)".to_string(),
                ));
            }
        }
        MediaKind::Video => {
            if bytes.len() < 8 || &bytes[4..8] != b"ftyp" {
                return Err(VisionError::Unsupported(
                    "file content is not a valid MP4/MOV container; re-export as MP4 (H.264)".to_string(),
                ));
            }
            if contains_hevc_track(bytes) {
                return Err(VisionError::Unsupported(
                    "video is encoded with HEVC (H.265), which the analysis service cannot decode; \
                     convert HEVC to H.264 and re-upload"
                        .to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn contains_hevc_track(bytes: &[u8]) -> bool {
    bytes.windows(4).any(|w| w == b"hvc1" || w == b"hev1")
}

fn build_request(bytes: &[u8], mime_type: &str, guidelines: &BrandGuidelines) -> serde_json::Value {
    json!({
        "contents": [{
            "parts": [
                {
                    "inline_data": {
                        "mime_type": mime_type,
                        "data": base64::engine::general_purpose::STANDARD.encode(bytes),
                    }
                },
                { "text": build_prompt(guidelines) }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "temperature": 0.2
        }
    })
}

fn build_prompt(guidelines: &BrandGuidelines) -> String {
    let guideline_doc = json!({
        "brand_name": guidelines.name,
        "industry": guidelines.industry,
        "color_palette": guidelines.color_palette,
        "tone_keywords": guidelines.tone_keywords,
        "approved_vocabulary": guidelines.approved_terms,
        "banned_vocabulary": guidelines.banned_terms,
        "required_disclaimers": guidelines.required_disclaimers,
        "logo_guidelines": guidelines.logo_guidelines,
    });

    format!(
        concat!(
            "You are a brand compliance reviewer. Evaluate the attached creative against these brand guidelines:\n",
            "{}\n\n",
            "Return ONLY a JSON object with keys logo_compliance, color_compliance, tone_compliance, ",
            "disclaimer_compliance, layout_compliance and content_type_analysis.\n",
            "Each *_compliance value is {{\"status\": \"pass\"|\"warn\"|\"fail\", \"notes\": string, ",
            "\"business_impact\": string, \"citations\": [{{\"timestamp\": string, \"location\": string, ",
            "\"description\": string, \"severity\": \"low\"|\"medium\"|\"high\"|\"critical\"}}]}}.\n",
            "content_type_analysis is {{\"classification\": \"UGC\"|\"Branded\"|\"Non-Marketing\", ",
            "\"confidence\": number between 0 and 1, \"signals\": {{\"marketing_intent\": bool, ",
            "\"product_focus\": bool, \"call_to_action\": bool, \"camera_stability\": string, ",
            "\"production_quality\": string}}, \"reasoning\": string}}.\n",
            "Classify as Non-Marketing when there is no promotional intent."
        ),
        guideline_doc
    )
}

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Unsupported media: {0}")]
    Unsupported(String),

    #[error(
        "Asset is {size} bytes, at or above the {limit}-byte inline limit; \
         analysis of larger assets is not supported yet"
    )]
    TooLarge { size: u64, limit: u64 },

    #[error("Asset download failed: {0}")]
    Download(UpstreamError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("Vision service returned no content ({0})")]
    EmptyResponse(String),

    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("Vision response failed validation: {0}")]
    Invalid(#[from] garde::Report),
}

impl Retryable for VisionError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            VisionError::Download(e) | VisionError::Upstream(e) => e.failure_kind(),
            VisionError::EmptyResponse(_) => FailureKind::Transient,
            _ => FailureKind::Permanent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp4_header(brand: &[u8; 4]) -> Vec<u8> {
        let mut bytes = vec![0, 0, 0, 24];
        bytes.extend_from_slice(b"ftyp");
        bytes.extend_from_slice(brand);
        bytes.extend_from_slice(&[0; 32]);
        bytes
    }

    #[test]
    fn test_declared_type() {
        assert_eq!(validate_declared_type("video/mp4").unwrap(), MediaKind::Video);
        assert_eq!(validate_declared_type("IMAGE/PNG").unwrap(), MediaKind::Image);

        let err = validate_declared_type("image/heic").unwrap_err();
        assert!(err.to_string().contains("convert HEIC"));
        assert!(validate_declared_type("application/pdf").is_err());
    }

    #[test]
    fn test_hevc_is_rejected_with_advice() {
        let mut bytes = mp4_header(b"isom");
        bytes.extend_from_slice(b"....stsd....hvc1....");
        let err = validate_container(&bytes, "video/mp4", MediaKind::Video).unwrap_err();
        assert!(err.to_string().contains("convert HEVC to H.264"));
        assert_eq!(err.failure_kind(), FailureKind::Permanent);
    }

    #[test]
    fn test_h264_mp4_passes() {
        let mut bytes = mp4_header(b"isom");
        bytes.extend_from_slice(b"....stsd....avc1....");
        assert!(validate_container(&bytes, "video/mp4", MediaKind::Video).is_ok());
    }

    #[test]
    fn test_garbage_video_rejected() {
        assert!(validate_container(b"not a video", "video/quicktime", MediaKind::Video).is_err());
        assert!(validate_container(b"not a video", "video/webm", MediaKind::Video).is_err());
    }

    #[test]
    fn test_image_sniffing() {
        let png_magic = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert!(validate_container(&png_magic, "image/png", MediaKind::Image).is_ok());
        assert!(validate_container(b"hello", "image/png", MediaKind::Image).is_err());
    }

    #[test]
    fn test_size_ceiling_is_exclusive() {
        let client = VisionClient::new("http://localhost", "m", "k", 100, RetryPolicy::default()).unwrap();
        assert!(client.check_size(99).is_ok());
        let err = client.check_size(100).unwrap_err();
        assert!(matches!(err, VisionError::TooLarge { size: 100, limit: 100 }));
    }

    #[test]
    fn test_prompt_carries_guidelines() {
        let guidelines = BrandGuidelines {
            name: "Acme".to_string(),
            banned_terms: vec!["cheap".to_string()],
            ..Default::default()
        };
        let prompt = build_prompt(&guidelines);
        assert!(prompt.contains("\"brand_name\":\"Acme\""));
        assert!(prompt.contains("cheap"));
        assert!(prompt.contains("Non-Marketing"));
    }
}
