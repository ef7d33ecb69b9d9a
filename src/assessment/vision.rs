use super::{
    AssessmentOutcome, AssessmentRequest, AttireAssessor, ImagePayload, MAX_FRAMES, parse_opinion,
    truncate_chars,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{GenericImageView, ImageFormat, codecs::jpeg::JpegEncoder};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{debug, instrument, warn};

/// Longest edge sent to the model; larger frames are downscaled.
const MAX_EDGE: u32 = 1024;
const JPEG_QUALITY: u8 = 85;

const PROMPT: &str = r#"
You are reviewing photos of a shop promoter arriving for a shift.
Judge how ready the person is in terms of professional workplace attire.

Also look closely for any visible BRAND LOGO on the T-shirt, shirt, jacket
or uniform (for example Samsung, Apple, Nike). You do not have to match a
particular company:
- decide whether a logo or brand mark is present on the upper clothing;
- if one is present and readable, report its text (e.g. "Samsung");
- if you are not sure, treat it as "no_logo_detected".

Reply with JSON ONLY, using exactly these keys:

{
  "facial_grooming": {
    "Hair Style": "value",
    "Beard": "value",
    "Face Cleanliness": "value"
  },
  "clothing_appearance": {
    "Outfit Type": "value",
    "Neatness": "value",
    "Color Choice": "value"
  },
  "clothing_style_formality": {
    "Formality Level": "formal|semi-formal|casual",
    "Overall Impression": "value"
  },
  "footwear_shoes": {
    "Footwear Type": "value",
    "Cleanliness": "value",
    "Appropriateness": "value"
  },
  "uniform_logo": {
    "detected_logo_text": "brand text such as 'Samsung', or 'logo unclear', or 'no logo'",
    "match_status": "match_found|no_logo_detected",
    "match_confidence": "high|medium|low"
  },
  "overall_summary": "One short sentence",
  "attire_recommendation": "proper_interview_attire | needs_minor_improvement | not_appropriate_for_interview"
}

Logo rules:
- "match_found" when ANY logo or brand mark is clearly visible on the upper clothing.
- "no_logo_detected" for plain clothing or a mark too unclear to call.
- match_confidence is how confident you are that a logo exists.
"#;

#[derive(Debug, Clone)]
pub struct VisionSettings {
    /// OpenAI-compatible base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Vision-model client speaking the chat completions protocol.
pub struct VisionAssessor {
    client: Client,
    settings: VisionSettings,
}

impl VisionAssessor {
    pub fn new(settings: VisionSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }

    async fn complete(&self, content: Vec<ContentPart>) -> Result<String, String> {
        let request = ChatCompletionRequest {
            model: &self.settings.model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            temperature: 0.2,
            max_tokens: 600,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Analysis failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Analysis failed: HTTP {} - {}", status.as_u16(), body));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| format!("Analysis failed: {e}"))?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

/// Checks the frame is a supported image and returns it as a data URI,
/// downscaled to fit `MAX_EDGE` when needed.
pub(crate) fn prepare_frame(frame: &ImagePayload) -> Result<String, image::ImageError> {
    let format = image::guess_format(&frame.bytes)?;
    if !matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP
    ) {
        return Err(image::ImageError::Unsupported(
            image::error::UnsupportedError::from_format_and_kind(
                format.into(),
                image::error::UnsupportedErrorKind::Format(format.into()),
            ),
        ));
    }

    let img = image::load_from_memory_with_format(&frame.bytes, format)?;
    let (width, height) = img.dimensions();
    if width <= MAX_EDGE && height <= MAX_EDGE {
        return Ok(format!(
            "data:{};base64,{}",
            format.to_mime_type(),
            STANDARD.encode(&frame.bytes)
        ));
    }

    let resized = img.thumbnail(MAX_EDGE, MAX_EDGE).to_rgb8();
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).encode_image(&resized)?;
    debug!(width, height, bytes = buffer.len(), "downscaled frame");
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(&buffer)))
}

/// Decodes and re-encodes up to `MAX_FRAMES` frames on the blocking pool,
/// skipping the unreadable ones.
async fn prepare_frames(frames: &[ImagePayload]) -> Result<Vec<String>, JoinError> {
    let frames: Vec<ImagePayload> = frames.iter().take(MAX_FRAMES).cloned().collect();
    tokio::task::spawn_blocking(move || {
        frames
            .iter()
            .enumerate()
            .filter_map(|(idx, frame)| match prepare_frame(frame) {
                Ok(uri) => Some(uri),
                Err(e) => {
                    warn!(frame = idx, error = %e, "skipping unreadable frame");
                    None
                }
            })
            .collect()
    })
    .await
}

#[async_trait]
impl AttireAssessor for VisionAssessor {
    #[instrument(name = "vision_assess", skip_all, fields(frames = request.frames.len()))]
    async fn assess(&self, request: AssessmentRequest) -> AssessmentOutcome {
        if request.frames.is_empty() {
            return AssessmentOutcome::NoFrames {
                message: "No frames provided".to_string(),
            };
        }

        let images = match prepare_frames(&request.frames).await {
            Ok(images) => images,
            Err(e) => {
                warn!(error = %e, "frame preparation task failed");
                return AssessmentOutcome::transport_error(
                    format!("Analysis failed: {e}"),
                    request.frames.len(),
                );
            }
        };

        if images.is_empty() {
            return AssessmentOutcome::NoValidImages {
                message: "No valid images to analyze".to_string(),
            };
        }
        let frames = images.len();

        let mut content = vec![ContentPart::Text {
            text: format!(
                "{PROMPT}\nThe person in these photos is {}.",
                request.candidate_display()
            ),
        }];
        content.extend(images.into_iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl { url, detail: "low" },
        }));

        let text = match self.complete(content).await {
            Ok(text) => text,
            Err(message) => {
                warn!(error = %message, "vision request failed");
                return AssessmentOutcome::transport_error(message, frames);
            }
        };

        match parse_opinion(&text) {
            Ok(opinion) => AssessmentOutcome::Success {
                opinion,
                frames_analyzed: frames,
                analysis_type: "visual_gpt".to_string(),
                candidate_name: request.candidate_name,
            },
            Err((raw, e)) => {
                warn!(
                    error = %e,
                    raw = %truncate_chars(&raw, 500),
                    "model reply is not valid JSON"
                );
                AssessmentOutcome::ParseError {
                    raw_analysis: raw,
                    frames_analyzed: frames,
                }
            }
        }
    }
}
