//! Attire assessment gateway.
//!
//! The ledger only ever sees [`AssessmentOutcome`] values: a structured
//! opinion or a typed failure, both stored verbatim on the punch. Nothing
//! in here returns an error to the caller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::{AsRefStr, EnumString};

mod parse;
mod vision;

pub use parse::parse_opinion;
pub use vision::{VisionAssessor, VisionSettings};

/// Upper bound on frames sent to the model.
pub const MAX_FRAMES: usize = 5;

/// Failure messages are cut to this many characters.
pub const MESSAGE_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct AssessmentRequest {
    pub frames: Vec<ImagePayload>,
    pub candidate_name: Option<String>,
    pub candidate_id: Option<String>,
}

impl AssessmentRequest {
    /// Name used when addressing the candidate in a prompt.
    pub fn candidate_display(&self) -> String {
        match (&self.candidate_name, &self.candidate_id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => format!("Candidate {id}"),
            (None, None) => "the candidate".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttireRecommendation {
    ProperInterviewAttire,
    NeedsMinorImprovement,
    NotAppropriateForInterview,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniformLogo {
    #[serde(default)]
    pub detected_logo_text: Option<String>,
    #[serde(default)]
    pub match_status: Option<String>,
    #[serde(default)]
    pub match_confidence: Option<String>,
}

/// Sections whose entries are listed as detail lines, in display order.
pub const OPINION_SECTIONS: [&str; 4] = [
    "facial_grooming",
    "clothing_appearance",
    "clothing_style_formality",
    "footwear_shoes",
];

/// Keys owned by the outcome envelope; a model reply cannot override them.
const ENVELOPE_KEYS: [&str; 4] = ["status", "frames_analyzed", "analysis_type", "candidate_name"];

/// The model's opinion, kept as the JSON object it returned. Known keys
/// are read through accessors that tolerate whatever shape the model chose.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttireOpinion(Map<String, Value>);

impl AttireOpinion {
    pub fn from_object(mut fields: Map<String, Value>) -> Self {
        for key in ENVELOPE_KEYS {
            fields.remove(key);
        }
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn overall_summary(&self) -> Option<&str> {
        self.text("overall_summary")
    }

    /// Raw recommendation text, as the model wrote it.
    pub fn attire_recommendation(&self) -> Option<&str> {
        self.text("attire_recommendation")
    }

    /// Tolerant parse; models sometimes echo the whole `a | b | c` template.
    pub fn recommendation(&self) -> Option<AttireRecommendation> {
        self.attire_recommendation()
            .and_then(|raw| raw.trim().parse().ok())
    }

    pub fn uniform_logo(&self) -> Option<UniformLogo> {
        self.get("uniform_logo")
            .filter(|v| v.is_object())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// One line per entry across the four opinion sections. Maps give
    /// "Label: value", lists give their items, a bare string is one line.
    pub fn detail_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for section in OPINION_SECTIONS {
            match self.get(section) {
                Some(Value::Object(entries)) => {
                    lines.extend(
                        entries
                            .iter()
                            .map(|(label, value)| format!("{label}: {}", plain(value))),
                    );
                }
                Some(Value::Array(items)) => lines.extend(items.iter().map(plain)),
                Some(Value::String(s)) if !s.trim().is_empty() => lines.push(s.trim().to_string()),
                _ => {}
            }
        }
        lines
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssessmentOutcome {
    Success {
        #[serde(flatten)]
        opinion: AttireOpinion,
        frames_analyzed: usize,
        analysis_type: String,
        candidate_name: Option<String>,
    },
    NoFrames {
        message: String,
    },
    NoValidImages {
        message: String,
    },
    ParseError {
        raw_analysis: String,
        frames_analyzed: usize,
    },
    TransportError {
        message: String,
        frames_received: usize,
    },
}

impl AssessmentOutcome {
    pub fn transport_error(message: impl AsRef<str>, frames_received: usize) -> Self {
        AssessmentOutcome::TransportError {
            message: truncate_chars(message.as_ref(), MESSAGE_LIMIT),
            frames_received,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            AssessmentOutcome::Success { .. } => "success",
            AssessmentOutcome::NoFrames { .. } => "no_frames",
            AssessmentOutcome::NoValidImages { .. } => "no_valid_images",
            AssessmentOutcome::ParseError { .. } => "parse_error",
            AssessmentOutcome::TransportError { .. } => "transport_error",
        }
    }

    pub fn opinion(&self) -> Option<&AttireOpinion> {
        match self {
            AssessmentOutcome::Success { opinion, .. } => Some(opinion),
            _ => None,
        }
    }

    /// JSON form stored on the punch record.
    pub fn to_payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "status": "parse_error", "raw_analysis": e.to_string() })
        })
    }
}

pub fn truncate_chars(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

#[async_trait]
pub trait AttireAssessor: Send + Sync {
    async fn assess(&self, request: AssessmentRequest) -> AssessmentOutcome;
}

/// Stand-in used when no model credentials are configured.
pub struct UnconfiguredAssessor;

#[async_trait]
impl AttireAssessor for UnconfiguredAssessor {
    async fn assess(&self, request: AssessmentRequest) -> AssessmentOutcome {
        AssessmentOutcome::transport_error(
            "assessment gateway not configured",
            request.frames.len(),
        )
    }
}
