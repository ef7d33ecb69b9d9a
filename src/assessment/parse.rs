use super::AttireOpinion;
use serde::de::Error as _;
use serde_json::Value;

/// Removes a surrounding markdown code fence, with or without a `json` tag.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };

    // Drop the opening fence line (it may carry a language tag).
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest.strip_prefix("json").unwrap_or(rest),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Parses model output into an opinion. Any JSON object is accepted as is;
/// anything else comes back as the fence-stripped text plus the parser error.
pub fn parse_opinion(text: &str) -> Result<AttireOpinion, (String, serde_json::Error)> {
    let cleaned = strip_code_fence(text);
    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Object(fields)) => Ok(AttireOpinion::from_object(fields)),
        Ok(_) => Err((
            cleaned.to_string(),
            serde_json::Error::custom("expected a JSON object"),
        )),
        Err(e) => Err((cleaned.to_string(), e)),
    }
}
