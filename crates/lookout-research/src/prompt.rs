use lookout_types::ResearchRequest;
use serde::Deserialize;

use crate::{Answer, ResearchError};

/// Confidence assigned when the model replies in plain text
pub(crate) const UNSTATED_CONFIDENCE: f32 = 0.5;

/// Map a non-success HTTP status onto the error taxonomy; `None` for 2xx
pub fn classify_status(status: u16, detail: &str) -> Option<ResearchError> {
    let detail: String = detail.chars().take(200).collect();
    match status {
        200..=299 => None,
        401 | 403 => Some(ResearchError::Authentication),
        408 => Some(ResearchError::Timeout),
        429 => Some(ResearchError::RateLimited),
        500..=599 => Some(ResearchError::ServerError(status)),
        _ => Some(ResearchError::InvalidRequest(format!("HTTP {status}: {detail}"))),
    }
}

pub fn build_prompt(request: &ResearchRequest) -> String {
    let options = if request.options.is_empty() {
        "No options provided (short answer expected)".to_string()
    } else {
        request.options.join("\n")
    };

    format!(
        "Context: {}\n\n\
         Question: {}\n\n\
         Options:\n{}\n\n\
         Reply with one JSON object and nothing else: \
         {{\"answer\": \"...\", \"confidence\": 0.0-1.0}}. \
         For multiple choice, the answer is just the option label. \
         For short answer, give a brief, direct response.",
        request.context_hint, request.question_text, options
    )
}

#[derive(Deserialize)]
struct AnswerJson {
    answer: String,
    confidence: Option<f32>,
}

/// Read the model's reply, preferring the requested JSON shape
pub fn parse_answer(text: &str) -> Result<Answer, ResearchError> {
    let trimmed = text.trim();

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && start < end
        && let Ok(parsed) = serde_json::from_str::<AnswerJson>(&trimmed[start..=end])
    {
        let answer = parsed.answer.trim();
        if answer.is_empty() {
            return Err(ResearchError::MalformedResponse("empty answer".into()));
        }
        return Ok(Answer {
            text: answer.to_string(),
            confidence: parsed
                .confidence
                .unwrap_or(UNSTATED_CONFIDENCE)
                .clamp(0.0, 1.0),
        });
    }

    if trimmed.is_empty() {
        return Err(ResearchError::MalformedResponse("empty answer".into()));
    }

    Ok(Answer {
        text: trimmed.to_string(),
        confidence: UNSTATED_CONFIDENCE,
    })
}
