//! Response evaluation: pluggable scorer for a candidate's answer.
//!
//! Default: `KeywordEvaluator` (fixed keyword lists, deterministic). The action
//! holds an `Arc<dyn ResponseEvaluator>`, so another strategy can be swapped in
//! at registry construction without touching the action itself.

use serde::Serialize;

pub const TECHNICAL_KEYWORDS: [&str; 5] = ["function", "variable", "code", "algorithm", "data"];
pub const BEHAVIORAL_KEYWORDS: [&str; 5] = ["experience", "team", "project", "challenge", "solution"];

pub const EXCELLENT_FEEDBACK: &str =
    "Excellent response! Your explanation was clear and comprehensive.";
pub const GOOD_FEEDBACK: &str = "Good response. You covered the main points well.";
pub const NEEDS_DETAIL_FEEDBACK: &str =
    "Your response could be more detailed. Try to include more specific examples.";

pub const TECHNICAL_SUGGESTIONS: [&str; 3] = [
    "Include more technical details",
    "Provide code examples",
    "Explain the underlying concepts",
];
pub const BEHAVIORAL_SUGGESTIONS: [&str; 3] = [
    "Share specific examples from your experience",
    "Describe the impact of your actions",
    "Explain your decision-making process",
];

const EXCELLENT_THRESHOLD: f64 = 0.8;
const GOOD_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub confidence: f64, // 0.0 – 1.0
    pub feedback: String,
    pub suggestions: Vec<String>,
}

pub trait ResponseEvaluator: Send + Sync {
    fn evaluate(&self, response: &str, interview_type: Option<&str>) -> Evaluation;
}

/// Scores an answer by how many of the interview type's keywords it mentions.
///
/// 1. Resolve the keyword list: `behavioral` → behavioral list, anything else → technical.
/// 2. confidence = matched / list length, where a keyword matches as a
///    case-insensitive substring of the answer; capped at 1.0.
/// 3. Feedback tier: > 0.8 excellent, > 0.6 good, otherwise needs more detail.
/// 4. Below the excellent tier, add three suggestions phrased for the type.
pub struct KeywordEvaluator;

impl ResponseEvaluator for KeywordEvaluator {
    fn evaluate(&self, response: &str, interview_type: Option<&str>) -> Evaluation {
        let confidence = keyword_confidence(response, keywords_for(interview_type));
        Evaluation {
            confidence,
            feedback: feedback_for(confidence).to_string(),
            suggestions: suggestions_for(confidence, interview_type),
        }
    }
}

pub fn keywords_for(interview_type: Option<&str>) -> &'static [&'static str] {
    match interview_type {
        Some("behavioral") => &BEHAVIORAL_KEYWORDS,
        _ => &TECHNICAL_KEYWORDS,
    }
}

pub fn keyword_confidence(response: &str, keywords: &[&str]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let response_lower = response.to_lowercase();
    let matched = keywords
        .iter()
        .filter(|kw| response_lower.contains(&kw.to_lowercase()))
        .count();
    (matched as f64 / keywords.len() as f64).clamp(0.0, 1.0)
}

pub fn feedback_for(confidence: f64) -> &'static str {
    if confidence > EXCELLENT_THRESHOLD {
        EXCELLENT_FEEDBACK
    } else if confidence > GOOD_THRESHOLD {
        GOOD_FEEDBACK
    } else {
        NEEDS_DETAIL_FEEDBACK
    }
}

/// Technical phrasing only for an explicit `technical` type; everything else,
/// including an unset type, gets the behavioral phrasing.
pub fn suggestions_for(confidence: f64, interview_type: Option<&str>) -> Vec<String> {
    if confidence > EXCELLENT_THRESHOLD {
        return vec![];
    }
    let suggestions = match interview_type {
        Some("technical") => TECHNICAL_SUGGESTIONS,
        _ => BEHAVIORAL_SUGGESTIONS,
    };
    suggestions.iter().map(|s| s.to_string()).collect()
}
