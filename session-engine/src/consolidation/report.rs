use std::collections::BTreeMap;

use common::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::state::{Difficulty, SessionState};

pub const FALLBACK_REASON: &str = "auto-detected";
pub const FALLBACK_TOPICS: usize = 5;
const KNOWN_FIELDS: [&str; 7] = [
    "ranked_weaknesses",
    "difficulty_recs",
    "strengths",
    "quick_strengths",
    "suggested_actions",
    "suggested_next_actions",
    "career_mappings",
];

pub const FALLBACK_ACTIONS: [&str; 2] = [
    "Try a short quiz on your weakest topic.",
    "Review fundamentals and examples.",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedWeakness {
    pub topic: String,
    pub score: u32,
    pub short_reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareerMapping {
    pub name: String,
    pub primary_skills: Vec<String>,
    pub secondary_skills: Vec<String>,
    pub short_roadmap: Vec<String>,
    pub estimated_timeline: String,
}

/// Session-wide analysis produced by a consolidation pass. Replaced wholesale
/// by the next pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub ranked_weaknesses: Vec<RankedWeakness>,
    pub difficulty_recs: BTreeMap<String, Difficulty>,
    pub strengths: Vec<String>,
    pub suggested_actions: Vec<String>,
    pub career_mappings: Vec<CareerMapping>,
}

impl ConsolidationReport {
    /// Parses the JSON object embedded in a completion, taking everything
    /// from the first `{` to the last `}`.
    ///
    /// The object must be valid JSON and carry at least one report field.
    /// Inside it, parsing is lenient: scores may be numbers or numeric
    /// strings, unknown difficulty levels are dropped and malformed entries
    /// are skipped.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) else {
            return Err(AppError::LLMParsing("no JSON object in consolidation reply".into()));
        };
        let json = raw
            .get(start..=end)
            .ok_or_else(|| AppError::LLMParsing("malformed JSON bounds".into()))?;

        let value: Value = serde_json::from_str(json)
            .map_err(|err| AppError::LLMParsing(format!("consolidation JSON: {err}")))?;
        let Value::Object(object) = value else {
            return Err(AppError::LLMParsing("consolidation reply is not an object".into()));
        };

        if !KNOWN_FIELDS.iter().any(|field| object.contains_key(*field)) {
            return Err(AppError::LLMParsing(
                "consolidation reply has no report fields".into(),
            ));
        }

        Ok(Self {
            ranked_weaknesses: field(&object, &["ranked_weaknesses"])
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(ranked_weakness).collect())
                .unwrap_or_default(),
            difficulty_recs: field(&object, &["difficulty_recs"])
                .and_then(Value::as_object)
                .map(|recs| {
                    recs.iter()
                        .filter_map(|(topic, level)| {
                            let level = Difficulty::parse(level.as_str()?)?;
                            Some((topic.trim().to_owned(), level))
                        })
                        .filter(|(topic, _)| !topic.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            strengths: string_list(field(&object, &["strengths", "quick_strengths"])),
            suggested_actions: string_list(field(
                &object,
                &["suggested_actions", "suggested_next_actions"],
            )),
            career_mappings: field(&object, &["career_mappings"])
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(career_mapping).collect())
                .unwrap_or_default(),
        })
    }

    /// Minimal report derived from local scores alone.
    pub fn local_fallback(state: &SessionState) -> Self {
        Self {
            ranked_weaknesses: state
                .weakest_topics(FALLBACK_TOPICS)
                .into_iter()
                .map(|(topic, score)| RankedWeakness {
                    topic,
                    score,
                    short_reason: FALLBACK_REASON.to_owned(),
                })
                .collect(),
            difficulty_recs: state
                .difficulty
                .iter()
                .map(|(topic, level)| (topic.clone(), *level))
                .collect(),
            strengths: Vec::new(),
            suggested_actions: FALLBACK_ACTIONS.iter().map(|a| (*a).to_owned()).collect(),
            career_mappings: Vec::new(),
        }
    }

    /// Raises stored scores to the reported ones. Never lowers a score and
    /// registers topics the session has not seen yet.
    pub fn merge_into(&self, state: &mut SessionState) {
        for weakness in &self.ranked_weaknesses {
            if weakness.topic.trim().is_empty() {
                continue;
            }
            state.raise_score(&weakness.topic, weakness.score);
        }
    }
}

fn field<'a>(object: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| object.get(*name))
}

fn ranked_weakness(value: &Value) -> Option<RankedWeakness> {
    let object = value.as_object()?;
    let topic = object.get("topic")?.as_str()?.trim().to_owned();
    if topic.is_empty() {
        return None;
    }
    let score = match object.get("score") {
        None | Some(Value::Null) => 0,
        Some(value) => lenient_score(value)?,
    };
    let short_reason = object
        .get("short_reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();

    Some(RankedWeakness {
        topic,
        score,
        short_reason,
    })
}

fn lenient_score(value: &Value) -> Option<u32> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !number.is_finite() {
        return None;
    }
    let clamped = number.round().clamp(0.0, f64::from(u32::MAX));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let score = clamped as u32;
    Some(score)
}

fn career_mapping(value: &Value) -> Option<CareerMapping> {
    let object = value.as_object()?;
    let name = object.get("name")?.as_str()?.trim().to_owned();
    if name.is_empty() {
        return None;
    }

    Some(CareerMapping {
        name,
        primary_skills: string_list(object.get("primary_skills")),
        secondary_skills: string_list(object.get("secondary_skills")),
        short_roadmap: string_list(object.get("short_roadmap")),
        estimated_timeline: match object.get("estimated_timeline") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => format!("{n} months"),
            _ => String::new(),
        },
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_owned()],
        _ => Vec::new(),
    }
}
