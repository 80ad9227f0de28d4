use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    fmt,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{consolidation::report::ConsolidationReport, prompts};

/// Default number of turns kept in a session's history window.
pub const KEEP_HISTORY: usize = 12;
/// Topic used when a signal arrives without one.
pub const GENERAL_TOPIC: &str = "general";
/// Grounding chunks shown to the model per turn.
pub const RAG_SNIPPET_CHUNKS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Higher weakness means an easier level: >= 8 beginner, >= 4 intermediate.
    pub const fn from_score(score: u32) -> Self {
        if score >= 8 {
            Self::Beginner
        } else if score >= 4 {
            Self::Intermediate
        } else {
            Self::Advanced
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evidence that the student struggles with a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeaknessSignal {
    Mistake,
    Confusion,
    Repeat,
}

impl WeaknessSignal {
    pub const fn weight(self) -> u32 {
        match self {
            Self::Mistake => 3,
            Self::Confusion => 2,
            Self::Repeat => 1,
        }
    }

    /// `none` and unknown values map to `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mistake" => Some(Self::Mistake),
            "confusion" => Some(Self::Confusion),
            "repeat" => Some(Self::Repeat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizFeedback {
    #[default]
    None,
    Correct,
    PartiallyCorrect,
    Incorrect,
}

impl QuizFeedback {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "correct" => Self::Correct,
            "partially_correct" | "partial" => Self::PartiallyCorrect,
            "incorrect" => Self::Incorrect,
            _ => Self::None,
        }
    }

    /// The weakness signal a graded answer implies, if any.
    pub const fn implied_signal(self) -> Option<WeaknessSignal> {
        match self {
            Self::Incorrect => Some(WeaknessSignal::Mistake),
            Self::PartiallyCorrect => Some(WeaknessSignal::Confusion),
            Self::Correct | Self::None => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub user: String,
    pub tutor: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizOutcome {
    pub topic: String,
    pub result: QuizFeedback,
    pub at: DateTime<Utc>,
}

/// Everything the tutor knows about one student session.
///
/// Every key of `weakness_scores` is also in `topics` and `difficulty`; all
/// three are only extended through [`SessionState::register_topic`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub history: VecDeque<Turn>,
    pub keep_history: usize,
    pub topics: Vec<String>,
    pub weakness_scores: HashMap<String, u32>,
    pub difficulty: HashMap<String, Difficulty>,
    pub current_topic: Option<String>,
    pub rag_chunks: Vec<String>,
    pub interaction_count: u64,
    pub consolidation_summary: Option<ConsolidationReport>,
    pub last_consolidation_at: Option<DateTime<Utc>>,
    pub last_quiz: Option<QuizOutcome>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(KEEP_HISTORY)
    }
}

impl SessionState {
    pub fn new(keep_history: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(keep_history),
            keep_history,
            topics: Vec::new(),
            weakness_scores: HashMap::new(),
            difficulty: HashMap::new(),
            current_topic: None,
            rag_chunks: Vec::new(),
            interaction_count: 0,
            consolidation_summary: None,
            last_consolidation_at: None,
            last_quiz: None,
        }
    }

    /// Back to a fresh session with the same history window.
    pub fn reset(&mut self) {
        *self = Self::new(self.keep_history);
    }

    /// Returns true when the topic was new. Blank topics are ignored.
    pub fn register_topic(&mut self, topic: &str) -> bool {
        let topic = topic.trim();
        if topic.is_empty() || self.weakness_scores.contains_key(topic) {
            return false;
        }

        self.topics.push(topic.to_owned());
        self.weakness_scores.insert(topic.to_owned(), 0);
        self.difficulty
            .insert(topic.to_owned(), Difficulty::Intermediate);
        true
    }

    /// Adds the signal's weight to the topic's score and returns the new score.
    pub fn apply_signal(&mut self, topic: &str, signal: WeaknessSignal) -> u32 {
        let topic = normalize_topic(topic);
        self.register_topic(topic);
        let score = self.weakness_scores.entry(topic.to_owned()).or_default();
        *score = score.saturating_add(signal.weight());
        *score
    }

    /// Raises a topic's score to `reported` if that is higher. Scores never go down.
    pub fn raise_score(&mut self, topic: &str, reported: u32) -> u32 {
        let topic = normalize_topic(topic);
        self.register_topic(topic);
        let score = self.weakness_scores.entry(topic.to_owned()).or_default();
        *score = (*score).max(reported);
        *score
    }

    pub fn recompute_difficulty(&mut self) {
        for (topic, score) in &self.weakness_scores {
            self.difficulty
                .insert(topic.clone(), Difficulty::from_score(*score));
        }
    }

    pub fn record_quiz(&mut self, topic: &str, result: QuizFeedback) {
        self.last_quiz = Some(QuizOutcome {
            topic: normalize_topic(topic).to_owned(),
            result,
            at: Utc::now(),
        });
    }

    pub fn push_turn(&mut self, user: impl Into<String>, tutor: impl Into<String>) {
        self.history.push_back(Turn {
            user: user.into(),
            tutor: tutor.into(),
            timestamp: Utc::now(),
        });
        while self.history.len() > self.keep_history {
            self.history.pop_front();
        }
    }

    /// Up to `n` topics by descending score, ties in registration order.
    pub fn weakest_topics(&self, n: usize) -> Vec<(String, u32)> {
        let mut ranked: Vec<(String, u32)> = self
            .topics
            .iter()
            .map(|t| (t.clone(), self.weakness_scores.get(t).copied().unwrap_or(0)))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }

    /// The last `window` turns rendered as a transcript.
    pub fn history_text(&self, window: usize) -> String {
        let skip = self.history.len().saturating_sub(window);
        let lines: Vec<String> = self
            .history
            .iter()
            .skip(skip)
            .map(|t| format!("Student: {}\nTutor: {}", t.user, t.tutor))
            .collect();

        if lines.is_empty() {
            prompts::NO_HISTORY.to_owned()
        } else {
            lines.join("\n")
        }
    }

    pub fn rag_snippet(&self) -> String {
        render_context(&self.rag_chunks)
    }

    /// JSON summary of scores, difficulty and topics shown to the model.
    pub fn memory_summary(&self) -> String {
        let scores: BTreeMap<&str, u32> = self
            .weakness_scores
            .iter()
            .map(|(t, s)| (t.as_str(), *s))
            .collect();
        let difficulty: BTreeMap<&str, Difficulty> = self
            .difficulty
            .iter()
            .map(|(t, d)| (t.as_str(), *d))
            .collect();

        let summary = json!({
            "weakness_scores": scores,
            "difficulty": difficulty,
            "topics_seen": self.topics,
            "interaction_count": self.interaction_count,
        });
        serde_json::to_string_pretty(&summary).unwrap_or_else(|_| summary.to_string())
    }

    pub fn assemble_prompt(&self, user_msg: &str) -> String {
        self.assemble_prompt_with_context(user_msg, &[])
    }

    /// Like [`Self::assemble_prompt`] but grounds the turn on freshly retrieved
    /// `context`, falling back to the cached chunks when it is empty. Does not
    /// touch the state.
    pub fn assemble_prompt_with_context(&self, user_msg: &str, context: &[String]) -> String {
        let rag = if context.is_empty() {
            self.rag_snippet()
        } else {
            render_context(context)
        };

        prompts::tutor_prompt(
            &self.memory_summary(),
            &self.history_text(self.keep_history),
            &rag,
            user_msg,
        )
    }
}

fn normalize_topic(topic: &str) -> &str {
    let topic = topic.trim();
    if topic.is_empty() {
        GENERAL_TOPIC
    } else {
        topic
    }
}

fn render_context(chunks: &[String]) -> String {
    if chunks.is_empty() {
        return prompts::NO_EXTERNAL_KNOWLEDGE.to_owned();
    }
    let skip = chunks.len().saturating_sub(RAG_SNIPPET_CHUNKS);
    chunks
        .iter()
        .skip(skip)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_mistakes_add_nine_and_register_once() {
        let mut state = SessionState::default();
        for _ in 0..3 {
            state.apply_signal("fractions", WeaknessSignal::Mistake);
        }

        assert_eq!(state.weakness_scores["fractions"], 9);
        assert_eq!(state.topics, vec!["fractions".to_string()]);
        assert!(state.difficulty.contains_key("fractions"));
    }

    #[test]
    fn signal_weights() {
        let mut state = SessionState::default();
        assert_eq!(state.apply_signal("a", WeaknessSignal::Mistake), 3);
        assert_eq!(state.apply_signal("a", WeaknessSignal::Confusion), 5);
        assert_eq!(state.apply_signal("a", WeaknessSignal::Repeat), 6);
    }

    #[test]
    fn blank_topic_signals_go_to_general() {
        let mut state = SessionState::default();
        state.apply_signal("  ", WeaknessSignal::Confusion);
        assert_eq!(state.weakness_scores[GENERAL_TOPIC], 2);
        assert_eq!(state.topics, vec![GENERAL_TOPIC.to_string()]);
    }

    #[test]
    fn register_topic_is_idempotent_and_ignores_blank() {
        let mut state = SessionState::default();
        assert!(state.register_topic("algebra"));
        assert!(!state.register_topic("algebra"));
        assert!(!state.register_topic(""));
        assert_eq!(state.topics.len(), 1);
        assert_eq!(state.weakness_scores["algebra"], 0);
        assert_eq!(state.difficulty["algebra"], Difficulty::Intermediate);
    }

    #[test]
    fn difficulty_thresholds_are_pure() {
        let mut state = SessionState::default();
        state.raise_score("A", 9);
        state.raise_score("B", 5);
        state.raise_score("C", 1);

        for _ in 0..3 {
            state.recompute_difficulty();
            assert_eq!(state.difficulty["A"], Difficulty::Beginner);
            assert_eq!(state.difficulty["B"], Difficulty::Intermediate);
            assert_eq!(state.difficulty["C"], Difficulty::Advanced);
        }
        assert_eq!(Difficulty::from_score(8), Difficulty::Beginner);
        assert_eq!(Difficulty::from_score(4), Difficulty::Intermediate);
        assert_eq!(Difficulty::from_score(3), Difficulty::Advanced);
    }

    #[test]
    fn history_keeps_most_recent_turns() {
        let mut state = SessionState::default();
        for i in 0..=KEEP_HISTORY {
            state.push_turn(format!("q{i}"), format!("a{i}"));
        }

        assert_eq!(state.history.len(), KEEP_HISTORY);
        assert_eq!(state.history.front().map(|t| t.user.as_str()), Some("q1"));
        assert_eq!(
            state.history.back().map(|t| t.user.clone()),
            Some(format!("q{KEEP_HISTORY}"))
        );
    }

    #[test]
    fn raise_score_never_lowers() {
        let mut state = SessionState::default();
        state.raise_score("topic", 5);
        assert_eq!(state.raise_score("topic", 2), 5);
        assert_eq!(state.raise_score("topic", 7), 7);
    }

    #[test]
    fn weakest_topics_ranked_with_stable_ties() {
        let mut state = SessionState::default();
        state.raise_score("first", 2);
        state.raise_score("second", 6);
        state.raise_score("third", 2);

        assert_eq!(
            state.weakest_topics(5),
            vec![
                ("second".to_string(), 6),
                ("first".to_string(), 2),
                ("third".to_string(), 2)
            ]
        );
        assert_eq!(state.weakest_topics(1).len(), 1);
    }

    #[test]
    fn reset_equals_fresh_state() {
        let mut state = SessionState::default();
        state.apply_signal("algebra", WeaknessSignal::Mistake);
        state.push_turn("hi", "hello");
        state.rag_chunks = vec!["chunk".into()];
        state.interaction_count = 4;
        state.record_quiz("algebra", QuizFeedback::Incorrect);

        state.reset();
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn prompt_carries_state_history_context_and_message() {
        let mut state = SessionState::default();
        state.apply_signal("photosynthesis", WeaknessSignal::Confusion);
        state.push_turn("what is chlorophyll?", "A green pigment.");

        let prompt = state.assemble_prompt("why are leaves green?");
        assert!(prompt.contains("\"photosynthesis\": 2"));
        assert!(prompt.contains("Student: what is chlorophyll?\nTutor: A green pigment."));
        assert!(prompt.contains(prompts::NO_EXTERNAL_KNOWLEDGE));
        assert!(prompt.contains("why are leaves green?"));
        assert!(prompt.contains(crate::protocol::META_DELIMITER));

        let grounded = state
            .assemble_prompt_with_context("why?", &["Chlorophyll reflects green light.".into()]);
        assert!(grounded.contains("Chlorophyll reflects green light."));
        assert!(!grounded.contains(prompts::NO_EXTERNAL_KNOWLEDGE));
    }

    #[test]
    fn history_window_limits_transcript() {
        let mut state = SessionState::new(3);
        for i in 0..3 {
            state.push_turn(format!("q{i}"), format!("a{i}"));
        }
        let text = state.history_text(2);
        assert!(!text.contains("q0"));
        assert!(text.contains("q1"));
        assert!(text.contains("q2"));
        assert_eq!(SessionState::default().history_text(5), prompts::NO_HISTORY);
    }

    #[test]
    fn value_parsers_are_case_insensitive() {
        assert_eq!(Difficulty::parse(" Beginner "), Some(Difficulty::Beginner));
        assert_eq!(Difficulty::parse("expert"), None);
        assert_eq!(WeaknessSignal::parse("MISTAKE"), Some(WeaknessSignal::Mistake));
        assert_eq!(WeaknessSignal::parse("none"), None);
        assert_eq!(
            QuizFeedback::parse("Partially-Correct"),
            QuizFeedback::PartiallyCorrect
        );
        assert_eq!(QuizFeedback::parse("maybe"), QuizFeedback::None);
        assert_eq!(
            QuizFeedback::Incorrect.implied_signal(),
            Some(WeaknessSignal::Mistake)
        );
        assert_eq!(QuizFeedback::Correct.implied_signal(), None);
    }
}
