use std::sync::Arc;

use common::{
    error::AppError,
    utils::{completion::CompletionService, config::AppConfig},
};
use retrieval_pipeline::HybridRetriever;
use tracing::{debug, info, instrument, warn};

use crate::{
    consolidation::{report::ConsolidationReport, ConsolidationScheduler},
    protocol::{parse_completion, ParsedCompletion},
    state::{SessionState, GENERAL_TOPIC},
    store::SessionStore,
};

pub const APOLOGY_REPLY: &str =
    "Sorry, I couldn't reach the tutoring service just now. Your progress is safe, please try again in a moment.";
pub const RESET_REPLY: &str = "Session reset. Ready for a new topic. What would you like to learn?";

/// Commands a student can type instead of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    Consolidate,
}

impl Command {
    pub fn parse(message: &str) -> Option<Self> {
        match message.trim().to_lowercase().as_str() {
            "/reset" | "reset session" => Some(Self::Reset),
            "/career" | "career" | "/consolidate" => Some(Self::Consolidate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TutorConfig {
    pub rag_enabled: bool,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            rag_enabled: true,
        }
    }
}

impl TutorConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            rag_enabled: config.rag_enabled,
        }
    }
}

/// Runs one tutoring turn end to end: retrieval, prompt, completion, signal
/// updates and consolidation.
pub struct Tutor {
    sessions: Arc<SessionStore>,
    completion: Arc<dyn CompletionService>,
    retriever: Option<Arc<HybridRetriever>>,
    scheduler: ConsolidationScheduler,
    config: TutorConfig,
}

impl Tutor {
    pub fn new(
        sessions: Arc<SessionStore>,
        completion: Arc<dyn CompletionService>,
        retriever: Option<Arc<HybridRetriever>>,
        scheduler: ConsolidationScheduler,
        config: TutorConfig,
    ) -> Self {
        Self {
            sessions,
            completion,
            retriever,
            scheduler,
            config,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        completion: Arc<dyn CompletionService>,
        retriever: Option<Arc<HybridRetriever>>,
    ) -> Self {
        let scheduler = ConsolidationScheduler::new(
            Arc::clone(&completion),
            config.consolidate_after,
            config.consolidation_history_window,
        );
        Self::new(
            Arc::new(SessionStore::new(config.keep_history)),
            completion,
            retriever,
            scheduler,
            TutorConfig::from_config(config),
        )
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Answers a student message, or runs it as a command.
    ///
    /// Completion failures produce [`APOLOGY_REPLY`] and leave the session
    /// untouched. Only blank input is an error.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn handle_message(&self, session_id: &str, message: &str) -> Result<String, AppError> {
        validate_session_id(session_id)?;
        let message = message.trim();
        if message.is_empty() {
            return Err(AppError::Validation("message must not be empty".into()));
        }

        match Command::parse(message) {
            Some(Command::Reset) => {
                self.reset(session_id).await?;
                return Ok(RESET_REPLY.to_owned());
            }
            Some(Command::Consolidate) => {
                let report = self.consolidate(session_id).await?;
                return Ok(serde_json::to_string_pretty(&report)?);
            }
            None => {}
        }

        let handle = self.sessions.get_or_create(session_id).await;
        let mut session = handle.lock().await;

        let context = self.retrieve_context(&session, message).await;
        let prompt = session.assemble_prompt_with_context(message, &context);

        let raw = match self.completion.complete(&prompt).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    error = %err,
                    transport = err.is_transport(),
                    "completion failed, session left unchanged"
                );
                return Ok(APOLOGY_REPLY.to_owned());
            }
        };

        session.interaction_count = session.interaction_count.saturating_add(1);
        if !context.is_empty() {
            session.rag_chunks = context;
        }

        let parsed = parse_completion(&raw);
        apply_turn(&mut session, message, &parsed);

        if self
            .scheduler
            .is_due(session.interaction_count, parsed.meta.ask_consolidation)
        {
            self.scheduler.run(&mut session).await;
        }
        session.recompute_difficulty();

        info!(
            interaction_count = session.interaction_count,
            topic = session.current_topic.as_deref().unwrap_or(GENERAL_TOPIC),
            "turn complete"
        );

        Ok(parsed.reply)
    }

    pub async fn reset(&self, session_id: &str) -> Result<(), AppError> {
        validate_session_id(session_id)?;
        self.sessions.reset(session_id).await;
        Ok(())
    }

    /// The stored report if the session has one, otherwise a fresh pass.
    pub async fn consolidate(&self, session_id: &str) -> Result<ConsolidationReport, AppError> {
        validate_session_id(session_id)?;
        let handle = self.sessions.get_or_create(session_id).await;
        let mut session = handle.lock().await;

        if let Some(report) = &session.consolidation_summary {
            return Ok(report.clone());
        }
        Ok(self.scheduler.run(&mut session).await)
    }

    /// A copy of the session's current state, if it exists.
    pub async fn snapshot(&self, session_id: &str) -> Option<SessionState> {
        let handle = self.sessions.get(session_id).await?;
        let state = handle.lock().await.clone();
        Some(state)
    }

    async fn retrieve_context(&self, session: &SessionState, message: &str) -> Vec<String> {
        let Some(retriever) = self.retriever.as_ref().filter(|_| self.config.rag_enabled) else {
            return Vec::new();
        };

        let topic = session.current_topic.as_deref().unwrap_or(GENERAL_TOPIC);
        let query = format!("Question: {message}\nTopic: {topic}");
        let chunks = retriever.retrieve(&query).await;
        debug!(chunk_count = chunks.len(), "retrieved grounding context");
        chunks
    }
}

fn validate_session_id(session_id: &str) -> Result<(), AppError> {
    if session_id.trim().is_empty() {
        return Err(AppError::Validation("session_id must not be empty".into()));
    }
    Ok(())
}

/// Applies a parsed completion to the session: topic, weakness signal, quiz
/// grading and the history entry. The model's difficulty is advisory only.
fn apply_turn(session: &mut SessionState, message: &str, parsed: &ParsedCompletion) {
    let meta = &parsed.meta;
    let topic = meta.topic.as_deref().unwrap_or(GENERAL_TOPIC).to_owned();
    session.register_topic(&topic);
    session.current_topic = Some(topic.clone());

    if let Some(signal) = meta.weakness_signal {
        session.apply_signal(&topic, signal);
    }

    if let Some(suggested) = meta.difficulty {
        debug!(topic = %topic, suggested = %suggested, "model suggested difficulty");
    }

    if meta.quiz_feedback != crate::state::QuizFeedback::None {
        if let Some(signal) = meta.quiz_feedback.implied_signal() {
            session.apply_signal(&topic, signal);
        }
        session.record_quiz(&topic, meta.quiz_feedback);
    }

    session.push_turn(message, parsed.reply.clone());
}
