pub mod report;
pub mod state;

use std::sync::Arc;

use chrono::Utc;
use common::{error::AppError, utils::completion::CompletionService};
use tracing::{info, instrument, warn};

use crate::{prompts, state::SessionState};
use report::ConsolidationReport;

pub const CONSOLIDATE_AFTER: u64 = 10;
pub const HISTORY_WINDOW: usize = 100;

/// Runs the session-wide analysis pass on a cadence or on request.
///
/// A pass moves the machine from idle to running and back exactly once; it
/// never retries and never fails, degrading to a report built from local
/// scores when the completion service or its JSON lets it down.
pub struct ConsolidationScheduler {
    completion: Arc<dyn CompletionService>,
    consolidate_after: u64,
    history_window: usize,
}

impl ConsolidationScheduler {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        consolidate_after: u64,
        history_window: usize,
    ) -> Self {
        Self {
            completion,
            consolidate_after,
            history_window,
        }
    }

    /// Periodic firing is disabled when `consolidate_after` is zero.
    pub fn is_due(&self, interaction_count: u64, explicit: bool) -> bool {
        explicit
            || (self.consolidate_after > 0
                && interaction_count > 0
                && interaction_count % self.consolidate_after == 0)
    }

    #[instrument(skip_all, fields(interaction_count = session.interaction_count))]
    pub async fn run(&self, session: &mut SessionState) -> ConsolidationReport {
        let running = match state::idle().start() {
            Ok(machine) => machine,
            Err((_, guard)) => {
                let err = state::map_guard_error("start", &guard);
                warn!(error = %err, "consolidation could not start, using local report");
                return ConsolidationReport::local_fallback(session);
            }
        };

        let report = match self.analyse(session).await {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "consolidation fell back to local scores");
                ConsolidationReport::local_fallback(session)
            }
        };

        report.merge_into(session);
        session.recompute_difficulty();
        session.consolidation_summary = Some(report.clone());
        session.last_consolidation_at = Some(Utc::now());

        if let Err((_, guard)) = running.finish() {
            let err = state::map_guard_error("finish", &guard);
            warn!(error = %err, "consolidation machine did not return to idle");
        }

        info!(
            weaknesses = report.ranked_weaknesses.len(),
            careers = report.career_mappings.len(),
            "consolidation complete"
        );

        report
    }

    async fn analyse(&self, session: &SessionState) -> Result<ConsolidationReport, AppError> {
        let prompt = prompts::consolidation_prompt(
            &session.history_text(self.history_window),
            &session.rag_snippet(),
        );
        let raw = self.completion.complete(&prompt).await?;
        ConsolidationReport::parse(&raw)
    }
}
