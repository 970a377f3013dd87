// =============================================================================
// Observer — spec.md §6 (exposed, optional)
// =============================================================================
//
// A sink to which the scheduler publishes lifecycle events. Used by the
// (out-of-scope) dashboard; the default implementation just logs, matching
// the teacher's `tracing`-first observability style.
// =============================================================================

use crate::types::LeaderboardRow;

#[derive(Debug, Clone)]
pub enum ArenaEvent {
    Started,
    RoundStart(u64),
    RoundComplete(u64, Vec<LeaderboardRow>),
    CompetitionFinished { session_id: String, total_rounds: u64 },
    Error { round: u64, message: String },
}

pub trait Observer: Send + Sync {
    fn on_event(&self, event: ArenaEvent);
}

#[derive(Default)]
pub struct LoggingObserver;

impl Observer for LoggingObserver {
    fn on_event(&self, event: ArenaEvent) {
        match event {
            ArenaEvent::Started => tracing::info!("arena started"),
            ArenaEvent::RoundStart(round) => tracing::info!(round, "round start"),
            ArenaEvent::RoundComplete(round, leaderboard) => {
                tracing::info!(round, leaders = leaderboard.len(), "round complete")
            }
            ArenaEvent::CompetitionFinished { session_id, total_rounds } => {
                tracing::info!(session_id, total_rounds, "competition finished")
            }
            ArenaEvent::Error { round, message } => tracing::error!(round, message, "round error"),
        }
    }
}
