// =============================================================================
// DecisionBroker — spec.md §4.7
// =============================================================================
//
// `collect(roundPayload, deadline) -> map[modelId]DecisionBundle?`. Fans out
// every enabled model's `decide()` concurrently via `tokio::spawn`, bounds
// each by the tighter of the round deadline and the adapter's own timeout,
// and joins with full fault isolation: one failing/slow adapter never delays,
// corrupts, or cancels its siblings. Generalizes the teacher's
// multiple-independently-failing-background-task pattern (`main.rs`) from a
// set of long-running loops to one bounded-lifetime batch.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tracing::{error, warn};

use crate::decision::DecisionBundle;
use crate::model_adapter::{ModelAdapter, RoundPayload};

/// A bundle that made it back inside the deadline, plus how long the adapter
/// took to produce it. Feeds `ModelRuntime::record_decision`'s latency
/// tracking (spec.md §3 `lastLatency`/`totalLatency`).
pub struct CollectedDecision {
    pub bundle: DecisionBundle,
    pub latency_ms: u64,
}

pub struct DecisionBroker;

impl DecisionBroker {
    /// `models`: enabled model id -> adapter. `payload_for` builds each
    /// model's personalized payload (its own `AccountView`) from the shared
    /// base payload.
    pub async fn collect(
        models: &[(String, Arc<dyn ModelAdapter>)],
        payload_for: impl Fn(&str) -> RoundPayload,
        deadline: Duration,
    ) -> HashMap<String, Option<CollectedDecision>> {
        let tasks = models.iter().map(|(id, adapter)| {
            let id = id.clone();
            let adapter = adapter.clone();
            let payload = payload_for(&id);
            async move {
                let started = Instant::now();
                let outcome = tokio::time::timeout(deadline, adapter.decide(&payload)).await;
                let latency_ms = started.elapsed().as_millis() as u64;
                let collected = match outcome {
                    Ok(Ok(bundle)) => Some(CollectedDecision { bundle, latency_ms }),
                    Ok(Err(e)) => {
                        warn!(model = %id, error = %e, "model adapter returned an error");
                        None
                    }
                    Err(_) => {
                        warn!(model = %id, "model adapter exceeded round deadline");
                        None
                    }
                };
                (id, collected)
            }
        });

        let results = join_all(tasks).await;
        let mut map = HashMap::with_capacity(results.len());
        for (id, collected) in results {
            if collected.is_none() {
                error!(model = %id, "no decision collected this round");
            }
            map.insert(id, collected);
        }
        map
    }
}
