use metrics_exporter_prometheus::PrometheusHandle;
use points_engine::engine::{MemoryPointsStore, PointsEngine, StageId, SubmissionId, SystemClock};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

pub(crate) type ApiEngine = PointsEngine<MemoryPointsStore, SystemClock>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Mirror of the review registry's approval state. The engine's halving rule
/// needs to know whether a stage already has another approved submission,
/// and that answer lives with whoever tracks review outcomes.
#[derive(Default, Clone)]
pub(crate) struct InMemorySubmissionRegistry {
    approved: Arc<Mutex<HashMap<SubmissionId, StageId>>>,
}

impl InMemorySubmissionRegistry {
    /// True when a different approved submission targets the same stage.
    pub(crate) fn has_other_approved(&self, stage: StageId, excluding: &SubmissionId) -> bool {
        let guard = self.approved.lock().expect("registry mutex poisoned");
        guard
            .iter()
            .any(|(id, approved_stage)| *approved_stage == stage && id != excluding)
    }

    pub(crate) fn mark_approved(&self, submission: SubmissionId, stage: StageId) {
        let mut guard = self.approved.lock().expect("registry mutex poisoned");
        guard.insert(submission, stage);
    }

    pub(crate) fn mark_reversed(&self, submission: &SubmissionId) {
        let mut guard = self.approved.lock().expect("registry mutex poisoned");
        guard.remove(submission);
    }
}
