use serde::{Deserialize, Serialize};

use crate::types::HistoryEntry;

/// Rolling history owned by exactly one policy instance.
///
/// One entry per recorded step. Responses arrive later than the action they
/// answer and are attached to the oldest step still waiting for one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    steps: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.steps.clear();
    }

    /// Returns `false` when `action` is empty and nothing was recorded. An
    /// empty reason is stored as `None` on the step.
    pub fn record_step(&mut self, action: &str, reason: Option<&str>) -> bool {
        if action.is_empty() {
            return false;
        }
        self.steps.push(HistoryEntry {
            action: action.to_string(),
            reason: reason.filter(|r| !r.is_empty()).map(str::to_string),
            response: None,
        });
        true
    }

    /// Attach `response` to the oldest step without one. Returns `false` and
    /// drops the response when no step is waiting.
    pub fn record_response(&mut self, response: impl Into<String>) -> bool {
        match self.steps.iter_mut().find(|step| step.response.is_none()) {
            Some(step) => {
                step.response = Some(response.into());
                true
            }
            None => {
                tracing::debug!("response arrived with no pending step, dropped");
                false
            }
        }
    }

    pub fn steps(&self) -> &[HistoryEntry] {
        &self.steps
    }

    /// Steps still waiting for a response.
    pub fn pending(&self) -> usize {
        self.steps.iter().filter(|step| step.response.is_none()).count()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Owned copy of every step in order; unanswered steps carry `None`.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.steps.clone()
    }
}
