use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actions::ModuleActionKind;

/// What a policy asks for next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: String,
    pub reason: Option<String>,
}

impl Decision {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// One past step of a single policy instance.
///
/// `response` is `None` while the step is still waiting for one; an empty
/// string means the step was answered with nothing observable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    pub reason: Option<String>,
    pub response: Option<String>,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.response {
            Some(response) => write!(f, "action=\"{}\", response={}", self.action, response),
            None => write!(f, "action=\"{}\", response=None", self.action),
        }
    }
}

/// Environment status snapshot returned by every step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvStatus {
    pub done: bool,
    pub reward: f64,
    pub success: bool,
    pub num_actions: usize,
    pub action_limit_exceeded: bool,
}

/// One line of the trajectory log.
///
/// Internal dispatch transitions (push/pop) carry no status; steps submitted
/// to the environment carry the status it returned, flattened into the record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryRecord {
    pub objective: String,
    pub url: String,
    pub observation: String,
    pub module: Option<ModuleActionKind>,
    pub depth: usize,
    pub history: Vec<HistoryEntry>,
    pub action: String,
    pub reason: Option<String>,
    #[serde(flatten)]
    pub status: Option<EnvStatus>,
}

/// Atomic actions an episode may submit unless configured otherwise.
pub const MAX_ACTIONS_PER_EPISODE: usize = 50;
