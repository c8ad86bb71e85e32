use thiserror::Error;

use crate::actions::ModuleActionKind;

/// A raw action string that the grammar cannot make sense of.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("no action pattern matches {0:?}")]
    Unrecognized(String),

    #[error("terminal action {0:?} has no bracketed payload")]
    MissingPayload(String),
}

/// The decision procedure behind a frame's policy failed.
#[derive(Debug, Error)]
#[error("policy for {module} failed: {source:#}")]
pub struct DecisionError {
    pub module: ModuleActionKind,
    #[source]
    pub source: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything that can abort an episode.
///
/// Environment step failures are deliberately absent: the agent loop logs
/// them and keeps going.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("grammar: {0}")]
    Grammar(#[from] GrammarError),

    #[error("decision: {0}")]
    Decision(#[from] DecisionError),

    #[error("no policy registered for module {0}")]
    UnregisteredModule(ModuleActionKind),
}
