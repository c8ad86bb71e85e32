//! Hierarchical web-agent dispatch core.
//!
//! A top-level objective is handed to a root policy. Policies answer with
//! action strings; atomic actions go to the browser [`Environment`],
//! composite actions open a nested sub-objective on a [`Dispatcher`] frame,
//! and `stop [..]` returns a result to the frame below.

pub mod actions;
pub mod agent;
pub mod brain;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hands;
pub mod history;
pub mod journal;
pub mod types;

pub use actions::{
    ActionKind, ActionTag, ModuleActionKind, ParsedAction, classify, extract_token, is_atomic,
    is_composite, is_terminal, parse,
};
pub use agent::{Actor, AgentCore, Proposal};
pub use brain::{DecisionRequest, ModuleRegistry, Policy, PolicyAgent};
pub use config::AgentConfig;
pub use dispatch::{DispatchState, Dispatcher, FrameSnapshot};
pub use error::{AgentError, ConfigError, DecisionError, GrammarError};
pub use hands::Environment;
pub use history::History;
pub use journal::Journal;
pub use types::{Decision, EnvStatus, HistoryEntry, TrajectoryRecord};
