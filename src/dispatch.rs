//! Hierarchical dispatcher.
//!
//! Sub-objectives are handled with an explicit stack of frames, each owning
//! a fresh policy instance. Per decision of the top frame:
//!
//! - a terminal action (`stop [..]`) pops the frame and hands its bracketed
//!   payload to the frame below as that frame's response;
//! - a registered composite action (`find_directions [..]`) pushes a new
//!   frame whose objective is the full action string;
//! - anything else is returned for the environment to execute.
//!
//! Pushes and pops are internal transitions and never consume the action
//! budget. When the root frame itself stops, its terminal action is returned
//! so the environment receives the final answer.

use async_trait::async_trait;
use serde::Serialize;

use crate::actions::{self, ModuleActionKind};
use crate::agent::{Actor, Proposal};
use crate::brain::{ModuleRegistry, PolicyAgent};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::journal::Journal;
use crate::types::{Decision, HistoryEntry, TrajectoryRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Empty,
    Active,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Return,
    Call(ModuleActionKind),
    Execute,
}

#[derive(Debug)]
struct Frame {
    objective: String,
    agent: PolicyAgent,
}

/// Serializable view of one frame, for inspection and logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSnapshot {
    pub depth: usize,
    pub module: ModuleActionKind,
    pub objective: String,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug)]
pub struct Dispatcher {
    registry: ModuleRegistry,
    root: ModuleActionKind,
    stack: Vec<Frame>,
    finished: bool,
}

impl Dispatcher {
    pub fn new(registry: ModuleRegistry, root: ModuleActionKind) -> Result<Self, AgentError> {
        if !registry.contains(root) {
            return Err(AgentError::UnregisteredModule(root));
        }
        Ok(Self {
            registry,
            root,
            stack: Vec::new(),
            finished: false,
        })
    }

    /// Bind the root frame to `config.root_module`.
    pub fn from_config(registry: ModuleRegistry, config: &AgentConfig) -> Result<Self, AgentError> {
        Self::new(registry, config.root_module)
    }

    pub fn root(&self) -> ModuleActionKind {
        self.root
    }

    pub fn state(&self) -> DispatchState {
        if self.finished {
            DispatchState::Done
        } else if self.stack.is_empty() {
            DispatchState::Empty
        } else {
            DispatchState::Active
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Frames from the root (depth 1) to the top.
    pub fn frames(&self) -> Vec<FrameSnapshot> {
        self.stack
            .iter()
            .enumerate()
            .map(|(i, frame)| FrameSnapshot {
                depth: i + 1,
                module: frame.agent.module(),
                objective: frame.objective.clone(),
                history: frame.agent.history().entries(),
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.stack.clear();
        self.finished = false;
    }

    fn spawn_frame(&self, module: ModuleActionKind, objective: String) -> Result<Frame, AgentError> {
        let policy = self
            .registry
            .spawn(module)
            .ok_or(AgentError::UnregisteredModule(module))?;
        Ok(Frame {
            objective,
            agent: PolicyAgent::new(module, policy),
        })
    }

    /// Terminal first, then registered composites, then everything else.
    fn route(&self, action: &str) -> Route {
        if actions::is_terminal(action) {
            return Route::Return;
        }
        match actions::parse(action) {
            Ok(parsed) => match parsed.tag {
                actions::ActionTag::Composite(module) if self.registry.contains(module) => {
                    Route::Call(module)
                }
                actions::ActionTag::Composite(module) => {
                    tracing::warn!(%module, action, "composite module not registered, executing as atomic");
                    Route::Execute
                }
                actions::ActionTag::Atomic(_) => Route::Execute,
            },
            Err(_) => {
                tracing::warn!(action, "unrecognized action, forwarding to environment");
                Route::Execute
            }
        }
    }

    /// Ask the stack for the next action the environment should execute.
    ///
    /// Returns `Ok(None)` once the episode is done.
    pub async fn dispatch(
        &mut self,
        objective: &str,
        observation: &str,
        url: &str,
        journal: &mut Journal,
    ) -> Result<Option<Proposal>, AgentError> {
        if self.finished {
            return Ok(None);
        }
        if self.stack.is_empty() {
            let root = self.spawn_frame(self.root, objective.to_string())?;
            tracing::info!(module = %self.root, objective, "starting root frame");
            self.stack.push(root);
        }

        loop {
            let depth = self.stack.len();
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };
            let module = frame.agent.module();
            let frame_objective = frame.objective.clone();
            let history = frame.agent.history().entries();
            let decision = frame
                .agent
                .predict(&frame_objective, observation, url)
                .await?;

            match self.route(&decision.action) {
                Route::Execute => {
                    // Executed right away, so the asking frame gets an empty response.
                    // An empty action was never recorded and gets none.
                    if let Some(frame) = self.stack.last_mut() {
                        frame.agent.receive_response("");
                    }
                    return Ok(Some(Proposal {
                        decision,
                        module: Some(module),
                        objective: frame_objective,
                        depth,
                        history,
                    }));
                }
                Route::Call(child) => {
                    let new_frame = self.spawn_frame(child, decision.action.clone())?;
                    record_transition(
                        journal,
                        &frame_objective,
                        url,
                        observation,
                        module,
                        depth,
                        history,
                        &decision,
                    );
                    self.stack.push(new_frame);
                    tracing::info!(
                        module = %child,
                        depth = depth + 1,
                        action = %decision.action,
                        "pushed frame"
                    );
                }
                Route::Return => {
                    if depth == 1 {
                        self.stack.pop();
                        self.finished = true;
                        tracing::info!(module = %module, action = %decision.action, "root frame finished");
                        return Ok(Some(Proposal {
                            decision,
                            module: Some(module),
                            objective: frame_objective,
                            depth,
                            history,
                        }));
                    }
                    // Checked before popping so a malformed frame stays inspectable.
                    let payload = actions::terminal_payload(&decision.action)?;
                    self.stack.pop();
                    if let Some(parent) = self.stack.last_mut()
                        && !parent.agent.receive_response(payload.as_str())
                    {
                        tracing::warn!(
                            module = %parent.agent.module(),
                            "parent frame had no pending step for relayed result"
                        );
                    }
                    tracing::info!(
                        module = %module,
                        depth = depth - 1,
                        response = %payload,
                        "popped frame"
                    );
                    record_transition(
                        journal,
                        &frame_objective,
                        url,
                        observation,
                        module,
                        depth,
                        history,
                        &decision,
                    );
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn record_transition(
    journal: &mut Journal,
    objective: &str,
    url: &str,
    observation: &str,
    module: ModuleActionKind,
    depth: usize,
    history: Vec<HistoryEntry>,
    decision: &Decision,
) {
    if !journal.is_enabled() {
        return;
    }
    journal.record(TrajectoryRecord {
        objective: objective.to_string(),
        url: url.to_string(),
        observation: observation.to_string(),
        module: Some(module),
        depth,
        history,
        action: decision.action.clone(),
        reason: decision.reason.clone(),
        status: None,
    });
}

#[async_trait]
impl Actor for Dispatcher {
    async fn next_action(
        &mut self,
        objective: &str,
        observation: &str,
        url: &str,
        journal: &mut Journal,
    ) -> Result<Option<Proposal>, AgentError> {
        self.dispatch(objective, observation, url, journal).await
    }

    fn reset(&mut self) {
        Dispatcher::reset(self);
    }

    fn halt(&mut self) {
        self.finished = true;
    }
}
