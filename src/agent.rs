//! Agent core: the bounded observe -> decide -> step loop.

use async_trait::async_trait;

use crate::actions::ModuleActionKind;
use crate::brain::PolicyAgent;
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::hands::Environment;
use crate::journal::Journal;
use crate::types::{Decision, EnvStatus, HistoryEntry, TrajectoryRecord};

/// An action ready for the environment, plus the context of the policy
/// instance that chose it.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub decision: Decision,
    pub module: Option<ModuleActionKind>,
    pub objective: String,
    pub depth: usize,
    /// The deciding instance's history before this step.
    pub history: Vec<HistoryEntry>,
}

/// Anything that can produce the next atomic action for an objective.
///
/// `Ok(None)` means there is nothing further to submit.
#[async_trait]
pub trait Actor: Send {
    async fn next_action(
        &mut self,
        objective: &str,
        observation: &str,
        url: &str,
        journal: &mut Journal,
    ) -> Result<Option<Proposal>, AgentError>;

    fn reset(&mut self);

    /// Called once when the action budget runs out.
    fn halt(&mut self) {}
}

/// A single, flat policy instance acting directly on the environment.
#[async_trait]
impl Actor for PolicyAgent {
    async fn next_action(
        &mut self,
        objective: &str,
        observation: &str,
        url: &str,
        _journal: &mut Journal,
    ) -> Result<Option<Proposal>, AgentError> {
        let history = self.history().entries();
        let decision = self.predict(objective, observation, url).await?;
        Ok(Some(Proposal {
            decision,
            module: Some(self.module()),
            objective: objective.to_string(),
            depth: 1,
            history,
        }))
    }

    fn reset(&mut self) {
        PolicyAgent::reset(self);
    }
}

pub struct AgentCore<A> {
    actor: A,
    config: AgentConfig,
    journal: Journal,
    actions_taken: usize,
}

impl<A: Actor> AgentCore<A> {
    pub fn new(actor: A, config: AgentConfig) -> Self {
        let journal = Journal::new(config.log_trajectory);
        Self {
            actor,
            config,
            journal,
            actions_taken: 0,
        }
    }

    pub fn actor(&self) -> &A {
        &self.actor
    }

    pub fn actor_mut(&mut self) -> &mut A {
        &mut self.actor
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn trajectory(&self) -> &[TrajectoryRecord] {
        self.journal.records()
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Atomic actions submitted since the last reset.
    pub fn actions_taken(&self) -> usize {
        self.actions_taken
    }

    pub fn reset_history(&mut self) {
        self.actor.reset();
        self.journal.clear();
        self.actions_taken = 0;
    }

    /// Run one episode using the environment's own objective.
    pub async fn run_episode<E>(&mut self, env: &mut E) -> Result<EnvStatus, AgentError>
    where
        E: Environment + ?Sized,
    {
        let objective = env.objective();
        self.run_loop(&objective, env).await
    }

    /// Drive `env` until it reports done, the actor has nothing left to
    /// submit, or `max_actions` atomic actions have been submitted.
    ///
    /// Running out of budget is not an error: the last known status comes
    /// back with `action_limit_exceeded` set.
    ///
    /// A failed environment step leaves the status unchanged but still counts
    /// against `max_actions`, since the action was submitted.
    pub async fn run_loop<E>(&mut self, objective: &str, env: &mut E) -> Result<EnvStatus, AgentError>
    where
        E: Environment + ?Sized,
    {
        let mut status = EnvStatus {
            done: env.done(),
            num_actions: self.actions_taken,
            ..EnvStatus::default()
        };

        while !env.done() {
            if self.actions_taken >= self.config.max_actions {
                tracing::warn!(
                    max_actions = self.config.max_actions,
                    "action budget exhausted, stopping episode"
                );
                status.action_limit_exceeded = true;
                self.actor.halt();
                break;
            }

            let observation = env.observation().await;
            let url = env.url();

            let Some(proposal) = self
                .actor
                .next_action(objective, &observation, &url, &mut self.journal)
                .await?
            else {
                tracing::info!("actor has nothing further to submit");
                break;
            };

            let action = &proposal.decision.action;
            match env.step(action).await {
                Ok(next) => status = next,
                Err(err) => {
                    tracing::warn!(action = %action, error = %err, "environment step failed");
                }
            }
            self.actions_taken += 1;

            tracing::info!(
                step = self.actions_taken,
                depth = proposal.depth,
                action = %action,
                "submitted action"
            );

            if self.journal.is_enabled() {
                self.journal.record(TrajectoryRecord {
                    objective: proposal.objective,
                    url: env.url(),
                    observation,
                    module: proposal.module,
                    depth: proposal.depth,
                    history: proposal.history,
                    action: proposal.decision.action,
                    reason: proposal.decision.reason,
                    status: Some(status.clone()),
                });
            }
        }

        tracing::info!(
            actions_taken = self.actions_taken,
            done = status.done,
            action_limit_exceeded = status.action_limit_exceeded,
            "episode finished"
        );
        Ok(status)
    }
}
