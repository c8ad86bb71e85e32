//! Policy adapter: the seam between the dispatch core and whatever decision
//! procedure (usually a language model) picks the next action.

use std::collections::HashMap;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

use crate::actions::ModuleActionKind;
use crate::error::DecisionError;
use crate::history::History;
use crate::types::{Decision, HistoryEntry};

/// Everything a policy sees when asked for its next action.
#[derive(Debug, Clone, Copy)]
pub struct DecisionRequest<'a> {
    pub module: ModuleActionKind,
    pub objective: &'a str,
    pub observation: &'a str,
    pub url: &'a str,
    pub history: &'a [HistoryEntry],
}

/// A decision procedure. One boxed instance backs one dispatch frame.
#[async_trait]
pub trait Policy: Send {
    async fn decide(&mut self, request: DecisionRequest<'_>) -> Result<Decision>;
}

pub type PolicyBuilder = Box<dyn Fn(ModuleActionKind) -> Box<dyn Policy> + Send + Sync>;

/// Composite kinds the dispatcher may push, each with a constructor for
/// fresh policy instances.
#[derive(Default)]
pub struct ModuleRegistry {
    builders: HashMap<ModuleActionKind, PolicyBuilder>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, module: ModuleActionKind, builder: F) -> Self
    where
        F: Fn(ModuleActionKind) -> Box<dyn Policy> + Send + Sync + 'static,
    {
        self.builders.insert(module, Box::new(builder));
        self
    }

    pub fn contains(&self, module: ModuleActionKind) -> bool {
        self.builders.contains_key(&module)
    }

    /// Registered kinds in catalog order.
    pub fn modules(&self) -> Vec<ModuleActionKind> {
        ModuleActionKind::ALL
            .into_iter()
            .filter(|module| self.contains(*module))
            .collect()
    }

    pub fn spawn(&self, module: ModuleActionKind) -> Option<Box<dyn Policy>> {
        self.builders.get(&module).map(|build| build(module))
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules())
            .finish()
    }
}

/// One policy instance together with the history only it may see.
pub struct PolicyAgent {
    module: ModuleActionKind,
    policy: Box<dyn Policy>,
    history: History,
}

impl PolicyAgent {
    /// Always starts from an empty history.
    pub fn new(module: ModuleActionKind, policy: Box<dyn Policy>) -> Self {
        Self {
            module,
            policy,
            history: History::new(),
        }
    }

    pub fn module(&self) -> ModuleActionKind {
        self.module
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.reset();
    }

    /// Returns `false` when no step of this instance was waiting for it.
    pub fn receive_response(&mut self, response: impl Into<String>) -> bool {
        self.history.record_response(response)
    }

    /// Ask the policy for its next action and record it.
    pub async fn predict(
        &mut self,
        objective: &str,
        observation: &str,
        url: &str,
    ) -> Result<Decision, DecisionError> {
        let history = self.history.entries();
        let request = DecisionRequest {
            module: self.module,
            objective,
            observation,
            url,
            history: &history,
        };

        let decision = self
            .policy
            .decide(request)
            .await
            .map_err(|source| DecisionError {
                module: self.module,
                source,
            })?;

        tracing::debug!(
            module = %self.module,
            objective,
            url,
            action = %decision.action,
            history_len = history.len(),
            "policy decided"
        );

        self.history
            .record_step(&decision.action, decision.reason.as_deref());
        Ok(decision)
    }
}

impl fmt::Debug for PolicyAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyAgent")
            .field("module", &self.module)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Echo {
        seen: Arc<Mutex<Vec<Vec<HistoryEntry>>>>,
    }

    #[async_trait]
    impl Policy for Echo {
        async fn decide(&mut self, request: DecisionRequest<'_>) -> Result<Decision> {
            let mut seen = self.seen.lock().unwrap();
            seen.push(request.history.to_vec());
            Ok(Decision::new(format!("click [{}]", seen.len())).with_reason("echo"))
        }
    }

    struct Broken;

    #[async_trait]
    impl Policy for Broken {
        async fn decide(&mut self, _request: DecisionRequest<'_>) -> Result<Decision> {
            anyhow::bail!("model unavailable")
        }
    }

    #[tokio::test]
    async fn history_is_paired_and_carried_between_calls() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut agent = PolicyAgent::new(
            ModuleActionKind::FindDirections,
            Box::new(Echo { seen: seen.clone() }),
        );

        agent.predict("route", "page", "http://map").await.unwrap();
        agent.predict("route", "page", "http://map").await.unwrap();
        agent.receive_response("");
        agent.predict("route", "page", "http://map").await.unwrap();

        let seen = seen.lock().unwrap();
        assert!(seen[0].is_empty());
        assert_eq!(seen[1].len(), 1);
        assert_eq!(seen[1][0].response, None);
        assert_eq!(seen[2][0].response.as_deref(), Some(""));
        assert_eq!(seen[2][1].response, None);
        assert_eq!(agent.history().len(), 3);
        assert!(
            agent
                .history()
                .steps()
                .iter()
                .all(|step| step.reason.as_deref() == Some("echo"))
        );
    }

    #[tokio::test]
    async fn policy_failure_names_the_module() {
        let mut agent = PolicyAgent::new(ModuleActionKind::SearchNearestPlace, Box::new(Broken));
        let err = agent.predict("cafes", "", "").await.unwrap_err();
        assert_eq!(err.module, ModuleActionKind::SearchNearestPlace);
        assert!(err.to_string().contains("model unavailable"));
        assert!(agent.history().is_empty());
    }

    #[test]
    fn registry_spawns_only_registered_modules() {
        let registry = ModuleRegistry::new()
            .register(ModuleActionKind::FindDirections, |_| Box::new(Broken));
        assert!(registry.contains(ModuleActionKind::FindDirections));
        assert!(registry.spawn(ModuleActionKind::MapPlanner).is_none());
        assert!(registry.spawn(ModuleActionKind::FindDirections).is_some());
        assert_eq!(registry.modules(), vec![ModuleActionKind::FindDirections]);
    }
}
