#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use async_trait::async_trait;
use step_agent::{
    Decision, DecisionRequest, EnvStatus, Environment, HistoryEntry, ModuleActionKind,
    ModuleRegistry, Policy,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// One call made to a scripted policy.
#[derive(Debug, Clone)]
pub struct Call {
    pub module: ModuleActionKind,
    pub objective: String,
    pub history: Vec<HistoryEntry>,
}

/// Per-module action scripts shared by every policy instance of that module.
#[derive(Clone, Default)]
pub struct Scripts {
    queues: Arc<Mutex<HashMap<ModuleActionKind, VecDeque<(String, Option<String>)>>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Scripts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue actions for `module`, each with a canned reason.
    pub fn script(self, module: ModuleActionKind, actions: &[&str]) -> Self {
        let steps: Vec<(&str, Option<String>)> = actions
            .iter()
            .map(|action| (*action, Some(format!("{module} says so"))))
            .collect();
        self.push(module, steps)
    }

    /// Queue actions with explicit reasons; `None` leaves the reason out.
    pub fn script_with_reasons(self, module: ModuleActionKind, steps: &[(&str, Option<&str>)]) -> Self {
        let steps: Vec<(&str, Option<String>)> = steps
            .iter()
            .map(|(action, reason)| (*action, reason.map(str::to_string)))
            .collect();
        self.push(module, steps)
    }

    fn push(self, module: ModuleActionKind, steps: Vec<(&str, Option<String>)>) -> Self {
        self.queues
            .lock()
            .unwrap()
            .entry(module)
            .or_default()
            .extend(steps.into_iter().map(|(action, reason)| (action.to_string(), reason)));
        self
    }

    pub fn registry(&self, modules: &[ModuleActionKind]) -> ModuleRegistry {
        modules.iter().fold(ModuleRegistry::new(), |registry, module| {
            let scripts = self.clone();
            registry.register(*module, move |_| {
                Box::new(ScriptedPolicy {
                    scripts: scripts.clone(),
                })
            })
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn remaining(&self, module: ModuleActionKind) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(&module)
            .map_or(0, VecDeque::len)
    }
}

struct ScriptedPolicy {
    scripts: Scripts,
}

#[async_trait]
impl Policy for ScriptedPolicy {
    async fn decide(&mut self, request: DecisionRequest<'_>) -> Result<Decision> {
        self.scripts.calls.lock().unwrap().push(Call {
            module: request.module,
            objective: request.objective.to_string(),
            history: request.history.to_vec(),
        });
        let next = self
            .scripts
            .queues
            .lock()
            .unwrap()
            .get_mut(&request.module)
            .and_then(VecDeque::pop_front);
        match next {
            Some((action, Some(reason))) => Ok(Decision::new(action).with_reason(reason)),
            Some((action, None)) => Ok(Decision::new(action)),
            None => bail!("script for {} exhausted", request.module),
        }
    }
}

pub struct FailingPolicy;

#[async_trait]
impl Policy for FailingPolicy {
    async fn decide(&mut self, _request: DecisionRequest<'_>) -> Result<Decision> {
        bail!("rate limited")
    }
}

/// Environment that records submitted actions and finishes on `stop`.
pub struct ScriptedEnv {
    pub objective: String,
    pub submitted: Vec<String>,
    fail_on: Vec<usize>,
    finish_on_stop: bool,
    done: bool,
}

impl ScriptedEnv {
    pub fn new(objective: &str) -> Self {
        Self {
            objective: objective.to_string(),
            submitted: Vec::new(),
            fail_on: Vec::new(),
            finish_on_stop: true,
            done: false,
        }
    }

    /// Make the given 1-based step numbers fail.
    pub fn failing_on(mut self, steps: &[usize]) -> Self {
        self.fail_on = steps.to_vec();
        self
    }

    pub fn never_done(mut self) -> Self {
        self.finish_on_stop = false;
        self
    }

    fn status(&self) -> EnvStatus {
        EnvStatus {
            done: self.done,
            reward: if self.done { 1.0 } else { 0.0 },
            success: self.done,
            num_actions: self.submitted.len(),
            action_limit_exceeded: false,
        }
    }
}

#[async_trait]
impl Environment for ScriptedEnv {
    async fn observation(&mut self) -> String {
        format!("[1] link 'Directions'\n[2] textbox 'Search' ({} actions so far)", self.submitted.len())
    }

    fn url(&self) -> String {
        format!("http://maps.local/#step={}", self.submitted.len())
    }

    fn objective(&self) -> String {
        self.objective.clone()
    }

    fn done(&self) -> bool {
        self.done
    }

    async fn step(&mut self, action: &str) -> Result<EnvStatus> {
        self.submitted.push(action.to_string());
        let step = self.submitted.len();
        if self.fail_on.contains(&step) {
            bail!("browser crashed on step {step}");
        }
        if action.trim().is_empty() || action.contains("note [") {
            return Ok(self.status());
        }
        if self.finish_on_stop && step_agent::is_terminal(action) {
            self.done = true;
        }
        Ok(self.status())
    }
}
